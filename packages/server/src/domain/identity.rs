//! Identity resolver interface.

use async_trait::async_trait;

use super::entity::{Identity, IdentityClaims};

/// Turns the identity fields carried by a request into a caller identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` means the caller is unidentified.
    async fn resolve(&self, claims: &IdentityClaims) -> Option<Identity>;
}
