//! Request-claims identity resolver.
//!
//! Stands in for a real session service: the identity is taken from the
//! fields sent with the request. A caller is a guest when it says so or when
//! its id carries the `guest_` prefix.

use async_trait::async_trait;

use crate::domain::{Identity, IdentityClaims, IdentityResolver, UserId};

const GUEST_PREFIX: &str = "guest_";

#[derive(Debug, Default, Clone, Copy)]
pub struct ClaimsIdentityResolver;

impl ClaimsIdentityResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityResolver for ClaimsIdentityResolver {
    async fn resolve(&self, claims: &IdentityClaims) -> Option<Identity> {
        let user_id = UserId::new(claims.user_id.clone()?).ok()?;
        if user_id.is_anonymous() {
            return None;
        }

        let is_guest =
            claims.is_guest.unwrap_or(false) || user_id.as_str().starts_with(GUEST_PREFIX);
        let username = claims
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| user_id.as_str().to_string());

        Some(Identity {
            user_id,
            username,
            is_guest,
        })
    }
}
