//! Domain layer: value objects, entities, pure validation rules and the
//! collaborator interfaces the use cases depend on.

pub mod cooldown;
pub mod entity;
pub mod error;
pub mod identity;
pub mod placement;
pub mod registry;
pub mod store;
pub mod value_object;

pub use cooldown::CooldownGate;
pub use entity::{
    AuthMode, Author, CanvasConfig, Connection, Identity, IdentityClaims, Outbound, PixelEvent,
    PusherChannel, Room,
};
pub use error::{PlacementViolation, StoreError, ValueObjectError};
pub use identity::IdentityResolver;
pub use registry::{ConnectionRegistry, Departure, FanOutReport, JoinOutcome, SweepOutcome};
pub use store::PixelStore;
pub use value_object::{CanvasId, ConnectionId, HexColor, Timestamp, UserId};

#[cfg(test)]
pub use identity::MockIdentityResolver;
#[cfg(test)]
pub use store::MockPixelStore;
