//! Cooldown gate interface.

use super::value_object::{CanvasId, Timestamp, UserId};

/// Per-(canvas, user) rate limiter.
///
/// `allow` is an atomic check-and-set per key: it records `now` and returns
/// `true` iff at least `cooldown_seconds` have passed since the last accepted
/// placement. A rejected attempt leaves the stored timestamp untouched, so
/// retrying during the cooldown does not extend it. Unknown keys are always
/// allowed.
pub trait CooldownGate: Send + Sync {
    fn allow(
        &self,
        canvas_id: &CanvasId,
        user_id: &UserId,
        cooldown_seconds: u64,
        now: Timestamp,
    ) -> bool;

    /// Milliseconds until the key may place again (`0` if it may place now).
    /// Never mutates state.
    fn remaining_ms(
        &self,
        canvas_id: &CanvasId,
        user_id: &UserId,
        cooldown_seconds: u64,
        now: Timestamp,
    ) -> i64;
}

/// Cooldown length in milliseconds, saturating on absurd configurations.
pub fn cooldown_millis(cooldown_seconds: u64) -> i64 {
    i64::try_from(cooldown_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
}
