//! Placement rules.
//!
//! Pure functions, one per validation step. The placement use case runs them
//! in order and stops at the first violation.

use super::{
    entity::{AuthMode, CanvasConfig, Identity},
    error::PlacementViolation,
    value_object::HexColor,
};

/// Step 1: coordinates must be integers inside the canvas.
///
/// `None` stands for a coordinate that was missing or not an integer.
pub fn validate_coordinates(
    config: &CanvasConfig,
    x: Option<i64>,
    y: Option<i64>,
) -> Result<(u32, u32), PlacementViolation> {
    let (Some(x), Some(y)) = (x, y) else {
        return Err(PlacementViolation::InvalidCoordinates);
    };
    if !config.contains(x, y) {
        return Err(PlacementViolation::InvalidCoordinates);
    }
    let x = u32::try_from(x).map_err(|_| PlacementViolation::InvalidCoordinates)?;
    let y = u32::try_from(y).map_err(|_| PlacementViolation::InvalidCoordinates)?;
    Ok((x, y))
}

/// Step 2: color must be `#RRGGBB`.
pub fn validate_color(raw: Option<&str>) -> Result<HexColor, PlacementViolation> {
    raw.and_then(|value| HexColor::try_from(value).ok())
        .ok_or(PlacementViolation::InvalidColor)
}

/// Step 3: restricted palettes only accept their own colors.
pub fn check_palette(config: &CanvasConfig, color: &HexColor) -> Result<(), PlacementViolation> {
    if config.allows_color(color) {
        Ok(())
    } else {
        Err(PlacementViolation::ColorNotAllowed)
    }
}

/// Step 4: the canvas auth mode decides which identities may place.
pub fn check_auth(mode: AuthMode, identity: Option<&Identity>) -> Result<(), PlacementViolation> {
    match (mode, identity) {
        (AuthMode::Anyone, _) => Ok(()),
        (AuthMode::UserOrGuest, Some(_)) => Ok(()),
        (AuthMode::UserOrGuest, None) => Err(PlacementViolation::Unauthorized),
        (AuthMode::UserOnly, Some(identity)) if !identity.is_guest => Ok(()),
        (AuthMode::UserOnly, _) => Err(PlacementViolation::Forbidden),
    }
}
