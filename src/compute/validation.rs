//! Validation for coordinates, bounds, zoom levels and geokeys.

use crate::compute::geokey::{is_quadrant_digit, region_index};
use crate::config::MAX_GEOKEY_LENGTH;
use crate::error::{GeoscopeError, Result};
use geoscope_types::Bounds;

/// Validates a latitude/longitude pair.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use geoscope::compute::validation::validate_coordinates;
///
/// assert!(validate_coordinates(48.8566, 2.3522).is_ok());
/// assert!(validate_coordinates(95.0, 2.0).is_err());
/// assert!(validate_coordinates(48.0, f64::NAN).is_err());
/// ```
pub fn validate_coordinates(lat: f64, lon: f64) -> Result<()> {
    if !lon.is_finite() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            lon
        )));
    }

    if !lat.is_finite() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeoscopeError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeoscopeError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    Ok(())
}

/// Validates a viewport: both corners in range and `min <= max` on each axis.
pub fn validate_bounds(bounds: &Bounds) -> Result<()> {
    validate_coordinates(bounds.min_lat, bounds.min_lon)
        .map_err(|e| GeoscopeError::InvalidInput(format!("Bounds minimum corner: {}", e)))?;
    validate_coordinates(bounds.max_lat, bounds.max_lon)
        .map_err(|e| GeoscopeError::InvalidInput(format!("Bounds maximum corner: {}", e)))?;

    if bounds.min_lat > bounds.max_lat {
        return Err(GeoscopeError::InvalidInput(format!(
            "min_lat {} is greater than max_lat {}",
            bounds.min_lat, bounds.max_lat
        )));
    }

    if bounds.min_lon > bounds.max_lon {
        return Err(GeoscopeError::InvalidInput(format!(
            "min_lon {} is greater than max_lon {}",
            bounds.min_lon, bounds.max_lon
        )));
    }

    Ok(())
}

/// Validates a zoom level (geokey length) against `max`.
pub fn validate_zoom_level(zoom_level: usize, max: usize) -> Result<()> {
    let max = max.min(MAX_GEOKEY_LENGTH);
    if !(1..=max).contains(&zoom_level) {
        return Err(GeoscopeError::InvalidInput(format!(
            "Zoom level out of range [1, {}]: {}",
            max, zoom_level
        )));
    }
    Ok(())
}

/// Validates the characters and length of a geokey.
///
/// # Examples
///
/// ```
/// use geoscope::compute::validation::validate_geokey;
///
/// assert!(validate_geokey("u0123").is_ok());
/// assert!(validate_geokey("").is_err());
/// assert!(validate_geokey("a").is_err()); // 'a' is not in the base-32 alphabet
/// assert!(validate_geokey("u4").is_err()); // later characters are quadrant digits 0-3
/// ```
pub fn validate_geokey(geokey: &str) -> Result<()> {
    let mut chars = geokey.chars();

    let first = chars
        .next()
        .ok_or_else(|| GeoscopeError::InvalidInput("Invalid geokey: empty string".to_string()))?;
    if region_index(first).is_none() {
        return Err(GeoscopeError::InvalidInput(format!(
            "Invalid base-32 character in geokey {:?}: {:?}",
            geokey, first
        )));
    }

    for (idx, c) in chars.enumerate() {
        if !is_quadrant_digit(c) {
            return Err(GeoscopeError::InvalidInput(format!(
                "Invalid quadrant character at position {} in geokey {:?}: {:?}",
                idx + 1,
                geokey,
                c
            )));
        }
    }

    if geokey.len() > MAX_GEOKEY_LENGTH {
        return Err(GeoscopeError::InvalidInput(format!(
            "Geokey longer than {} characters: {}",
            MAX_GEOKEY_LENGTH,
            geokey.len()
        )));
    }

    Ok(())
}
