//! Enumerates the geokeys whose cells overlap a viewport.

use crate::compute::geokey::{BASE32, quadrant_bounds, region_bounds};
use crate::compute::validation::{validate_bounds, validate_zoom_level};
use crate::config::{DEFAULT_MAX_VIEWPORT_GEOKEYS, MAX_GEOKEY_LENGTH};
use crate::error::{GeoscopeError, Result};
use geoscope_types::Bounds;

/// Every geokey of exactly `zoom_level` characters whose cell overlaps
/// `bounds`, in lexicographic order.
///
/// Cells sharing only an edge with `bounds` are included. Subtrees whose cell
/// lies fully outside the viewport are never visited, so the cost tracks the
/// size of the result rather than `4^zoom_level`. Viewports producing more
/// than [`DEFAULT_MAX_VIEWPORT_GEOKEYS`] keys are rejected; use
/// [`overlapping_geokeys_within`] for a different limit.
///
/// # Examples
///
/// ```
/// use geoscope::compute::enumerate::overlapping_geokeys;
/// use geoscope_types::Bounds;
///
/// let keys = overlapping_geokeys(&Bounds::new(10.0, 11.0, 10.0, 11.0), 2)?;
/// assert_eq!(keys, vec!["s0".to_string()]);
/// # Ok::<(), geoscope::GeoscopeError>(())
/// ```
pub fn overlapping_geokeys(bounds: &Bounds, zoom_level: usize) -> Result<Vec<String>> {
    overlapping_geokeys_within(bounds, zoom_level, DEFAULT_MAX_VIEWPORT_GEOKEYS)
}

/// Like [`overlapping_geokeys`], but fails with
/// [`GeoscopeError::InvalidInput`] as soon as more than `max_keys` keys have
/// been produced.
pub fn overlapping_geokeys_within(
    bounds: &Bounds,
    zoom_level: usize,
    max_keys: usize,
) -> Result<Vec<String>> {
    validate_bounds(bounds)?;
    validate_zoom_level(zoom_level, MAX_GEOKEY_LENGTH)?;

    let mut walk = Walk {
        bounds,
        zoom_level,
        max_keys,
        out: Vec::new(),
    };
    let mut prefix = String::with_capacity(zoom_level);
    for (index, &c) in BASE32.iter().enumerate() {
        let cell = region_bounds(index as u8);
        if !cell.intersects(bounds) {
            continue;
        }
        prefix.push(c as char);
        walk.descend(&mut prefix, &cell)?;
        prefix.pop();
    }
    Ok(walk.out)
}

struct Walk<'a> {
    bounds: &'a Bounds,
    zoom_level: usize,
    max_keys: usize,
    out: Vec<String>,
}

impl Walk<'_> {
    // Recursion depth is bounded by `zoom_level`, itself capped by
    // MAX_GEOKEY_LENGTH.
    fn descend(&mut self, prefix: &mut String, cell: &Bounds) -> Result<()> {
        if prefix.len() == self.zoom_level {
            if self.out.len() >= self.max_keys {
                return Err(too_many_keys(self.max_keys, self.zoom_level));
            }
            self.out.push(prefix.clone());
            return Ok(());
        }
        for digit in 0..4u8 {
            let sub = quadrant_bounds(cell, digit);
            if !sub.intersects(self.bounds) {
                continue;
            }
            prefix.push((b'0' + digit) as char);
            self.descend(prefix, &sub)?;
            prefix.pop();
        }
        Ok(())
    }
}

fn too_many_keys(max_keys: usize, zoom_level: usize) -> GeoscopeError {
    GeoscopeError::InvalidInput(format!(
        "Viewport covers more than {} geokeys at zoom level {}",
        max_keys, zoom_level
    ))
}

/// Geokeys overlapping `bounds` at every length from 1 through `max_zoom`,
/// shortest first, failing once more than `max_keys` keys are produced in
/// total.
pub fn overlapping_geokeys_up_to(
    bounds: &Bounds,
    max_zoom: usize,
    max_keys: usize,
) -> Result<Vec<String>> {
    validate_zoom_level(max_zoom, MAX_GEOKEY_LENGTH)?;
    let mut out = Vec::new();
    for zoom in 1..=max_zoom {
        let remaining = max_keys
            .checked_sub(out.len())
            .ok_or_else(|| too_many_keys(max_keys, zoom))?;
        out.extend(overlapping_geokeys_within(bounds, zoom, remaining)?);
    }
    Ok(out)
}

/// Region characters (length-1 geokeys) overlapping `bounds`.
pub fn overlapping_regions(bounds: &Bounds) -> Result<Vec<char>> {
    Ok(overlapping_geokeys(bounds, 1)?
        .into_iter()
        .filter_map(|key| key.chars().next())
        .collect())
}
