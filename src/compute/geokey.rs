//! Hybrid geokey codec.
//!
//! A geokey is one base-32 character followed by zero or more base-4
//! quadrant digits. The first character bisects the globe five times,
//! longitude first and alternating, exactly like a one-character geohash
//! (a 45 x 45 degree cell). Every following digit halves the current cell on
//! both axes at once: bit `2` selects the northern half, bit `1` the eastern
//! half, giving `0` = SW, `1` = SE, `2` = NW, `3` = NE.
//!
//! Prefixes of a geokey name enclosing cells, which is what makes the
//! prefix trie and the prefix bucketing of events work.

use crate::compute::validation::{validate_coordinates, validate_geokey};
use crate::config::MAX_GEOKEY_LENGTH;
use crate::error::{GeoscopeError, Result};
use geo::Point;
use geoscope_types::Bounds;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Alphabet of the first geokey character.
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Reverse lookup for [`BASE32`]; `-1` marks bytes outside the alphabet.
const BASE32_REV: [i8; 128] = build_base32_rev();

const fn build_base32_rev() -> [i8; 128] {
    let mut table = [-1i8; 128];
    let mut i = 0;
    while i < BASE32.len() {
        table[BASE32[i] as usize] = i as i8;
        i += 1;
    }
    table
}

const NORTH: u8 = 0b10;
const EAST: u8 = 0b01;

/// Index of a region character in the base-32 alphabet.
#[inline]
pub fn region_index(c: char) -> Option<u8> {
    if !c.is_ascii() {
        return None;
    }
    match BASE32_REV[c as usize] {
        -1 => None,
        idx => Some(idx as u8),
    }
}

#[inline]
pub fn is_quadrant_digit(c: char) -> bool {
    matches!(c, '0'..='3')
}

/// All 32 region characters, in alphabet order.
pub fn regions() -> impl Iterator<Item = char> {
    BASE32.iter().map(|&b| b as char)
}

/// Cell covered by a one-character geokey.
pub fn region_bounds(index: u8) -> Bounds {
    let mut bounds = Bounds::world();
    let mut even = true;
    for bit in (0..5).rev() {
        let set = (index >> bit) & 1 == 1;
        if even {
            let mid = (bounds.min_lon + bounds.max_lon) / 2.0;
            if set {
                bounds.min_lon = mid;
            } else {
                bounds.max_lon = mid;
            }
        } else {
            let mid = (bounds.min_lat + bounds.max_lat) / 2.0;
            if set {
                bounds.min_lat = mid;
            } else {
                bounds.max_lat = mid;
            }
        }
        even = !even;
    }
    bounds
}

/// Sub-cell of `cell` selected by a quadrant digit (0..=3).
pub fn quadrant_bounds(cell: &Bounds, digit: u8) -> Bounds {
    let mid_lat = (cell.min_lat + cell.max_lat) / 2.0;
    let mid_lon = (cell.min_lon + cell.max_lon) / 2.0;
    let mut sub = *cell;
    if digit & NORTH != 0 {
        sub.min_lat = mid_lat;
    } else {
        sub.max_lat = mid_lat;
    }
    if digit & EAST != 0 {
        sub.min_lon = mid_lon;
    } else {
        sub.max_lon = mid_lon;
    }
    sub
}

/// Encode a coordinate into a geokey of `length` characters.
///
/// A coordinate lying exactly on a midpoint goes to the upper (north or
/// east) half.
///
/// # Examples
///
/// ```
/// use geoscope::compute::geokey::encode;
///
/// assert_eq!(encode(10.5, 10.5, 2)?, "s0");
/// assert!(encode(10.5, 10.5, 0).is_err());
/// # Ok::<(), geoscope::GeoscopeError>(())
/// ```
pub fn encode(lat: f64, lon: f64, length: usize) -> Result<String> {
    validate_coordinates(lat, lon)?;
    if !(1..=MAX_GEOKEY_LENGTH).contains(&length) {
        return Err(GeoscopeError::InvalidInput(format!(
            "Geokey length out of range [1, {}]: {}",
            MAX_GEOKEY_LENGTH, length
        )));
    }

    let mut geokey = String::with_capacity(length);
    let mut cell = Bounds::world();
    let mut index = 0u8;
    let mut even = true;
    for _ in 0..5 {
        if even {
            let mid = (cell.min_lon + cell.max_lon) / 2.0;
            if lon >= mid {
                index = (index << 1) | 1;
                cell.min_lon = mid;
            } else {
                index <<= 1;
                cell.max_lon = mid;
            }
        } else {
            let mid = (cell.min_lat + cell.max_lat) / 2.0;
            if lat >= mid {
                index = (index << 1) | 1;
                cell.min_lat = mid;
            } else {
                index <<= 1;
                cell.max_lat = mid;
            }
        }
        even = !even;
    }
    geokey.push(BASE32[index as usize] as char);

    for _ in 1..length {
        let mid_lat = (cell.min_lat + cell.max_lat) / 2.0;
        let mid_lon = (cell.min_lon + cell.max_lon) / 2.0;
        let mut digit = 0u8;
        if lat >= mid_lat {
            digit |= NORTH;
        }
        if lon >= mid_lon {
            digit |= EAST;
        }
        cell = quadrant_bounds(&cell, digit);
        geokey.push((b'0' + digit) as char);
    }

    Ok(geokey)
}

/// Cell covered by a geokey.
pub fn decode_bounds(geokey: &str) -> Result<Bounds> {
    validate_geokey(geokey)?;
    let bytes = geokey.as_bytes();
    // Both lookups are infallible after validation.
    let index = BASE32_REV[bytes[0] as usize] as u8;
    let mut cell = region_bounds(index);
    for &b in &bytes[1..] {
        cell = quadrant_bounds(&cell, b - b'0');
    }
    Ok(cell)
}

/// Center of the cell covered by a geokey, as a `Point` (x = longitude).
///
/// The round trip `decode(encode(p, n))` lands within half a cell of `p` on
/// each axis.
pub fn decode(geokey: &str) -> Result<Point> {
    decode_bounds(geokey).map(|cell| cell.center())
}

/// Re-encode a native geohash (as found in tile rows) as a hybrid geokey.
pub fn from_native_geohash(hash: &str, length: usize) -> Result<String> {
    let (coord, _, _) = geohash::decode(hash)
        .map_err(|e| GeoscopeError::Decode(format!("Invalid geohash {:?}: {}", hash, e)))?;
    encode(coord.y, coord.x, length)
}

/// Memoizes geokey decoding. Backend rows repeat the same geokeys across
/// queries, so decoding each one once is enough.
#[derive(Debug, Default)]
pub struct DecodeCache {
    points: Mutex<FxHashMap<String, Point>>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&self, geokey: &str) -> Result<Point> {
        if let Some(point) = self.points.lock().get(geokey) {
            return Ok(*point);
        }
        let point = decode(geokey)?;
        self.points.lock().insert(geokey.to_string(), point);
        Ok(point)
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }
}
