//! Viewport query against the lookup service.

use crate::compute::enumerate::overlapping_geokeys_up_to;
use crate::error::Result;
use crate::query::backend::QueryClient;
use geoscope_types::{Bounds, DotMarker, PlaceRecord};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Places in a viewport, plus the dot markers drawn around them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geodata {
    pub entries: Vec<Arc<PlaceRecord>>,
    pub dots: Vec<DotMarker>,
}

impl QueryClient {
    /// Places stored under any geokey of length `1..=max_zoom` overlapping
    /// `bounds`, restricted to those inside `bounds`.
    ///
    /// Dots come from the places' precomputed dot geokeys for `max_zoom`.
    pub async fn geodata_from_bounds(&self, bounds: &Bounds, max_zoom: usize) -> Result<Geodata> {
        // Fails before the whole key list is built when the viewport is too big.
        let geokeys = overlapping_geokeys_up_to(bounds, max_zoom, self.max_backend_geokeys())?;

        let entries: Vec<Arc<PlaceRecord>> = self
            .places_by_geokeys(&geokeys)
            .await?
            .into_iter()
            .filter(|place| bounds.contains(place.lat, place.lon))
            .collect();

        let mut seen = FxHashSet::default();
        let mut dots = Vec::new();
        for place in &entries {
            let Some(keys) = place.dots.get(&max_zoom) else {
                continue;
            };
            for key in keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                match self.decode_cache().decode(key) {
                    Ok(point) if bounds.contains(point.y(), point.x()) => dots.push(DotMarker {
                        geokey: format!("dot-{}", key),
                        lat: point.y(),
                        lon: point.x(),
                    }),
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping dot of {}: {}", place.page_title, e),
                }
            }
        }

        Ok(Geodata { entries, dots })
    }
}
