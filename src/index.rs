//! The per-session spatial index.
//!
//! ```rust
//! use geoscope::{Bounds, MemoryTileSource, SpatialIndex};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let tile = "geokey\tpage_title\tname\tpage_len\ns00\tAlpha\tAlpha\t42\n";
//! let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", tile));
//! let index = SpatialIndex::builder().tile_source(source).build()?;
//!
//! let places = index
//!     .get_entries_in_bounds(&Bounds::new(1.0, 10.0, 1.0, 10.0), 2)
//!     .await?;
//! assert_eq!(places[0].page_title, "Alpha");
//! # Ok::<(), geoscope::GeoscopeError>(())
//! # }).unwrap();
//! ```

use crate::builder::IndexBuilder;
use crate::compute::enumerate::overlapping_geokeys_within;
use crate::compute::validation::{validate_bounds, validate_geokey, validate_zoom_level};
use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use crate::ingest::ledger::TileStatus;
use crate::ingest::tile::tiles_for_bounds;
use crate::ingest::{IngestStats, TileStore};
use crate::query::backend::QueryClient;
use crate::query::events::{EventEngine, EventsInView};
use crate::query::places::Geodata;
use crate::query::viewport::select_entries;
use geoscope_types::{Bounds, PlaceRecord, QueryDate};
use std::sync::Arc;

/// Owns the place trie, the tile ledger, the search capability and the
/// event engine of one session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SpatialIndex {
    pub(crate) config: Arc<Config>,
    pub(crate) tiles: Arc<TileStore>,
    pub(crate) queries: Option<Arc<QueryClient>>,
    pub(crate) events: Option<Arc<EventEngine>>,
}

impl SpatialIndex {
    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tile URLs a viewport needs.
    pub fn tiles_for_bounds(&self, bounds: &Bounds) -> Result<Vec<String>> {
        tiles_for_bounds(&self.config, bounds)
    }

    /// Ingest `urls`, fetching each at most once per session.
    pub async fn ensure_loaded(&self, urls: &[String]) -> Result<()> {
        self.tiles.ensure_loaded(urls).await
    }

    /// Places to draw for a viewport at a zoom level (geokey length).
    ///
    /// Loads the tiles covering `bounds` first, then returns the best place
    /// per overlapping geokey, filtered, sorted and capped. Viewports with
    /// more than `max_viewport_geokeys` keys at `zoom` are rejected before
    /// any tile is fetched.
    pub async fn get_entries_in_bounds(
        &self,
        bounds: &Bounds,
        zoom: usize,
    ) -> Result<Vec<Arc<PlaceRecord>>> {
        validate_bounds(bounds)?;
        validate_zoom_level(zoom, self.config.max_geokey_length)?;

        let geokeys = overlapping_geokeys_within(bounds, zoom, self.config.max_viewport_geokeys)?;
        let urls = self.tiles_for_bounds(bounds)?;
        self.ensure_loaded(&urls).await?;

        let candidates = self.tiles.best_entries(geokeys.iter().map(String::as_str));
        let entries = select_entries(candidates, bounds, zoom, self.config.max_results);
        log::debug!(
            "Viewport {:?} at zoom {}: {} geokeys, {} places",
            bounds,
            zoom,
            geokeys.len(),
            entries.len()
        );
        Ok(entries)
    }

    /// Best place stored under `geokey` or any longer key it prefixes.
    pub fn get_best_representative(&self, geokey: &str) -> Result<Option<Arc<PlaceRecord>>> {
        validate_geokey(geokey)?;
        Ok(self.tiles.best_entry(geokey))
    }

    pub fn text_search(&self, query: &str, limit: usize) -> Vec<Arc<PlaceRecord>> {
        self.tiles.text_search(query, limit)
    }

    /// Representative events for a viewport and date. Requires a lookup
    /// service.
    pub async fn get_events_for_bounds_and_date(
        &self,
        bounds: &Bounds,
        zoom: usize,
        date: QueryDate,
        strict: bool,
    ) -> Result<EventsInView> {
        validate_zoom_level(zoom, self.config.max_geokey_length)?;
        self.event_engine()?
            .events_for_bounds_and_date(bounds, zoom, date, strict)
            .await
    }

    /// Places and dot markers for a viewport, straight from the lookup
    /// service.
    pub async fn geodata_from_bounds(&self, bounds: &Bounds, max_zoom: usize) -> Result<Geodata> {
        validate_zoom_level(max_zoom, self.config.max_geokey_length)?;
        self.query_client()?
            .geodata_from_bounds(bounds, max_zoom)
            .await
    }

    pub fn query_client(&self) -> Result<&Arc<QueryClient>> {
        self.queries.as_ref().ok_or_else(|| {
            GeoscopeError::Config("no lookup service configured for this index".to_string())
        })
    }

    fn event_engine(&self) -> Result<&Arc<EventEngine>> {
        self.events.as_ref().ok_or_else(|| {
            GeoscopeError::Config("no lookup service configured for this index".to_string())
        })
    }

    pub fn tile_status(&self, url: &str) -> TileStatus {
        self.tiles.tile_status(url)
    }

    pub fn stats(&self) -> IngestStats {
        self.tiles.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tile::MemoryTileSource;
    use crate::query::backend::MemoryLookupService;

    const TILE_S: &str = "geokey\tpage_title\tname\tpage_len\n\
                          s00\tAlpha\tAlpha\t42\n\
                          s01\tBeta\tBeta\t7\n\
                          s3\tGamma\tGamma\t100\n";

    fn index() -> SpatialIndex {
        let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", TILE_S));
        SpatialIndex::builder().tile_source(source).build().unwrap()
    }

    #[tokio::test]
    async fn test_entries_in_bounds() {
        let index = index();
        let bounds = Bounds::new(1.0, 20.0, 1.0, 20.0);
        let places = index.get_entries_in_bounds(&bounds, 2).await.unwrap();
        // "s00" and "s01" share the zoom-2 key "s0"; Alpha wins on score.
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].page_title, "Alpha");

        let places = index.get_entries_in_bounds(&bounds, 3).await.unwrap();
        let titles: Vec<_> = places.iter().map(|p| p.page_title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(index.stats().tiles_loaded, 1);
    }

    #[tokio::test]
    async fn test_best_representative() {
        let index = index();
        index
            .ensure_loaded(&["geodata/s.csv.gz".to_string()])
            .await
            .unwrap();
        let best = index.get_best_representative("s").unwrap().unwrap();
        assert_eq!(best.page_title, "Gamma");
        assert_eq!(index.get_best_representative("s0").unwrap().unwrap().page_len, 42);
        assert!(index.get_best_representative("s2").unwrap().is_none());
        assert!(index.get_best_representative("bc").is_err());
    }

    #[tokio::test]
    async fn test_invalid_zoom() {
        let index = index();
        let bounds = Bounds::new(1.0, 20.0, 1.0, 20.0);
        assert!(matches!(
            index.get_entries_in_bounds(&bounds, 0).await,
            Err(GeoscopeError::InvalidInput(_))
        ));
        assert!(index.get_entries_in_bounds(&bounds, 17).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_viewport_rejected_before_loading() {
        let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", TILE_S));
        let index = SpatialIndex::builder()
            .tile_source(source.clone())
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let err = index
            .get_entries_in_bounds(&Bounds::world(), 16)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoscopeError::InvalidInput(_)));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(source.fetch_count("geodata/geo3_unique.csv.gz"), 0);

        // A tighter budget rejects a viewport the default accepts.
        let index = SpatialIndex::builder()
            .config(Config::default().with_max_viewport_geokeys(1))
            .tile_source(source)
            .build()
            .unwrap();
        let bounds = Bounds::new(1.0, 20.0, 1.0, 20.0);
        assert!(index.get_entries_in_bounds(&bounds, 2).await.is_ok());
        assert!(index.get_entries_in_bounds(&bounds, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_events_need_lookup_service() {
        let index = index();
        let err = index
            .get_events_for_bounds_and_date(&Bounds::world(), 1, QueryDate::year(1815), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GeoscopeError::Config(_)));

        let index = SpatialIndex::builder()
            .lookup_service(Arc::new(MemoryLookupService::new()))
            .build()
            .unwrap();
        let view = index
            .get_events_for_bounds_and_date(&Bounds::world(), 1, QueryDate::year(1815), false)
            .await
            .unwrap();
        assert!(view.events.is_empty());
    }
}
