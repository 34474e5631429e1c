//! Index builder for flexible configuration
//!
//! Collaborators (tile source, row decoder, text search, lookup service) are
//! plugged in here; anything left out gets an in-memory or default
//! implementation.

use crate::config::Config;
use crate::error::Result;
use crate::index::SpatialIndex;
use crate::ingest::TileStore;
use crate::ingest::search::{SubstringSearch, TextSearch};
use crate::ingest::tile::{MemoryTileSource, TileDecoder, TileSource, TsvTileDecoder};
use crate::query::backend::{LookupService, QueryClient};
use crate::query::events::EventEngine;
use std::sync::Arc;

/// Builder for a [`SpatialIndex`].
pub struct IndexBuilder {
    config: Config,
    source: Option<Arc<dyn TileSource>>,
    decoder: Option<Arc<dyn TileDecoder>>,
    search: Option<Box<dyn TextSearch>>,
    lookup: Option<Arc<dyn LookupService>>,
}

impl IndexBuilder {
    /// Create a builder with the default configuration and no collaborators.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            source: None,
            decoder: None,
            search: None,
            lookup: None,
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Where tiles are fetched from. Defaults to an empty in-memory source.
    pub fn tile_source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// How tile bodies are parsed. Defaults to [`TsvTileDecoder`].
    pub fn tile_decoder(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Text search capability. Defaults to [`SubstringSearch`].
    pub fn text_search(mut self, search: Box<dyn TextSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Remote lookup service; enables event queries and backend viewport
    /// queries.
    pub fn lookup_service(mut self, service: Arc<dyn LookupService>) -> Self {
        self.lookup = Some(service);
        self
    }

    /// Validate the configuration and assemble the index.
    pub fn build(self) -> Result<SpatialIndex> {
        self.config.validate()?;

        let source = self
            .source
            .unwrap_or_else(|| Arc::new(MemoryTileSource::new()) as Arc<dyn TileSource>);
        let decoder = self
            .decoder
            .unwrap_or_else(|| {
                Arc::new(TsvTileDecoder::new(self.config.place_geokey_length)) as Arc<dyn TileDecoder>
            });
        let search = self
            .search
            .unwrap_or_else(|| Box::new(SubstringSearch::new()) as Box<dyn TextSearch>);

        let queries = self
            .lookup
            .map(|service| Arc::new(QueryClient::new(service, &self.config)));
        let events = queries
            .as_ref()
            .map(|client| Arc::new(EventEngine::new(Arc::clone(client), &self.config)));

        Ok(SpatialIndex {
            config: Arc::new(self.config),
            tiles: Arc::new(TileStore::new(source, decoder, search)),
            queries,
            events,
        })
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}
