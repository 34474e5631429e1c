//! Client-local spatial index for viewport queries over tiled place and event data.
//!
//! ```rust
//! use geoscope::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let tile = "geokey\tpage_title\tname\tpage_len\ns01\tAlpha\tAlpha\t42\n";
//! let source = Arc::new(MemoryTileSource::new().with_tile("geodata/s.csv.gz", tile));
//! let index = IndexBuilder::new().tile_source(source).build()?;
//!
//! let bounds = Bounds::new(1.0, 20.0, 1.0, 20.0);
//! let places = index.get_entries_in_bounds(&bounds, 3).await?;
//! assert_eq!(places[0].page_title, "Alpha");
//! assert_eq!(encode(places[0].lat, places[0].lon, 3)?, "s01");
//! # Ok::<(), GeoscopeError>(())
//! # }).unwrap();
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod index;
pub mod ingest;
pub mod query;
pub mod worker;

pub use builder::IndexBuilder;
pub use config::Config;
pub use error::{GeoscopeError, Result};
pub use index::SpatialIndex;

pub use geo::{Point, Rect};
pub use geoscope_types::{
    Bounds, DatePart, DotMarker, EventDate, EventRecord, MonthRegion, MonthRegionEvents,
    PageEvents, PlaceRecord, QueryDate,
};

pub use compute::enumerate::{overlapping_geokeys, overlapping_geokeys_within};
pub use compute::geokey::{DecodeCache, decode, decode_bounds, encode};
pub use compute::trie::{PrefixTrie, TrieEntry};

pub use ingest::IngestStats;
pub use ingest::ledger::TileStatus;
pub use ingest::search::{SubstringSearch, TextSearch};
pub use ingest::tile::{MemoryTileSource, TileDecoder, TileSource, TsvTileDecoder};

pub use query::backend::{LookupService, MemoryLookupService, QueryClient};
pub use query::events::{EventMarker, EventsInView};
pub use query::places::Geodata;

pub use worker::{Request, Response, WorkerHandle, spawn_worker};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeoscopeError, IndexBuilder, Result, SpatialIndex};

    pub use crate::{Bounds, EventRecord, PlaceRecord, QueryDate};

    pub use crate::{decode, encode, overlapping_geokeys};

    pub use crate::{Config, LookupService, MemoryTileSource, TileSource};

    pub use crate::{WorkerHandle, spawn_worker};

    pub use std::time::Duration;
}
