//! Tile fetching, tile selection and row decoding.

use crate::compute::enumerate::overlapping_regions;
use crate::compute::geokey::{decode, encode};
use crate::compute::validation::validate_geokey;
use crate::config::Config;
use crate::error::{GeoscopeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use geoscope_types::{Bounds, PlaceRecord};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Where tile bodies come from.
///
/// Implementations return the decompressed body; transport and
/// decompression are their business.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// In-memory tile source, mostly for tests and offline use.
///
/// Counts fetches per URL.
#[derive(Debug, Default)]
pub struct MemoryTileSource {
    tiles: Mutex<FxHashMap<String, Bytes>>,
    fetches: Mutex<FxHashMap<String, usize>>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.tiles.lock().insert(url.into(), body.into());
    }

    pub fn with_tile(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.insert(url, body);
        self
    }

    /// How many times `url` was fetched, including failed fetches.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TileSource for MemoryTileSource {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        *self.fetches.lock().entry(url.to_string()).or_insert(0) += 1;
        self.tiles
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| GeoscopeError::TileLoad {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}

/// Turns a tile body into place records.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Vec<PlaceRecord>>;
}

/// Decoder for tab-separated tiles with a header line.
///
/// Recognised columns: `geokey` (hybrid) or `geohash` (native), `page_title`,
/// `name`, `category` and `page_len`. Rows that cannot be located or scored
/// are skipped with a warning; the rest of the tile still loads.
#[derive(Debug, Clone)]
pub struct TsvTileDecoder {
    place_geokey_length: usize,
}

impl TsvTileDecoder {
    pub fn new(place_geokey_length: usize) -> Self {
        Self {
            place_geokey_length,
        }
    }
}

impl Default for TsvTileDecoder {
    fn default() -> Self {
        Self::new(Config::default().place_geokey_length)
    }
}

struct Columns {
    geokey: Option<usize>,
    geohash: Option<usize>,
    page_title: usize,
    name: Option<usize>,
    category: Option<usize>,
    page_len: Option<usize>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);

        let geokey = find("geokey");
        let geohash = find("geohash");
        if geokey.is_none() && geohash.is_none() {
            return Err(GeoscopeError::Decode(
                "tile header has neither a geokey nor a geohash column".to_string(),
            ));
        }
        let page_title = find("page_title").ok_or_else(|| {
            GeoscopeError::Decode("tile header has no page_title column".to_string())
        })?;

        Ok(Self {
            geokey,
            geohash,
            page_title,
            name: find("name"),
            category: find("category"),
            page_len: find("page_len"),
        })
    }
}

fn field<'a>(fields: &[&'a str], idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| fields.get(i))
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
}

impl TsvTileDecoder {
    fn decode_row(&self, columns: &Columns, line: &str) -> Result<PlaceRecord> {
        let fields: Vec<&str> = line.split('\t').collect();

        let page_title = field(&fields, Some(columns.page_title))
            .ok_or_else(|| GeoscopeError::InvalidInput("empty page_title".to_string()))?;

        let (geokey, lat, lon) = if let Some(key) = field(&fields, columns.geokey) {
            validate_geokey(key)?;
            let center = decode(key)?;
            (key.to_string(), center.y(), center.x())
        } else if let Some(hash) = field(&fields, columns.geohash) {
            let (coord, _, _) = geohash::decode(hash).map_err(|e| {
                GeoscopeError::InvalidInput(format!("invalid geohash {:?}: {}", hash, e))
            })?;
            let key = encode(coord.y, coord.x, self.place_geokey_length)?;
            (key, coord.y, coord.x)
        } else {
            return Err(GeoscopeError::InvalidInput(
                "row has no location".to_string(),
            ));
        };

        let page_len = match field(&fields, columns.page_len) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                GeoscopeError::InvalidInput(format!("non-numeric page_len {:?}", raw))
            })?,
            None => 0,
        };

        let mut record = PlaceRecord::new(geokey, page_title, page_len);
        record.name = field(&fields, columns.name).map(str::to_string);
        record.category = field(&fields, columns.category).map(str::to_string);
        record.lat = lat;
        record.lon = lon;
        Ok(record)
    }
}

impl TileDecoder for TsvTileDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<PlaceRecord>> {
        let text = std::str::from_utf8(body)
            .map_err(|e| GeoscopeError::Decode(format!("tile is not UTF-8: {}", e)))?;
        let mut lines = text.lines().enumerate();

        let header = lines
            .by_ref()
            .find(|(_, line)| !line.trim().is_empty())
            .map(|(_, line)| line)
            .ok_or_else(|| GeoscopeError::Decode("tile has no header line".to_string()))?;
        let columns = Columns::from_header(header)?;

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            match self.decode_row(&columns, line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping tile row at line {}: {}", idx + 1, e);
                }
            }
        }
        if skipped > 0 {
            log::debug!("Decoded {} rows, skipped {}", records.len(), skipped);
        }
        Ok(records)
    }
}

/// Tile URLs covering a viewport.
///
/// A viewport touching more than `overview_region_threshold` regions only
/// loads the overview tile; smaller viewports load one tile per region.
pub fn tiles_for_bounds(config: &Config, bounds: &Bounds) -> Result<Vec<String>> {
    let regions = overlapping_regions(bounds)?;
    if regions.len() > config.overview_region_threshold {
        return Ok(vec![format!(
            "{}{}",
            config.tile_base_path, config.overview_tile
        )]);
    }
    Ok(regions
        .into_iter()
        .map(|region| format!("{}{}.csv.gz", config.tile_base_path, region))
        .collect())
}
