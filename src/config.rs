//! Index configuration.
//!
//! Every field has a default, so an empty JSON object (or TOML document) is a
//! valid configuration.

use crate::error::{GeoscopeError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest geokey the index accepts. Keeps every recursive walk shallow.
pub const MAX_GEOKEY_LENGTH: usize = 24;

/// Default cap on geokeys enumerated for one viewport query.
pub const DEFAULT_MAX_VIEWPORT_GEOKEYS: usize = 1 << 16;

/// Index configuration
///
/// # Example
///
/// ```rust
/// use geoscope::Config;
///
/// let json = r#"{
///     "tile_base_path": "https://tiles.example.org/geodata/",
///     "subevent_cap": 5
/// }"#;
/// let config = Config::from_json(json)?;
/// assert_eq!(config.subevent_cap, 5);
/// assert_eq!(config.max_results, 200);
/// # Ok::<(), geoscope::GeoscopeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Prefix prepended to tile file names to build tile URLs.
    #[serde(default = "Config::default_tile_base_path")]
    pub tile_base_path: String,

    /// File name of the precomputed tile used for very wide viewports.
    #[serde(default = "Config::default_overview_tile")]
    pub overview_tile: String,

    /// When more regions than this overlap a viewport, only the overview
    /// tile is loaded.
    #[serde(default = "Config::default_overview_region_threshold")]
    pub overview_region_threshold: usize,

    /// Longest geokey (zoom level) accepted by queries and ingestion.
    #[serde(default = "Config::default_max_geokey_length")]
    pub max_geokey_length: usize,

    /// Length of the geokeys derived from native geohashes in tile rows.
    #[serde(default = "Config::default_place_geokey_length")]
    pub place_geokey_length: usize,

    /// Maximum number of places returned by one viewport query.
    #[serde(default = "Config::default_max_results")]
    pub max_results: usize,

    /// Maximum runner-up events kept per bucket and zoom level.
    #[serde(default = "Config::default_subevent_cap")]
    pub subevent_cap: usize,

    /// Keys sent per lookup-service request.
    #[serde(default = "Config::default_lookup_batch_size")]
    pub lookup_batch_size: usize,

    /// Upper bound on geokeys requested by one backend viewport query.
    #[serde(default = "Config::default_max_backend_geokeys")]
    pub max_backend_geokeys: usize,

    /// Upper bound on geokeys enumerated for one place or event viewport
    /// query. Larger viewports are rejected before they are walked.
    #[serde(default = "Config::default_max_viewport_geokeys")]
    pub max_viewport_geokeys: usize,

    /// Caller-side timeout for worker requests, in milliseconds.
    #[serde(default = "Config::default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Config {
    fn default_tile_base_path() -> String {
        "geodata/".to_string()
    }

    fn default_overview_tile() -> String {
        "geo3_unique.csv.gz".to_string()
    }

    const fn default_overview_region_threshold() -> usize {
        5
    }

    const fn default_max_geokey_length() -> usize {
        16
    }

    const fn default_place_geokey_length() -> usize {
        12
    }

    const fn default_max_results() -> usize {
        200
    }

    const fn default_subevent_cap() -> usize {
        10
    }

    const fn default_lookup_batch_size() -> usize {
        80
    }

    const fn default_max_backend_geokeys() -> usize {
        1000
    }

    const fn default_max_viewport_geokeys() -> usize {
        DEFAULT_MAX_VIEWPORT_GEOKEYS
    }

    const fn default_query_timeout_ms() -> u64 {
        30_000
    }

    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration and validate it.
    #[cfg(feature = "toml")]
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| GeoscopeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn with_tile_base_path(mut self, base: impl Into<String>) -> Self {
        self.tile_base_path = base.into();
        self
    }

    pub fn with_overview_tile(mut self, tile: impl Into<String>) -> Self {
        self.overview_tile = tile.into();
        self
    }

    pub fn with_subevent_cap(mut self, cap: usize) -> Self {
        assert!(cap > 0, "Sub-event cap must be greater than zero");
        self.subevent_cap = cap;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        assert!(max_results > 0, "Max results must be greater than zero");
        self.max_results = max_results;
        self
    }

    pub fn with_lookup_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "Lookup batch size must be greater than zero");
        self.lookup_batch_size = batch_size;
        self
    }

    pub fn with_max_viewport_geokeys(mut self, max_keys: usize) -> Self {
        assert!(max_keys > 0, "Viewport geokey budget must be greater than zero");
        self.max_viewport_geokeys = max_keys;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_geokey_length(mut self, length: usize) -> Self {
        assert!(
            (1..=MAX_GEOKEY_LENGTH).contains(&length),
            "Geokey length must be between 1 and {}",
            MAX_GEOKEY_LENGTH
        );
        self.max_geokey_length = length;
        self
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_GEOKEY_LENGTH).contains(&self.max_geokey_length) {
            return Err(GeoscopeError::Config(format!(
                "max_geokey_length must be in [1, {}], got {}",
                MAX_GEOKEY_LENGTH, self.max_geokey_length
            )));
        }
        if !(1..=self.max_geokey_length).contains(&self.place_geokey_length) {
            return Err(GeoscopeError::Config(format!(
                "place_geokey_length must be in [1, {}], got {}",
                self.max_geokey_length, self.place_geokey_length
            )));
        }
        for (name, value) in [
            ("max_results", self.max_results),
            ("subevent_cap", self.subevent_cap),
            ("lookup_batch_size", self.lookup_batch_size),
            ("max_backend_geokeys", self.max_backend_geokeys),
            ("max_viewport_geokeys", self.max_viewport_geokeys),
            ("overview_region_threshold", self.overview_region_threshold),
        ] {
            if value == 0 {
                return Err(GeoscopeError::Config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.query_timeout_ms == 0 {
            return Err(GeoscopeError::Config(
                "query_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_results > 100_000 {
            log::warn!(
                "max_results of {} is very large; viewport responses may be slow to render",
                self.max_results
            );
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_base_path: Self::default_tile_base_path(),
            overview_tile: Self::default_overview_tile(),
            overview_region_threshold: Self::default_overview_region_threshold(),
            max_geokey_length: Self::default_max_geokey_length(),
            place_geokey_length: Self::default_place_geokey_length(),
            max_results: Self::default_max_results(),
            subevent_cap: Self::default_subevent_cap(),
            lookup_batch_size: Self::default_lookup_batch_size(),
            max_backend_geokeys: Self::default_max_backend_geokeys(),
            max_viewport_geokeys: Self::default_max_viewport_geokeys(),
            query_timeout_ms: Self::default_query_timeout_ms(),
        }
    }
}
