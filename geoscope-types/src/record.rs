use crate::date::EventDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A geolocated page (a "place") as stored in tiles and returned by the
/// places-by-geokey lookup.
///
/// `lat`/`lon` are derived from the geokey when the record is ingested; rows
/// coming off the wire may leave them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    /// Hybrid geokey of the place (the key used for lookups and the trie).
    pub geokey: String,
    /// Longer geokey locating the place more precisely than `geokey`, if any.
    #[serde(default, alias = "full_hybrid_geohash", skip_serializing_if = "Option::is_none")]
    pub full_geokey: Option<String>,
    pub page_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub page_len: i64,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    /// Precomputed dot geokeys per zoom level, shown around the place when the
    /// viewport is at that zoom.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dots: BTreeMap<usize, Vec<String>>,
}

impl PlaceRecord {
    pub fn new(geokey: impl Into<String>, page_title: impl Into<String>, page_len: i64) -> Self {
        Self {
            geokey: geokey.into(),
            full_geokey: None,
            page_title: page_title.into(),
            name: None,
            category: None,
            page_len,
            lat: 0.0,
            lon: 0.0,
            dots: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The most precise geokey known for this place.
    pub fn location_key(&self) -> &str {
        self.full_geokey.as_deref().unwrap_or(&self.geokey)
    }

    /// Stable identity of a tile row.
    pub fn id(&self) -> String {
        format!("{}-{}", self.geokey, self.page_title)
    }
}

/// A dated, geolocated historical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    /// Full-precision hybrid geokey of the event location.
    #[serde(alias = "geohash4")]
    pub geokey: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    pub start_date: EventDate,
    pub end_date: EventDate,
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lon: f64,
    /// Remaining payload fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EventRecord {
    pub fn new(
        event_id: impl Into<String>,
        geokey: impl Into<String>,
        start_date: EventDate,
        end_date: EventDate,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            geokey: geokey.into(),
            name: String::new(),
            page_title: None,
            start_date,
            end_date,
            lat: 0.0,
            lon: 0.0,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// One row of the events-by-month-region lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRegionEvents {
    pub month_region: String,
    pub events: Vec<EventRecord>,
}

/// One row of the events-by-page lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageEvents {
    pub page_title: String,
    pub events: Vec<EventRecord>,
}

/// A lightweight marker drawn for places hidden behind a representative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotMarker {
    pub geokey: String,
    pub lat: f64,
    pub lon: f64,
}
