//! # geoscope-types
//!
//! Plain data types shared by the geoscope spatial index and its callers.
//!
//! - **Bounds**: `Bounds`, the viewport rectangle in latitude/longitude
//! - **Records**: `PlaceRecord`, `EventRecord`, `DotMarker`
//! - **Dates**: `EventDate`, `QueryDate`, `DatePart`, `MonthRegion`
//!
//! All types are serializable with Serde. Field names follow the wire format of
//! the lookup service and the worker envelopes (camelCase bounds, snake_case rows).
//!
//! ## Examples
//!
//! ```rust
//! use geoscope_types::bounds::Bounds;
//!
//! let viewport = Bounds::new(10.0, 11.0, 10.0, 11.0);
//! assert!(viewport.contains(10.5, 10.5));
//! ```

pub mod bounds;
pub mod date;
pub mod record;

pub use bounds::Bounds;
pub use date::{DateParseError, DatePart, EventDate, MonthRegion, QueryDate};
pub use record::{DotMarker, EventRecord, MonthRegionEvents, PageEvents, PlaceRecord};
