//! Compute layer: the pure algorithms behind viewport queries.
//!
//! Nothing in here does I/O. It provides:
//! - The hybrid geokey codec and viewport enumeration
//! - The prefix trie with best-entry aggregation
//! - Date scoring and prefix bucketing of events

pub mod enumerate;
pub mod events;
pub mod geokey;
pub mod trie;
pub mod validation;
