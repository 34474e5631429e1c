//! Query layer: memoized backend lookups, the event engine and viewport
//! selection over the place trie.

pub mod backend;
pub mod cache;
pub mod events;
pub mod places;
pub mod viewport;
