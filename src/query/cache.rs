//! Keyed memoization and fixed-size batching for lookup queries.

use crate::error::Result;
use futures::future::try_join_all;
use geoscope_types::{EventRecord, MonthRegionEvents, PageEvents, PlaceRecord};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::future::Future;
use std::sync::Arc;

/// Rows that know the key they answer.
pub trait CacheKeyed {
    fn cache_key(&self) -> &str;
}

impl CacheKeyed for PlaceRecord {
    fn cache_key(&self) -> &str {
        &self.geokey
    }
}

impl CacheKeyed for EventRecord {
    fn cache_key(&self) -> &str {
        &self.event_id
    }
}

impl CacheKeyed for MonthRegionEvents {
    fn cache_key(&self) -> &str {
        &self.month_region
    }
}

impl CacheKeyed for PageEvents {
    fn cache_key(&self) -> &str {
        &self.page_title
    }
}

/// Memo of lookup results.
///
/// `None` is a negative entry: the key was asked for and the service had no
/// row, so it is not asked again.
#[derive(Debug)]
pub struct QueryCache<T> {
    entries: Mutex<FxHashMap<String, Option<Arc<T>>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the key was never looked up, `Some(None)` for a cached miss.
    pub fn get(&self, key: &str) -> Option<Option<Arc<T>>> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.get_mut().clear();
    }
}

/// Answer `keys` from `cache`, fetching only the keys never seen before.
///
/// Misses are fetched in one call to `fetch`. Every returned row is stored
/// under its own key and every requested key that produced no row is stored
/// as a negative entry. Cached rows come first in the result, followed by the
/// fresh rows in the order the service returned them. A failed fetch caches
/// nothing.
pub async fn query_with_cache<T, F, Fut>(
    keys: &[String],
    cache: &QueryCache<T>,
    fetch: F,
) -> Result<Vec<Arc<T>>>
where
    T: CacheKeyed,
    F: FnOnce(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let mut hits = Vec::new();
    let mut misses = Vec::new();
    {
        let entries = cache.entries.lock();
        let mut seen = FxHashSet::default();
        for key in keys {
            match entries.get(key) {
                Some(Some(row)) => hits.push(Arc::clone(row)),
                Some(None) => {}
                None => {
                    if seen.insert(key.as_str()) {
                        misses.push(key.clone());
                    }
                }
            }
        }
    }

    if misses.is_empty() {
        return Ok(hits);
    }

    let requested = misses.clone();
    let rows = fetch(misses).await?;

    let mut entries = cache.entries.lock();
    let mut fresh = Vec::with_capacity(rows.len());
    for row in rows {
        let row = Arc::new(row);
        entries.insert(row.cache_key().to_string(), Some(Arc::clone(&row)));
        fresh.push(row);
    }
    for key in requested {
        entries.entry(key).or_insert(None);
    }

    hits.extend(fresh);
    Ok(hits)
}

/// Run `fetch` over `keys` in chunks of at most `batch_size`, concurrently,
/// and concatenate the rows in chunk order.
pub async fn query_by_batch<T, F, Fut>(
    keys: Vec<String>,
    batch_size: usize,
    fetch: F,
) -> Result<Vec<T>>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let batch_size = batch_size.max(1);
    if keys.len() <= batch_size {
        return fetch(keys).await;
    }
    let chunks = try_join_all(keys.chunks(batch_size).map(|chunk| fetch(chunk.to_vec()))).await?;
    Ok(chunks.into_iter().flatten().collect())
}
