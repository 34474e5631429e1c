//! Tile ingestion: fetch, decode, insert into the trie, then publish.
//!
//! A call to [`TileStore::ensure_loaded`] claims the URLs nobody has fetched
//! yet and spawns one batch task for them. The batch fetches and decodes its
//! tiles concurrently, inserts all rows, recomputes best entries once and
//! rebuilds the text search once. Callers that ask for a URL already in
//! flight await the same shared future. The task runs to completion even if
//! every caller stops waiting, so its rows still land in the trie.

pub mod ledger;
pub mod search;
pub mod tile;

use crate::compute::trie::PrefixTrie;
use crate::error::{GeoscopeError, Result};
use futures::FutureExt;
use futures::future::join_all;
use geoscope_types::PlaceRecord;
use ledger::{IngestionLedger, TileFuture, TileStatus};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use search::TextSearch;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tile::{TileDecoder, TileSource};

type BatchOutcome = Arc<FxHashMap<String, Result<()>>>;

/// Counters describing what the store has ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub places: usize,
    pub tiles_loaded: usize,
    pub tiles_in_flight: usize,
    pub batches: usize,
}

/// Owner of the place trie, the searchable list and the tile ledger.
pub struct TileStore {
    source: Arc<dyn TileSource>,
    decoder: Arc<dyn TileDecoder>,
    places: RwLock<PrefixTrie<PlaceRecord>>,
    searchable: RwLock<Vec<Arc<PlaceRecord>>>,
    search: RwLock<Box<dyn TextSearch>>,
    ledger: IngestionLedger,
    batches: AtomicUsize,
}

impl TileStore {
    pub fn new(
        source: Arc<dyn TileSource>,
        decoder: Arc<dyn TileDecoder>,
        search: Box<dyn TextSearch>,
    ) -> Self {
        Self {
            source,
            decoder,
            places: RwLock::new(PrefixTrie::new()),
            searchable: RwLock::new(Vec::new()),
            search: RwLock::new(search),
            ledger: IngestionLedger::new(),
            batches: AtomicUsize::new(0),
        }
    }

    /// Make sure every URL in `urls` has been ingested.
    ///
    /// Returns the first failure among the requested URLs. Failed URLs are
    /// forgotten by the ledger, so calling again retries them.
    pub async fn ensure_loaded(self: &Arc<Self>, urls: &[String]) -> Result<()> {
        let waits = self.ledger.claim(urls, |fresh| self.start_batch(fresh));
        for result in join_all(waits).await {
            result?;
        }
        Ok(())
    }

    fn start_batch(self: &Arc<Self>, urls: Vec<String>) -> Vec<(String, TileFuture)> {
        log::debug!("Starting ingestion batch of {} tiles", urls.len());

        let store = Arc::clone(self);
        let task_urls = urls.clone();
        let handle = tokio::spawn(async move { store.ingest_batch(task_urls).await });

        let store = Arc::clone(self);
        let batch_urls = urls.clone();
        let batch = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::warn!("Ingestion task failed: {}", e);
                    let outcome = batch_urls
                        .into_iter()
                        .map(|url| {
                            store.ledger.reset(&url);
                            let err = GeoscopeError::TileLoad {
                                url: url.clone(),
                                reason: format!("ingestion task failed: {}", e),
                            };
                            (url, Err(err))
                        })
                        .collect();
                    Arc::new(outcome)
                }
            }
        }
        .boxed()
        .shared();

        urls.into_iter()
            .map(|url| {
                let batch = batch.clone();
                let key = url.clone();
                let future = async move { batch.await.get(&key).cloned().unwrap_or(Ok(())) }
                    .boxed()
                    .shared();
                (url, future)
            })
            .collect()
    }

    async fn ingest_batch(&self, urls: Vec<String>) -> BatchOutcome {
        let fetched = join_all(urls.iter().map(|url| self.load_tile(url))).await;

        let mut outcome = FxHashMap::default();
        let mut loaded = Vec::new();
        for (url, result) in urls.into_iter().zip(fetched) {
            match result {
                Ok(rows) => loaded.push((url, rows)),
                Err(e) => {
                    log::warn!("{}", e);
                    outcome.insert(url, Err(e));
                }
            }
        }

        if !loaded.is_empty() {
            let mut trie = self.places.write();
            let mut added = Vec::new();
            for (url, rows) in loaded {
                log::info!("Loaded {} rows from {}", rows.len(), url);
                for row in rows {
                    let row = Arc::new(row);
                    match trie.insert(Arc::clone(&row)) {
                        Ok(()) => added.push(row),
                        Err(e) => log::warn!("Skipping row {} from {}: {}", row.id(), url, e),
                    }
                }
                outcome.insert(url, Ok(()));
            }
            trie.compute_best_entries("");
            log::debug!("Recomputed best entries over {} places", trie.len());

            let mut searchable = self.searchable.write();
            searchable.extend(added);
            self.search.write().rebuild(&searchable);
        }

        for (url, result) in &outcome {
            match result {
                Ok(()) => self.ledger.mark_done(url),
                Err(_) => self.ledger.reset(url),
            }
        }
        self.batches.fetch_add(1, Ordering::Relaxed);
        Arc::new(outcome)
    }

    async fn load_tile(&self, url: &str) -> Result<Vec<PlaceRecord>> {
        log::debug!("Fetching tile {}", url);
        let tile_error = |e: GeoscopeError| match e {
            GeoscopeError::TileLoad { .. } => e,
            other => GeoscopeError::TileLoad {
                url: url.to_string(),
                reason: other.to_string(),
            },
        };
        let body = self.source.fetch(url).await.map_err(tile_error)?;
        self.decoder.decode(&body).map_err(tile_error)
    }

    /// Best place for a geokey prefix, as of the last completed batch.
    pub fn best_entry(&self, prefix: &str) -> Option<Arc<PlaceRecord>> {
        self.places.read().best_entry(prefix)
    }

    /// Best places for many prefixes under one read lock, in input order.
    pub fn best_entries<'a>(
        &self,
        prefixes: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Option<Arc<PlaceRecord>>> {
        let trie = self.places.read();
        prefixes
            .into_iter()
            .map(|prefix| trie.best_entry(prefix))
            .collect()
    }

    pub fn text_search(&self, query: &str, limit: usize) -> Vec<Arc<PlaceRecord>> {
        self.search.read().search(query, limit)
    }

    pub fn tile_status(&self, url: &str) -> TileStatus {
        self.ledger.status(url)
    }

    pub fn stats(&self) -> IngestStats {
        let (tiles_in_flight, tiles_loaded) = self.ledger.counts();
        IngestStats {
            places: self.places.read().len(),
            tiles_loaded,
            tiles_in_flight,
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}
