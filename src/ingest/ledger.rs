//! Registry of tile URLs: absent, in flight, or done.
//!
//! Every URL is fetched at most once per session. While a fetch is in
//! flight its shared future is stored here so concurrent callers await the
//! same result; on failure the entry is removed so a later call retries.

use crate::error::Result;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// Completion of one tile, shared by every caller waiting on it.
pub type TileFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Externally visible state of a tile URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    Absent,
    InFlight,
    Done,
}

enum TileState {
    InFlight(TileFuture),
    Done,
}

#[derive(Default)]
pub struct IngestionLedger {
    entries: Mutex<FxHashMap<String, TileState>>,
}

impl IngestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `urls` for loading.
    ///
    /// Under a single lock: done URLs are skipped, in-flight URLs contribute
    /// their existing future, and absent URLs (deduplicated, in request order)
    /// are handed to `start`, which must return one future per URL. Those
    /// futures are registered as in flight before the lock is released, so no
    /// two callers can start the same URL.
    ///
    /// Returns the futures the caller has to await.
    pub fn claim<F>(&self, urls: &[String], start: F) -> Vec<TileFuture>
    where
        F: FnOnce(Vec<String>) -> Vec<(String, TileFuture)>,
    {
        let mut entries = self.entries.lock();
        let mut waits = Vec::new();
        let mut fresh: Vec<String> = Vec::new();

        for url in urls {
            match entries.get(url) {
                Some(TileState::Done) => {}
                Some(TileState::InFlight(future)) => waits.push(future.clone()),
                None => {
                    if !fresh.contains(url) {
                        fresh.push(url.clone());
                    }
                }
            }
        }

        if !fresh.is_empty() {
            for (url, future) in start(fresh) {
                waits.push(future.clone());
                entries.insert(url, TileState::InFlight(future));
            }
        }

        waits
    }

    pub fn mark_done(&self, url: &str) {
        if let Some(state) = self.entries.lock().get_mut(url) {
            *state = TileState::Done;
        }
    }

    /// Forget a failed URL so the next claim fetches it again.
    pub fn reset(&self, url: &str) {
        self.entries.lock().remove(url);
    }

    pub fn status(&self, url: &str) -> TileStatus {
        match self.entries.lock().get(url) {
            None => TileStatus::Absent,
            Some(TileState::InFlight(_)) => TileStatus::InFlight,
            Some(TileState::Done) => TileStatus::Done,
        }
    }

    /// Number of URLs in each non-absent state: `(in_flight, done)`.
    pub fn counts(&self) -> (usize, usize) {
        let entries = self.entries.lock();
        let done = entries
            .values()
            .filter(|state| matches!(state, TileState::Done))
            .count();
        (entries.len() - done, done)
    }
}
