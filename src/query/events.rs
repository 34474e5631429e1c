//! Event engine: date-scoped, region-memoized event buckets.
//!
//! Events are fetched one region (first geokey character) at a time, for
//! every month bucket the query date needs. Once a region has been bucketed
//! for the current date it is never fetched or assigned again; changing the
//! date or the strictness drops all buckets and bumps a generation counter
//! so that fetches started under the old date are discarded when they land.

use crate::compute::enumerate::overlapping_geokeys_within;
use crate::compute::events::{DateWindow, EventBuckets, dedup_by_id, score_and_sort};
use crate::config::Config;
use crate::error::Result;
use crate::query::backend::QueryClient;
use futures::future::try_join_all;
use geoscope_types::{Bounds, EventRecord, MonthRegion, QueryDate};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Representative event of one geokey in the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarker {
    pub geokey: String,
    pub event: Arc<EventRecord>,
    pub score: i64,
    pub same_location_events: Vec<Arc<EventRecord>>,
}

/// Result of an event viewport query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsInView {
    pub events: Vec<EventMarker>,
    pub dot_events: Vec<Arc<EventRecord>>,
}

struct EngineState {
    scope: Option<(QueryDate, bool)>,
    generation: u64,
    processed_regions: FxHashSet<char>,
    buckets: EventBuckets,
}

pub struct EventEngine {
    client: Arc<QueryClient>,
    subevent_cap: usize,
    max_viewport_geokeys: usize,
    state: Mutex<EngineState>,
}

impl EventEngine {
    pub fn new(client: Arc<QueryClient>, config: &Config) -> Self {
        Self {
            client,
            subevent_cap: config.subevent_cap,
            max_viewport_geokeys: config.max_viewport_geokeys,
            state: Mutex::new(EngineState {
                scope: None,
                generation: 0,
                processed_regions: FxHashSet::default(),
                buckets: EventBuckets::new(config.subevent_cap),
            }),
        }
    }

    /// Representative events for the geokeys of length `zoom` overlapping
    /// `bounds`, and the sub-events recorded for `zoom` as dots.
    ///
    /// Only events strictly inside `bounds` are returned. If another query
    /// switches the date scope while this one is still fetching, this one
    /// returns an empty view rather than the other date's events.
    pub async fn events_for_bounds_and_date(
        &self,
        bounds: &Bounds,
        zoom: usize,
        date: QueryDate,
        strict: bool,
    ) -> Result<EventsInView> {
        let geokeys = overlapping_geokeys_within(bounds, zoom, self.max_viewport_geokeys)?;
        let generation = self.rescope(date, strict);

        let mut regions: Vec<char> = geokeys.iter().filter_map(|k| k.chars().next()).collect();
        regions.dedup();
        let missing: Vec<char> = {
            let state = self.state.lock();
            regions
                .into_iter()
                .filter(|r| !state.processed_regions.contains(r))
                .collect()
        };

        try_join_all(
            missing
                .into_iter()
                .map(|region| self.load_region(region, date, strict, generation)),
        )
        .await?;

        let state = self.state.lock();
        let mut view = EventsInView::default();
        if state.generation != generation {
            log::debug!("Date scope {:?} superseded while fetching", date);
            return Ok(view);
        }
        for geokey in &geokeys {
            let Some(bucket) = state.buckets.get(geokey) else {
                continue;
            };
            let event = &bucket.event;
            if bounds.contains_strictly(event.lat, event.lon) {
                view.events.push(EventMarker {
                    geokey: bucket.geokey.clone(),
                    event: Arc::clone(event),
                    score: bucket.score,
                    same_location_events: bucket.same_location_events.clone(),
                });
            }
            view.dot_events.extend(
                bucket
                    .subevents(zoom)
                    .iter()
                    .filter(|e| bounds.contains_strictly(e.lat, e.lon))
                    .cloned(),
            );
        }
        Ok(view)
    }

    /// Reset buckets when the date scope changes; returns the generation the
    /// caller works under.
    fn rescope(&self, date: QueryDate, strict: bool) -> u64 {
        let mut state = self.state.lock();
        if state.scope != Some((date, strict)) {
            if state.scope.is_some() {
                log::debug!(
                    "Event date scope changed to {:?} (strict: {}), dropping {} buckets",
                    date,
                    strict,
                    state.buckets.len()
                );
            }
            state.scope = Some((date, strict));
            state.generation += 1;
            state.processed_regions.clear();
            state.buckets = EventBuckets::new(self.subevent_cap);
        }
        state.generation
    }

    async fn load_region(
        &self,
        region: char,
        date: QueryDate,
        strict: bool,
        generation: u64,
    ) -> Result<()> {
        let keys: Vec<String> = date
            .month_buckets(strict)
            .into_iter()
            .map(|month| MonthRegion::new(date.year, month, region).to_string())
            .collect();
        let rows = self.client.events_by_month_regions(&keys).await?;

        let window = DateWindow::from_query(&date);
        let events: Vec<EventRecord> = rows.iter().flat_map(|row| row.events.clone()).collect();
        let events: Vec<Arc<EventRecord>> = dedup_by_id(events)
            .into_iter()
            .filter(|e| !strict || window.contains(&e.start_date, &e.end_date))
            .map(Arc::new)
            .collect();
        let scored = score_and_sort(events, &window);

        let mut state = self.state.lock();
        if state.generation != generation {
            log::debug!("Discarding region {} fetched for a stale date scope", region);
            return Ok(());
        }
        if !state.processed_regions.insert(region) {
            return Ok(());
        }
        state.buckets.assign(&scored);
        Ok(())
    }

    /// Number of prefix buckets for the current date scope.
    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }
}
