//! Date scoring of events and prefix bucketing.
//!
//! Events are scored against a query window, sorted best first, and then
//! walked prefix by prefix: the first event to reach a geokey prefix becomes
//! that prefix's representative, later events at the exact same location are
//! kept alongside it, and the rest are kept (capped) as sub-events per zoom
//! level so the viewport can draw them as dots.

use geoscope_types::{EventDate, EventRecord, QueryDate};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Inclusive date range a query is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub lower: EventDate,
    pub upper: EventDate,
}

impl DateWindow {
    pub fn new(lower: EventDate, upper: EventDate) -> Self {
        Self { lower, upper }
    }

    pub fn from_query(date: &QueryDate) -> Self {
        Self::new(date.lower_bound(), date.upper_bound())
    }

    /// Whether `[start, end]` overlaps the window.
    pub fn overlaps(&self, start: &EventDate, end: &EventDate) -> bool {
        start <= &self.upper && end >= &self.lower
    }

    /// Whether `[start, end]` lies entirely inside the window.
    pub fn contains(&self, start: &EventDate, end: &EventDate) -> bool {
        start.is_on_or_after(&self.lower) && self.upper.is_on_or_after(end)
    }

    /// Score of an event: 0 when it overlaps the window, otherwise minus the
    /// day gap to the nearer window edge.
    pub fn score(&self, event: &EventRecord) -> i64 {
        if self.overlaps(&event.start_date, &event.end_date) {
            0
        } else if event.end_date < self.lower {
            event.end_date.days_between(&self.lower).min(0)
        } else {
            self.upper.days_between(&event.start_date).min(0)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredEvent {
    pub event: Arc<EventRecord>,
    pub score: i64,
}

impl ScoredEvent {
    pub fn new(event: Arc<EventRecord>, score: i64) -> Self {
        Self { event, score }
    }
}

/// Score `events` against `window` and sort them best first, breaking ties by
/// event id.
pub fn score_and_sort(events: Vec<Arc<EventRecord>>, window: &DateWindow) -> Vec<ScoredEvent> {
    let mut scored: Vec<ScoredEvent> = events
        .into_iter()
        .map(|event| {
            let score = window.score(&event);
            ScoredEvent::new(event, score)
        })
        .collect();
    sort_scored(&mut scored);
    scored
}

pub fn sort_scored(events: &mut [ScoredEvent]) {
    events.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.event.event_id.cmp(&b.event.event_id))
    });
}

/// Drop events whose id was already seen, keeping the first occurrence.
pub fn dedup_by_id(events: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut seen = FxHashSet::default();
    events
        .into_iter()
        .filter(|event| seen.insert(event.event_id.clone()))
        .collect()
}

/// The representative event of one geokey prefix.
#[derive(Debug, Clone)]
pub struct EventBucket {
    /// The prefix this bucket represents.
    pub geokey: String,
    pub event: Arc<EventRecord>,
    pub score: i64,
    /// Later events sharing the representative's full geokey.
    pub same_location_events: Vec<Arc<EventRecord>>,
    /// Runner-up events by zoom level, at every level where they still share
    /// the representative's cell.
    pub subevents_by_zoom_level: BTreeMap<usize, Vec<Arc<EventRecord>>>,
}

impl EventBucket {
    fn new(geokey: &str, scored: &ScoredEvent) -> Self {
        Self {
            geokey: geokey.to_string(),
            event: Arc::clone(&scored.event),
            score: scored.score,
            same_location_events: Vec::new(),
            subevents_by_zoom_level: BTreeMap::new(),
        }
    }

    pub fn subevents(&self, zoom_level: usize) -> &[Arc<EventRecord>] {
        self.subevents_by_zoom_level
            .get(&zoom_level)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Prefix buckets for the events processed so far.
#[derive(Debug)]
pub struct EventBuckets {
    buckets: FxHashMap<String, EventBucket>,
    subevent_cap: usize,
}

impl EventBuckets {
    pub fn new(subevent_cap: usize) -> Self {
        Self {
            buckets: FxHashMap::default(),
            subevent_cap,
        }
    }

    /// Assign events to buckets. `events` must already be sorted best first
    /// (see [`sort_scored`]); buckets created earlier keep their
    /// representative.
    pub fn assign(&mut self, events: &[ScoredEvent]) {
        for scored in events {
            let geokey = scored.event.geokey.as_str();
            if geokey.is_empty() || !geokey.is_ascii() {
                log::warn!(
                    "Skipping event {} with malformed geokey {:?}",
                    scored.event.event_id,
                    geokey
                );
                continue;
            }
            for prefix_len in 1..=geokey.len() {
                let prefix = &geokey[..prefix_len];
                match self.buckets.get_mut(prefix) {
                    None => {
                        self.buckets
                            .insert(prefix.to_string(), EventBucket::new(prefix, scored));
                    }
                    Some(bucket) => {
                        if bucket.event.event_id == scored.event.event_id {
                            continue;
                        }
                        add_to_bucket(bucket, prefix_len, &scored.event, self.subevent_cap);
                    }
                }
            }
        }
    }

    pub fn get(&self, geokey: &str) -> Option<&EventBucket> {
        self.buckets.get(geokey)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

fn add_to_bucket(
    bucket: &mut EventBucket,
    prefix_len: usize,
    event: &Arc<EventRecord>,
    cap: usize,
) {
    let owner = bucket.event.geokey.as_bytes();
    let other = event.geokey.as_bytes();
    if owner == other {
        bucket.same_location_events.push(Arc::clone(event));
        return;
    }

    let shared = owner.len().min(other.len());
    let mut zoom = prefix_len;
    while zoom <= shared && owner[..zoom] == other[..zoom] {
        let list = bucket.subevents_by_zoom_level.entry(zoom).or_default();
        if list.len() < cap {
            list.push(Arc::clone(event));
        }
        zoom += 1;
    }
}
