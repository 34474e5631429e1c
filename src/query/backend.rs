//! Keyed lookups against the remote service, memoized per query family.

use crate::compute::geokey::DecodeCache;
use crate::config::Config;
use crate::error::Result;
use crate::query::cache::{QueryCache, query_by_batch, query_with_cache};
use async_trait::async_trait;
use geoscope_types::{EventRecord, MonthRegionEvents, PageEvents, PlaceRecord};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// The remote keyed-lookup service. Each call maps a list of keys to the
/// rows that exist for them; unknown keys are simply absent from the result.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn places_by_geokey(&self, geokeys: Vec<String>) -> Result<Vec<PlaceRecord>>;

    async fn events_by_id(&self, event_ids: Vec<String>) -> Result<Vec<EventRecord>>;

    async fn events_by_month_region(&self, keys: Vec<String>) -> Result<Vec<MonthRegionEvents>>;

    async fn events_by_page(&self, page_titles: Vec<String>) -> Result<Vec<PageEvents>>;
}

/// In-memory [`LookupService`] that records every call it receives.
#[derive(Debug, Default)]
pub struct MemoryLookupService {
    places: Mutex<FxHashMap<String, PlaceRecord>>,
    events: Mutex<FxHashMap<String, EventRecord>>,
    month_regions: Mutex<FxHashMap<String, Vec<EventRecord>>>,
    pages: Mutex<FxHashMap<String, Vec<EventRecord>>>,
    calls: Mutex<Vec<(&'static str, usize)>>,
}

impl MemoryLookupService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_place(&self, place: PlaceRecord) {
        self.places.lock().insert(place.geokey.clone(), place);
    }

    pub fn add_event(&self, event: EventRecord) {
        self.events
            .lock()
            .insert(event.event_id.clone(), event.clone());
        if let Some(title) = event.page_title.clone() {
            self.pages.lock().entry(title).or_default().push(event);
        }
    }

    /// File `event` under a month-region key such as `"1815-6-u"`.
    pub fn add_month_region_event(&self, month_region: impl Into<String>, event: EventRecord) {
        self.month_regions
            .lock()
            .entry(month_region.into())
            .or_default()
            .push(event.clone());
        self.add_event(event);
    }

    /// `(method, key count)` for every call so far.
    pub fn calls(&self) -> Vec<(&'static str, usize)> {
        self.calls.lock().clone()
    }

    fn record(&self, method: &'static str, keys: usize) {
        self.calls.lock().push((method, keys));
    }
}

#[async_trait]
impl LookupService for MemoryLookupService {
    async fn places_by_geokey(&self, geokeys: Vec<String>) -> Result<Vec<PlaceRecord>> {
        self.record("places_by_geokey", geokeys.len());
        let places = self.places.lock();
        Ok(geokeys.iter().filter_map(|k| places.get(k).cloned()).collect())
    }

    async fn events_by_id(&self, event_ids: Vec<String>) -> Result<Vec<EventRecord>> {
        self.record("events_by_id", event_ids.len());
        let events = self.events.lock();
        Ok(event_ids.iter().filter_map(|k| events.get(k).cloned()).collect())
    }

    async fn events_by_month_region(&self, keys: Vec<String>) -> Result<Vec<MonthRegionEvents>> {
        self.record("events_by_month_region", keys.len());
        let rows = self.month_regions.lock();
        Ok(keys
            .iter()
            .filter_map(|k| {
                rows.get(k).map(|events| MonthRegionEvents {
                    month_region: k.clone(),
                    events: events.clone(),
                })
            })
            .collect())
    }

    async fn events_by_page(&self, page_titles: Vec<String>) -> Result<Vec<PageEvents>> {
        self.record("events_by_page", page_titles.len());
        let rows = self.pages.lock();
        Ok(page_titles
            .iter()
            .filter_map(|t| {
                rows.get(t).map(|events| PageEvents {
                    page_title: t.clone(),
                    events: events.clone(),
                })
            })
            .collect())
    }
}

/// Memoizing client over a [`LookupService`].
///
/// Every family of lookups has its own cache, and rows coming back are
/// located (latitude/longitude filled in from their geokey) before being
/// cached.
pub struct QueryClient {
    service: Arc<dyn LookupService>,
    batch_size: usize,
    max_backend_geokeys: usize,
    places: QueryCache<PlaceRecord>,
    events: QueryCache<EventRecord>,
    month_regions: QueryCache<MonthRegionEvents>,
    pages: QueryCache<PageEvents>,
    decoded: DecodeCache,
}

impl QueryClient {
    pub fn new(service: Arc<dyn LookupService>, config: &Config) -> Self {
        Self {
            service,
            batch_size: config.lookup_batch_size,
            max_backend_geokeys: config.max_backend_geokeys,
            places: QueryCache::new(),
            events: QueryCache::new(),
            month_regions: QueryCache::new(),
            pages: QueryCache::new(),
            decoded: DecodeCache::new(),
        }
    }

    pub(crate) fn max_backend_geokeys(&self) -> usize {
        self.max_backend_geokeys
    }

    pub(crate) fn decode_cache(&self) -> &DecodeCache {
        &self.decoded
    }

    /// Places stored under `geokeys`. Rows whose geokey cannot be decoded are
    /// dropped with a warning.
    pub async fn places_by_geokeys(&self, geokeys: &[String]) -> Result<Vec<Arc<PlaceRecord>>> {
        let mut sorted = geokeys.to_vec();
        sorted.sort();
        sorted.dedup();
        query_with_cache(&sorted, &self.places, |misses| async move {
            let rows = query_by_batch(misses, self.batch_size, |chunk| {
                self.service.places_by_geokey(chunk)
            })
            .await?;
            Ok(rows
                .into_iter()
                .filter_map(|row| self.locate_place(row))
                .collect())
        })
        .await
    }

    pub async fn events_by_ids(&self, event_ids: &[String]) -> Result<Vec<Arc<EventRecord>>> {
        query_with_cache(event_ids, &self.events, |misses| async move {
            let rows = query_by_batch(misses, self.batch_size, |chunk| {
                self.service.events_by_id(chunk)
            })
            .await?;
            Ok(rows
                .into_iter()
                .filter_map(|row| self.locate_event(row))
                .collect())
        })
        .await
    }

    pub async fn events_by_month_regions(
        &self,
        keys: &[String],
    ) -> Result<Vec<Arc<MonthRegionEvents>>> {
        query_with_cache(keys, &self.month_regions, |misses| async move {
            let rows = query_by_batch(misses, self.batch_size, |chunk| {
                self.service.events_by_month_region(chunk)
            })
            .await?;
            Ok(rows
                .into_iter()
                .map(|row| MonthRegionEvents {
                    events: self.locate_events(row.events),
                    month_region: row.month_region,
                })
                .collect())
        })
        .await
    }

    /// Events linked to one page; empty when the page has none.
    pub async fn page_events(&self, page_title: &str) -> Result<Vec<EventRecord>> {
        let keys = [page_title.to_string()];
        let rows = query_with_cache(&keys, &self.pages, |misses| async move {
            let rows = self.service.events_by_page(misses).await?;
            Ok(rows
                .into_iter()
                .map(|row| PageEvents {
                    events: self.locate_events(row.events),
                    page_title: row.page_title,
                })
                .collect())
        })
        .await?;
        Ok(rows
            .into_iter()
            .find(|row| row.page_title == page_title)
            .map(|row| row.events.clone())
            .unwrap_or_default())
    }

    fn locate_place(&self, mut place: PlaceRecord) -> Option<PlaceRecord> {
        match self.decoded.decode(place.location_key()) {
            Ok(point) => {
                place.lat = point.y();
                place.lon = point.x();
                Some(place)
            }
            Err(e) => {
                log::warn!("Dropping place {}: {}", place.page_title, e);
                None
            }
        }
    }

    fn locate_event(&self, mut event: EventRecord) -> Option<EventRecord> {
        match self.decoded.decode(&event.geokey) {
            Ok(point) => {
                event.lat = point.y();
                event.lon = point.x();
                Some(event)
            }
            Err(e) => {
                log::warn!("Dropping event {}: {}", event.event_id, e);
                None
            }
        }
    }

    fn locate_events(&self, events: Vec<EventRecord>) -> Vec<EventRecord> {
        events
            .into_iter()
            .filter_map(|event| self.locate_event(event))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoscope_types::EventDate;

    fn client(service: Arc<MemoryLookupService>) -> QueryClient {
        QueryClient::new(service, &Config::default().with_lookup_batch_size(2))
    }

    fn event(id: &str, geokey: &str) -> EventRecord {
        let d = EventDate::new(1815, 6, 18);
        EventRecord::new(id, geokey, d, d)
    }

    #[tokio::test]
    async fn test_places_are_located_and_cached() {
        let service = Arc::new(MemoryLookupService::new());
        service.add_place(PlaceRecord::new("s0", "Alpha", 10));
        service.add_place(PlaceRecord::new("s1", "Beta", 20));
        service.add_place(PlaceRecord::new("s2", "Gamma", 30));
        let client = client(Arc::clone(&service));

        let keys: Vec<String> = ["s2", "s0", "s1", "s3"].iter().map(|s| s.to_string()).collect();
        let places = client.places_by_geokeys(&keys).await.unwrap();
        assert_eq!(places.len(), 3);
        let alpha = places.iter().find(|p| p.geokey == "s0").unwrap();
        assert_eq!((alpha.lat, alpha.lon), (11.25, 11.25));
        // Four keys in batches of two.
        assert_eq!(
            service.calls(),
            vec![("places_by_geokey", 2), ("places_by_geokey", 2)]
        );

        client.places_by_geokeys(&keys).await.unwrap();
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_rows_dropped() {
        let service = Arc::new(MemoryLookupService::new());
        service.add_event(event("good", "s0"));
        service.add_event(event("bad", "bc"));
        let client = client(service);
        let ids = vec!["good".to_string(), "bad".to_string()];
        let events = client.events_by_ids(&ids).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "good");
    }

    #[tokio::test]
    async fn test_month_regions_and_pages() {
        let service = Arc::new(MemoryLookupService::new());
        let mut waterloo = event("waterloo", "u1");
        waterloo.page_title = Some("Battle_of_Waterloo".to_string());
        service.add_month_region_event("1815-6-u", waterloo);
        let client = client(service);

        let rows = client
            .events_by_month_regions(&["1815-6-u".to_string(), "1815--u".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].events[0].lat > 45.0);

        assert_eq!(client.page_events("Battle_of_Waterloo").await.unwrap().len(), 1);
        assert!(client.page_events("Nowhere").await.unwrap().is_empty());
    }
}
