//! Picking the places to draw for a viewport from trie representatives.

use crate::compute::trie::TrieEntry;
use geoscope_types::{Bounds, PlaceRecord};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Filter, order and cap the representatives found for the geokeys of one
/// zoom level.
///
/// `candidates` holds the best entry per enumerated geokey (`None` where a
/// geokey has no places). Records outside `bounds` (inclusive) are dropped
/// and the rest sorted by score, best first. When more than `max_results`
/// remain, only the best record per prefix of length `zoom - 1` is kept
/// before truncating.
pub fn select_entries(
    candidates: Vec<Option<Arc<PlaceRecord>>>,
    bounds: &Bounds,
    zoom: usize,
    max_results: usize,
) -> Vec<Arc<PlaceRecord>> {
    let mut seen = FxHashSet::default();
    let mut entries: Vec<Arc<PlaceRecord>> = candidates
        .into_iter()
        .flatten()
        .filter(|place| bounds.contains(place.lat, place.lon))
        .filter(|place| seen.insert(place.id()))
        .collect();

    entries.sort_by(|a, b| {
        b.score()
            .cmp(&a.score())
            .then_with(|| a.geokey.cmp(&b.geokey))
    });

    if entries.len() > max_results {
        if zoom > 1 {
            let mut prefixes = FxHashSet::default();
            entries.retain(|place| {
                let prefix: String = place.geokey.chars().take(zoom - 1).collect();
                prefixes.insert(prefix)
            });
        }
        entries.truncate(max_results);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(geokey: &str, page_len: i64, lat: f64, lon: f64) -> Option<Arc<PlaceRecord>> {
        let mut p = PlaceRecord::new(geokey, format!("P{}", geokey), page_len).with_name("x");
        p.lat = lat;
        p.lon = lon;
        Some(Arc::new(p))
    }

    #[test]
    fn test_filters_and_sorts() {
        let bounds = Bounds::new(0.0, 10.0, 0.0, 10.0);
        let picked = select_entries(
            vec![
                place("s00", 5, 1.0, 1.0),
                None,
                place("s01", 50, 10.0, 10.0),
                place("s02", 99, 11.0, 1.0),
            ],
            &bounds,
            3,
            200,
        );
        let keys: Vec<_> = picked.iter().map(|p| p.geokey.as_str()).collect();
        assert_eq!(keys, vec!["s01", "s00"]);
    }

    #[test]
    fn test_thins_to_best_per_parent() {
        let bounds = Bounds::world();
        let candidates = vec![
            place("s000", 1, 1.0, 1.0),
            place("s001", 9, 1.0, 1.0),
            place("s010", 3, 1.0, 1.0),
            place("s011", 2, 1.0, 1.0),
        ];
        let picked = select_entries(candidates.clone(), &bounds, 4, 3);
        let keys: Vec<_> = picked.iter().map(|p| p.geokey.as_str()).collect();
        assert_eq!(keys, vec!["s001", "s010"]);

        // Under the cap nothing is thinned.
        assert_eq!(select_entries(candidates, &bounds, 4, 4).len(), 4);
    }
}
