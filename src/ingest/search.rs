//! Text search over ingested places.

use crate::compute::trie::TrieEntry;
use geoscope_types::PlaceRecord;
use std::sync::Arc;

/// Pluggable text search. Rebuilt once per ingestion batch from the full
/// list of searchable places.
pub trait TextSearch: Send + Sync {
    fn rebuild(&mut self, places: &[Arc<PlaceRecord>]);

    fn search(&self, query: &str, limit: usize) -> Vec<Arc<PlaceRecord>>;
}

/// Lower-case, treat underscores as spaces and collapse runs of whitespace.
pub fn fold_key(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shortest query [`SubstringSearch`] answers.
pub const MIN_QUERY_LEN: usize = 2;

/// Folded substring search over page title, name and category.
///
/// Hits are ranked by how early the query appears in the best matching
/// field, then by place score.
#[derive(Default)]
pub struct SubstringSearch {
    entries: Vec<(Vec<String>, Arc<PlaceRecord>)>,
}

impl SubstringSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TextSearch for SubstringSearch {
    fn rebuild(&mut self, places: &[Arc<PlaceRecord>]) {
        self.entries = places
            .iter()
            .map(|place| {
                let mut fields = vec![fold_key(&place.page_title)];
                fields.extend(place.name.as_deref().map(fold_key));
                fields.extend(place.category.as_deref().map(fold_key));
                (fields, Arc::clone(place))
            })
            .collect();
    }

    fn search(&self, query: &str, limit: usize) -> Vec<Arc<PlaceRecord>> {
        let query = fold_key(query);
        if query.chars().count() < MIN_QUERY_LEN || limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<(usize, i64, &Arc<PlaceRecord>)> = self
            .entries
            .iter()
            .filter_map(|(fields, place)| {
                fields
                    .iter()
                    .filter_map(|field| field.find(&query))
                    .min()
                    .map(|pos| (pos, place.score(), place))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.page_title.cmp(&b.2.page_title))
        });

        // Different tiles may carry the same page; report it once.
        let mut seen = rustc_hash::FxHashSet::default();
        hits.into_iter()
            .filter(|(_, _, place)| seen.insert(place.id()))
            .take(limit)
            .map(|(_, _, place)| Arc::clone(place))
            .collect()
    }
}
