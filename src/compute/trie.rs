//! Prefix trie over geokeys with per-node best-entry aggregation.
//!
//! Each node is one of three shapes: a terminal record with no children
//! (`Leaf`), an interior node (`Branch`), or a terminal record that also has
//! children (`Both`). Interior nodes cache the best-scoring record anywhere
//! below them, so a representative for any geokey prefix is one walk away.
//!
//! The cache is only refreshed by [`PrefixTrie::compute_best_entries`]; the
//! ingestion pipeline calls it once per batch after all inserts.

use crate::config::MAX_GEOKEY_LENGTH;
use crate::error::{GeoscopeError, Result};
use geoscope_types::PlaceRecord;
use smallvec::SmallVec;
use std::sync::Arc;

/// Bonus added to the score of places without a display name, so raw
/// geolocated pages outrank curated-but-unnamed duplicates when picking a
/// representative.
pub const UNNAMED_PLACE_BONUS: i64 = 1_000_000;

/// Something that can be stored in a [`PrefixTrie`].
pub trait TrieEntry {
    /// Key the entry is stored under.
    fn trie_key(&self) -> &str;
    /// Larger is better.
    fn score(&self) -> i64;
}

impl TrieEntry for PlaceRecord {
    fn trie_key(&self) -> &str {
        &self.geokey
    }

    fn score(&self) -> i64 {
        let bonus = if self.name.is_none() {
            UNNAMED_PLACE_BONUS
        } else {
            0
        };
        self.page_len.saturating_add(bonus)
    }
}

/// Best entry under a node, with its distance in edges from that node.
#[derive(Debug)]
pub struct BestEntry<T> {
    pub entry: Arc<T>,
    pub score: i64,
    pub depth: usize,
}

impl<T> Clone for BestEntry<T> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            score: self.score,
            depth: self.depth,
        }
    }
}

#[derive(Debug)]
struct Branch<T> {
    // Sorted by edge byte.
    children: SmallVec<[(u8, Box<Node<T>>); 4]>,
    best: Option<BestEntry<T>>,
}

impl<T> Default for Branch<T> {
    fn default() -> Self {
        Self {
            children: SmallVec::new(),
            best: None,
        }
    }
}

impl<T> Branch<T> {
    fn child(&self, edge: u8) -> Option<&Node<T>> {
        self.children
            .binary_search_by_key(&edge, |(e, _)| *e)
            .ok()
            .map(|idx| &*self.children[idx].1)
    }

    fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.children.iter().map(|(_, child)| &**child)
    }

    fn child_mut_or_insert(&mut self, edge: u8) -> &mut Node<T> {
        let idx = match self.children.binary_search_by_key(&edge, |(e, _)| *e) {
            Ok(idx) => idx,
            Err(idx) => {
                self.children
                    .insert(idx, (edge, Box::new(Node::Branch(Branch::default()))));
                idx
            }
        };
        &mut *self.children[idx].1
    }

    fn child_mut(&mut self, edge: u8) -> Option<&mut Node<T>> {
        match self.children.binary_search_by_key(&edge, |(e, _)| *e) {
            Ok(idx) => Some(&mut *self.children[idx].1),
            Err(_) => None,
        }
    }
}

#[derive(Debug)]
enum Node<T> {
    Leaf(Arc<T>),
    Branch(Branch<T>),
    Both(Arc<T>, Branch<T>),
}

impl<T> Node<T> {
    fn entry(&self) -> Option<&Arc<T>> {
        match self {
            Node::Leaf(entry) | Node::Both(entry, _) => Some(entry),
            Node::Branch(_) => None,
        }
    }

    fn branch(&self) -> Option<&Branch<T>> {
        match self {
            Node::Branch(branch) | Node::Both(_, branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }

    fn branch_opt_mut(&mut self) -> Option<&mut Branch<T>> {
        match self {
            Node::Branch(branch) | Node::Both(_, branch) => Some(branch),
            Node::Leaf(_) => None,
        }
    }

    /// Interior view of the node, turning a leaf into `Both` when needed.
    fn branch_mut(&mut self) -> &mut Branch<T> {
        match self {
            Node::Branch(branch) | Node::Both(_, branch) => branch,
            Node::Leaf(entry) => {
                *self = Node::Both(Arc::clone(entry), Branch::default());
                self.branch_mut()
            }
        }
    }

    fn set_entry(&mut self, entry: Arc<T>) {
        let previous = std::mem::replace(self, Node::Branch(Branch::default()));
        *self = match previous {
            Node::Leaf(_) => Node::Leaf(entry),
            Node::Branch(branch) if branch.children.is_empty() => Node::Leaf(entry),
            Node::Branch(branch) | Node::Both(_, branch) => Node::Both(entry, branch),
        };
    }
}

/// Prefix trie keyed by geokey characters.
///
/// Inserting a second entry under the same key replaces the first.
#[derive(Debug)]
pub struct PrefixTrie<T> {
    root: Branch<T>,
    len: usize,
}

impl<T> Default for PrefixTrie<T> {
    fn default() -> Self {
        Self {
            root: Branch::default(),
            len: 0,
        }
    }
}

impl<T: TrieEntry> PrefixTrie<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store `entry` under its key, creating nodes as needed.
    ///
    /// Best entries are not updated; call
    /// [`compute_best_entries`](Self::compute_best_entries) afterwards.
    pub fn insert(&mut self, entry: Arc<T>) -> Result<()> {
        let key = entry.trie_key();
        if key.is_empty() || key.len() > MAX_GEOKEY_LENGTH {
            return Err(GeoscopeError::InvalidInput(format!(
                "Trie key length out of range [1, {}]: {:?}",
                MAX_GEOKEY_LENGTH, key
            )));
        }
        let bytes = key.as_bytes().to_vec();
        let Some((last, path)) = bytes.split_last() else {
            return Ok(());
        };

        let mut branch = &mut self.root;
        for &edge in path {
            branch = branch.child_mut_or_insert(edge).branch_mut();
        }
        let node = branch.child_mut_or_insert(*last);
        if node.entry().is_none() {
            self.len += 1;
        }
        node.set_entry(entry);
        Ok(())
    }

    /// Recompute the cached best entries for every node at or below `prefix`.
    ///
    /// Ancestors of `prefix` are not touched. Returns `false` when no node
    /// exists for `prefix`.
    pub fn compute_best_entries(&mut self, prefix: &str) -> bool {
        let mut branch = &mut self.root;
        for &edge in prefix.as_bytes() {
            match branch.child_mut(edge).and_then(Node::branch_opt_mut) {
                Some(next) => branch = next,
                None => return false,
            }
        }
        recompute(branch);
        true
    }

    /// Best entry for `prefix` with its score and depth.
    ///
    /// If a record is stored exactly at `prefix` it is returned with depth 0;
    /// otherwise the cached best of the subtree is returned.
    pub fn best(&self, prefix: &str) -> Option<BestEntry<T>> {
        if prefix.is_empty() {
            return self.root.best.clone();
        }
        let node = self.node_at(prefix)?;
        match node.entry() {
            Some(entry) => Some(BestEntry {
                entry: Arc::clone(entry),
                score: entry.score(),
                depth: 0,
            }),
            None => node.branch()?.best.clone(),
        }
    }

    /// Shorthand for [`best`](Self::best) returning just the entry.
    pub fn best_entry(&self, prefix: &str) -> Option<Arc<T>> {
        self.best(prefix).map(|best| best.entry)
    }

    /// Every entry whose key starts with `prefix`, in key order.
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<Arc<T>> {
        let mut out = Vec::new();
        if prefix.is_empty() {
            for child in self.root.nodes() {
                collect(child, &mut out);
            }
        } else if let Some(node) = self.node_at(prefix) {
            collect(node, &mut out);
        }
        out
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn node_at(&self, key: &str) -> Option<&Node<T>> {
        let (last, path) = key.as_bytes().split_last()?;
        let mut branch = &self.root;
        for &edge in path {
            branch = branch.child(edge)?.branch()?;
        }
        branch.child(*last)
    }
}

fn collect<T>(node: &Node<T>, out: &mut Vec<Arc<T>>) {
    if let Some(entry) = node.entry() {
        out.push(Arc::clone(entry));
    }
    if let Some(branch) = node.branch() {
        for child in branch.nodes() {
            collect(child, out);
        }
    }
}

/// Candidate best entry for one child, measured from the child's parent.
fn child_best<T: TrieEntry>(child: &mut Node<T>) -> Option<BestEntry<T>> {
    match child {
        Node::Leaf(entry) => Some(BestEntry {
            entry: Arc::clone(entry),
            score: entry.score(),
            depth: 1,
        }),
        Node::Branch(branch) => {
            recompute(branch);
            branch.best.as_ref().map(|best| BestEntry {
                depth: best.depth + 1,
                ..best.clone()
            })
        }
        Node::Both(entry, branch) => {
            recompute(branch);
            let own = BestEntry {
                entry: Arc::clone(entry),
                score: entry.score(),
                depth: 1,
            };
            match branch.best.as_ref() {
                // The node's own record wins ties against its subtree.
                Some(best) if best.score > own.score => Some(BestEntry {
                    depth: best.depth + 1,
                    ..best.clone()
                }),
                _ => Some(own),
            }
        }
    }
}

fn recompute<T: TrieEntry>(branch: &mut Branch<T>) {
    let mut best: Option<BestEntry<T>> = None;
    for (_, child) in branch.children.iter_mut() {
        let Some(candidate) = child_best(&mut **child) else {
            continue;
        };
        // Strictly greater wins, so ties keep the lexicographically first child.
        if best.as_ref().is_none_or(|b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    branch.best = best;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        key: String,
        score: i64,
    }

    impl TrieEntry for Item {
        fn trie_key(&self) -> &str {
            &self.key
        }

        fn score(&self) -> i64 {
            self.score
        }
    }

    fn item(key: &str, score: i64) -> Arc<Item> {
        Arc::new(Item {
            key: key.to_string(),
            score,
        })
    }

    fn trie_of(items: &[(&str, i64)]) -> PrefixTrie<Item> {
        let mut trie = PrefixTrie::new();
        for (key, score) in items {
            trie.insert(item(key, *score)).unwrap();
        }
        trie.compute_best_entries("");
        trie
    }

    #[test]
    fn test_best_of_siblings() {
        let trie = trie_of(&[("s00", 3), ("s01", 7), ("s02", 1), ("s03", 9)]);
        let best = trie.best("s0").unwrap();
        assert_eq!(best.entry.key, "s03");
        assert_eq!(best.score, 9);
        assert_eq!(best.depth, 1);

        let best = trie.best("s").unwrap();
        assert_eq!(best.entry.key, "s03");
        assert_eq!(best.depth, 2);
    }

    #[test]
    fn test_ties_keep_first_child() {
        let trie = trie_of(&[("s2", 5), ("s1", 5), ("s3", 5)]);
        assert_eq!(trie.best_entry("s").unwrap().key, "s1");
    }

    #[test]
    fn test_terminal_with_children() {
        // "s0" holds a record and also has a deeper child.
        let trie = trie_of(&[("s0", 4), ("s01", 10), ("s1", 6)]);
        assert_eq!(trie.best_entry("s").unwrap().key, "s01");
        assert_eq!(trie.best("s").unwrap().depth, 2);
        // Exact match returns the record stored there.
        assert_eq!(trie.best_entry("s0").unwrap().key, "s0");
        assert_eq!(trie.best("s0").unwrap().depth, 0);

        let trie = trie_of(&[("s0", 10), ("s01", 10)]);
        assert_eq!(trie.best_entry("s").unwrap().key, "s0");
    }

    #[test]
    fn test_missing_prefix() {
        let trie = trie_of(&[("s01", 1)]);
        assert!(trie.best_entry("u").is_none());
        assert!(trie.best_entry("s012").is_none());
        assert!(trie.best_entry("s013").is_none());
        assert!(trie.best_entry("s1").is_none());
    }

    #[test]
    fn test_empty_trie() {
        let mut trie: PrefixTrie<Item> = PrefixTrie::new();
        assert!(trie.compute_best_entries(""));
        assert!(!trie.compute_best_entries("s"));
        assert!(trie.best_entry("").is_none());
        assert!(trie.is_empty());
    }

    #[test]
    fn test_best_is_stale_until_recomputed() {
        let mut trie = trie_of(&[("s0", 1)]);
        trie.insert(item("s1", 100)).unwrap();
        assert_eq!(trie.best_entry("s").unwrap().key, "s0");
        trie.compute_best_entries("s");
        assert_eq!(trie.best_entry("s").unwrap().key, "s1");
    }

    #[test]
    fn test_replace_same_key() {
        let mut trie = trie_of(&[("s0", 1)]);
        trie.insert(item("s0", 50)).unwrap();
        trie.compute_best_entries("");
        assert_eq!(trie.len(), 1);
        assert_eq!(trie.best("s").unwrap().score, 50);
    }

    #[test]
    fn test_entries_with_prefix() {
        let trie = trie_of(&[("s03", 1), ("s0", 2), ("s01", 3), ("u1", 4)]);
        let keys: Vec<_> = trie
            .entries_with_prefix("s")
            .iter()
            .map(|e| e.key.clone())
            .collect();
        assert_eq!(keys, vec!["s0", "s01", "s03"]);
        assert_eq!(trie.entries_with_prefix("").len(), 4);
        assert!(trie.entries_with_prefix("s012").is_empty());
    }

    #[test]
    fn test_rejects_bad_keys() {
        let mut trie = PrefixTrie::new();
        assert!(trie.insert(item("", 1)).is_err());
        assert!(trie.insert(item(&"s".repeat(MAX_GEOKEY_LENGTH + 1), 1)).is_err());
    }

    #[test]
    fn test_deep_keys_with_wide_fan_out() {
        // Every level holds more children than the inline capacity.
        let deep = format!("s{}", "0123".repeat(5));
        let mut items = Vec::new();
        for len in 2..=deep.len() {
            for digit in ['0', '1', '2', '3'] {
                let key = format!("{}{}", &deep[..len - 1], digit);
                items.push((key, len as i64));
            }
        }
        items.push(("u0".to_string(), 1));
        let refs: Vec<_> = items.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let trie = trie_of(&refs);

        assert_eq!(trie.len(), items.len());
        let best = trie.best("s").unwrap();
        assert_eq!(best.score, deep.len() as i64);
        assert_eq!(best.depth, deep.len() - 1);
        assert_eq!(best.entry.key.len(), deep.len());
        assert_eq!(trie.entries_with_prefix(&deep[..3]).len(), 1 + 4 * (deep.len() - 3));
    }

    #[test]
    fn test_child_under_existing_leaf() {
        let mut trie = trie_of(&[("s0", 8)]);
        trie.insert(item("s012", 3)).unwrap();
        trie.insert(item("s01", 20)).unwrap();
        trie.compute_best_entries("");

        assert_eq!(trie.len(), 3);
        assert_eq!(trie.best_entry("s0").unwrap().key, "s0");
        assert_eq!(trie.best_entry("s").unwrap().key, "s01");
        assert_eq!(trie.best("s01").unwrap().depth, 0);
        let keys: Vec<_> = trie
            .entries_with_prefix("s0")
            .iter()
            .map(|e| e.key.clone())
            .collect();
        assert_eq!(keys, vec!["s0", "s01", "s012"]);
    }

    #[test]
    fn test_place_score() {
        let named = PlaceRecord::new("s0", "Named", 500).with_name("Named");
        let unnamed = PlaceRecord::new("s1", "Unnamed", 500);
        assert_eq!(named.score(), 500);
        assert_eq!(unnamed.score(), 500 + UNNAMED_PLACE_BONUS);
    }
}
