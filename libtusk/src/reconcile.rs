//! Incremental list reconciliation
//!
//! Turns two versions of an ordered list into an edit script a list view can
//! apply as one batch, so rows keep their identity and the scroll position
//! survives a refresh.
//!
//! Items are matched by identity key along the longest common subsequence of
//! keys. Unmatched old items are removed, unmatched new items inserted, and
//! matched items that fail display-equality are updated in place. A moved item
//! shows up as a remove plus an insert.
//!
//! Script order follows list-view batch semantics:
//!
//! 1. `Remove` in descending index of the old list
//! 2. `Insert` in ascending index of the new list
//! 3. `Update` at indices of the new list
//!
//! Applied in that order, one edit at a time, the script turns `old` into `new`.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::types::{Entity, Status};

#[derive(Debug, Clone, PartialEq)]
pub enum Edit<T> {
    Insert { at: usize, item: T },
    Remove { at: usize },
    Update { at: usize, item: T },
}

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type EqFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

pub struct ListReconciler<T> {
    key: KeyFn<T>,
    display_eq: EqFn<T>,
}

impl<T: Entity + 'static> ListReconciler<T> {
    /// Reconciler keyed by [`Entity::id`] and comparing with [`Entity::display_eq`].
    pub fn for_entities() -> Self {
        Self::new(|item: &T| item.id().to_string(), |a: &T, b: &T| a.display_eq(b))
    }
}

impl<T: Clone + 'static> ListReconciler<T> {
    pub fn new(
        key: impl Fn(&T) -> String + Send + Sync + 'static,
        display_eq: impl Fn(&T, &T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: Box::new(key),
            display_eq: Box::new(display_eq),
        }
    }

    pub fn reconcile(&self, old: &[T], new: &[T]) -> Vec<Edit<T>> {
        let old_keys: Vec<String> = old.iter().map(|item| (self.key)(item)).collect();
        let new_keys: Vec<String> = new.iter().map(|item| (self.key)(item)).collect();
        let matched = matched_pairs(&old_keys, &new_keys);

        let mut old_matched = vec![false; old.len()];
        let mut new_matched = vec![false; new.len()];
        for &(i, j) in &matched {
            old_matched[i] = true;
            new_matched[j] = true;
        }

        let mut edits = Vec::new();
        for at in (0..old.len()).rev().filter(|&i| !old_matched[i]) {
            edits.push(Edit::Remove { at });
        }
        for at in (0..new.len()).filter(|&j| !new_matched[j]) {
            edits.push(Edit::Insert {
                at,
                item: new[at].clone(),
            });
        }
        for &(i, j) in &matched {
            if !(self.display_eq)(&old[i], &new[j]) {
                edits.push(Edit::Update {
                    at: j,
                    item: new[j].clone(),
                });
            }
        }
        edits
    }
}

/// Apply a script produced by [`ListReconciler::reconcile`] for `old`.
///
/// # Panics
///
/// Panics when an index is out of range, which means the script was computed
/// against a different list.
pub fn apply<T: Clone>(old: &[T], edits: &[Edit<T>]) -> Vec<T> {
    let mut items = old.to_vec();
    for edit in edits {
        match edit {
            Edit::Remove { at } => {
                items.remove(*at);
            }
            Edit::Insert { at, item } => items.insert(*at, item.clone()),
            Edit::Update { at, item } => items[*at] = item.clone(),
        }
    }
    items
}

/// Index pairs `(old, new)` of items kept in place.
fn matched_pairs(old: &[String], new: &[String]) -> Vec<(usize, usize)> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];
    pairs.extend(
        lcs(a, b)
            .into_iter()
            .map(|(i, j)| (i + prefix, j + prefix)),
    );

    let old_tail = old.len() - suffix;
    let new_tail = new.len() - suffix;
    pairs.extend((0..suffix).map(|k| (old_tail + k, new_tail + k)));
    pairs
}

fn lcs(a: &[String], b: &[String]) -> Vec<(usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let width = b.len() + 1;
    // table[i * width + j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}

/// Digest of the content that determines a row's rendered size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref());
            hasher.update([0x1f]);
        }
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(prefix))
    }

    /// Fingerprint of a status row, including whether its warning is lifted.
    pub fn for_status(status: &Status, revealed: bool) -> Self {
        let shown = status.display_status();
        Self::of([
            shown.content.as_str(),
            shown.spoiler_text.as_str(),
            if revealed { "revealed" } else { "concealed" },
        ])
    }
}

/// Row heights keyed by identity and content fingerprint.
///
/// Entries are only dropped through [`invalidate`](HeightCache::invalidate) or
/// [`clear`](HeightCache::clear).
#[derive(Debug, Default, Clone)]
pub struct HeightCache {
    heights: HashMap<String, HashMap<Fingerprint, f64>>,
}

impl HeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str, fingerprint: Fingerprint) -> Option<f64> {
        self.heights.get(id)?.get(&fingerprint).copied()
    }

    pub fn insert(&mut self, id: &str, fingerprint: Fingerprint, height: f64) {
        self.heights
            .entry(id.to_string())
            .or_default()
            .insert(fingerprint, height);
    }

    /// Cached height, measuring and storing it on a miss.
    pub fn height_for(&mut self, id: &str, fingerprint: Fingerprint, measure: impl FnOnce() -> f64) -> f64 {
        if let Some(height) = self.get(id, fingerprint) {
            return height;
        }
        let height = measure();
        self.insert(id, fingerprint, height);
        height
    }

    /// Forget every height recorded for `id`. Returns whether anything was cached.
    pub fn invalidate(&mut self, id: &str) -> bool {
        self.heights.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.heights.clear();
    }

    pub fn len(&self) -> usize {
        self.heights.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A rendered list kept in sync through reconciliation.
pub struct BoundList<T> {
    items: Vec<T>,
    reconciler: ListReconciler<T>,
    pub heights: HeightCache,
}

impl<T: Entity + 'static> BoundList<T> {
    pub fn new() -> Self {
        Self::with_reconciler(ListReconciler::for_entities())
    }
}

impl<T: Entity + 'static> Default for BoundList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> BoundList<T> {
    pub fn with_reconciler(reconciler: ListReconciler<T>) -> Self {
        Self {
            items: Vec::new(),
            reconciler,
            heights: HeightCache::new(),
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Swap in a new version of the list and return the edits that get there.
    pub fn update(&mut self, new: Vec<T>) -> Vec<Edit<T>> {
        let edits = self.reconciler.reconcile(&self.items, &new);
        self.items = new;
        edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::status;

    fn statuses(ids: &[&str]) -> Vec<Status> {
        ids.iter().map(|id| status(id)).collect()
    }

    fn ids(items: &[Status]) -> Vec<String> {
        items.iter().map(|s| s.id.clone()).collect()
    }

    fn assert_round_trip(old: &[&str], new: &[&str]) {
        let reconciler = ListReconciler::<Status>::for_entities();
        let (old, new) = (statuses(old), statuses(new));
        let edits = reconciler.reconcile(&old, &new);
        assert_eq!(ids(&apply(&old, &edits)), ids(&new), "edits: {:?}", edits);
    }

    #[test]
    fn test_same_list_yields_no_edits() {
        let reconciler = ListReconciler::<Status>::for_entities();
        for list in [vec![], statuses(&["a"]), statuses(&["a", "b", "c", "d"])] {
            assert!(reconciler.reconcile(&list, &list).is_empty());
        }
    }

    #[test]
    fn test_apply_reaches_new_list() {
        assert_round_trip(&[], &["a", "b"]);
        assert_round_trip(&["a", "b"], &[]);
        assert_round_trip(&["a", "b", "c"], &["x", "a", "b", "c"]);
        assert_round_trip(&["a", "b", "c"], &["a", "b", "c", "d", "e"]);
        assert_round_trip(&["a", "b", "c", "d"], &["d", "c", "b", "a"]);
        assert_round_trip(&["a", "b", "c", "d", "e"], &["a", "x", "c", "y", "e", "z"]);
        assert_round_trip(&["1", "2", "3", "4", "5", "6"], &["3", "1", "6", "2", "7"]);
    }

    #[test]
    fn test_favourite_toggle_is_a_single_update() {
        let reconciler = ListReconciler::<Status>::for_entities();
        let old = statuses(&["s1", "s2", "s3"]);
        let mut new = old.clone();
        new[1].favourited = Some(true);

        let edits = reconciler.reconcile(&old, &new);
        assert_eq!(edits, vec![Edit::Update { at: 1, item: new[1].clone() }]);
    }

    #[test]
    fn test_edited_status_is_an_update() {
        let mut bound = BoundList::new();
        bound.update(statuses(&["s1", "s2"]));

        let mut edited = statuses(&["s1", "s2"]);
        edited[0].content = "<p>fixed a typo</p>".to_string();
        let edits = bound.update(edited.clone());
        assert_eq!(edits, vec![Edit::Update { at: 0, item: edited[0].clone() }]);
    }

    #[test]
    fn test_move_is_remove_plus_insert() {
        let reconciler = ListReconciler::<Status>::for_entities();
        let old = statuses(&["a", "b", "c"]);
        let new = statuses(&["c", "a", "b"]);

        let edits = reconciler.reconcile(&old, &new);
        assert_eq!(
            edits,
            vec![Edit::Remove { at: 2 }, Edit::Insert { at: 0, item: new[0].clone() }]
        );
    }

    #[test]
    fn test_script_order() {
        let reconciler = ListReconciler::<Status>::for_entities();
        let old = statuses(&["a", "b", "c", "d"]);
        let mut new = statuses(&["x", "b", "d", "y"]);
        new[1].reblogged = Some(true);

        let edits = reconciler.reconcile(&old, &new);
        let kinds: Vec<&str> = edits
            .iter()
            .map(|e| match e {
                Edit::Remove { .. } => "remove",
                Edit::Insert { .. } => "insert",
                Edit::Update { .. } => "update",
            })
            .collect();
        assert_eq!(kinds, vec!["remove", "remove", "insert", "insert", "update"]);
        assert_eq!(edits[0], Edit::Remove { at: 2 });
        assert_eq!(edits[1], Edit::Remove { at: 0 });
        assert_eq!(apply(&old, &edits), new);
    }

    #[test]
    fn test_custom_key_and_equality() {
        let reconciler = ListReconciler::new(
            |pair: &(u32, &'static str)| pair.0.to_string(),
            |a: &(u32, &'static str), b: &(u32, &'static str)| a.1 == b.1,
        );
        let old = vec![(1, "one"), (2, "two")];
        let new = vec![(2, "TWO"), (3, "three")];
        let edits = reconciler.reconcile(&old, &new);
        assert_eq!(apply(&old, &edits), new);
        assert!(edits.contains(&Edit::Update { at: 0, item: (2, "TWO") }));
    }

    #[test]
    fn test_height_cache_memoizes_per_fingerprint() {
        let mut cache = HeightCache::new();
        let collapsed = Fingerprint::for_status(&status("1"), false);
        let expanded = Fingerprint::for_status(&status("1"), true);
        assert_ne!(collapsed, expanded);

        let mut measured = 0;
        let h = cache.height_for("1", collapsed, || {
            measured += 1;
            88.0
        });
        let again = cache.height_for("1", collapsed, || {
            measured += 1;
            0.0
        });
        assert_eq!((h, again, measured), (88.0, 88.0, 1));
        assert_eq!(cache.get("1", expanded), None);
    }

    #[test]
    fn test_height_cache_only_invalidated_explicitly() {
        let mut cache = HeightCache::new();
        let fp = Fingerprint::of(["body"]);
        cache.insert("1", fp, 40.0);
        cache.insert("1", Fingerprint::of(["body", "revealed"]), 120.0);
        cache.insert("2", fp, 50.0);

        let mut list = BoundList::<Status>::new();
        list.heights = cache;
        list.update(statuses(&["3"]));
        assert_eq!(list.heights.len(), 3, "reconciling does not evict heights");

        assert!(list.heights.invalidate("1"));
        assert!(!list.heights.invalidate("1"));
        assert_eq!(list.heights.get("2", fp), Some(50.0));
        assert_eq!(list.heights.len(), 1);
    }

    #[test]
    fn test_bound_list_tracks_current_items() {
        let mut list = BoundList::<Status>::new();
        let first = list.update(statuses(&["a", "b"]));
        assert_eq!(first.len(), 2);
        let second = list.update(statuses(&["a", "b"]));
        assert!(second.is_empty());
        assert_eq!(ids(list.items()), vec!["a", "b"]);
    }
}
