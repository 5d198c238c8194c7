#![forbid(unsafe_code)]

//! Change descriptions for observable values, lists, and sets.
//!
//! # List diffs
//!
//! A [`ListDiff`] is an ordered sequence of add/remove entries. Entries are
//! applied one after another, so each entry's index refers to the list as
//! left by the entries before it.
//!
//! [`ListDiff::accept`] replays a diff through a [`ListDiffVisitor`] and
//! recognises two higher-level operations:
//!
//! - a remove immediately followed by an add of an equal element is a **move**;
//! - a remove immediately followed by an add at the same index is a **replace**.
//!
//! Visitors that do not care about moves or replaces inherit default handlers
//! that decompose them back into remove + add.
//!
//! # Invariants
//!
//! 1. `ListDiff::compute(old, new).apply_to(old) == new`.
//! 2. `SetDiff::compute(old, new)` has disjoint additions and removals.
//! 3. Replaying a diff through `accept` with the default move/replace handlers
//!    is equivalent to `apply_to`.

/// A change of a single value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDiff<T> {
    /// The value before the change.
    pub old_value: T,
    /// The value after the change.
    pub new_value: T,
}

impl<T> ValueDiff<T> {
    /// Create a value diff.
    pub fn new(old_value: T, new_value: T) -> Self {
        Self {
            old_value,
            new_value,
        }
    }
}

// ---------------------------------------------------------------------------
// ListDiff
// ---------------------------------------------------------------------------

/// One step of a [`ListDiff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDiffEntry<T> {
    /// `element` was inserted at `index`.
    Add { index: usize, element: T },
    /// `element` was removed from `index`.
    Remove { index: usize, element: T },
}

impl<T> ListDiffEntry<T> {
    /// Position the entry applies to.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Add { index, .. } | Self::Remove { index, .. } => *index,
        }
    }

    /// The element added or removed.
    #[must_use]
    pub fn element(&self) -> &T {
        match self {
            Self::Add { element, .. } | Self::Remove { element, .. } => element,
        }
    }

    /// Whether this entry is an addition.
    #[must_use]
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Add { .. })
    }
}

/// Receives the operations of a [`ListDiff`] in order.
pub trait ListDiffVisitor<T> {
    /// `element` is inserted at `index`.
    fn handle_add(&mut self, index: usize, element: &T);

    /// `element` is removed from `index`.
    fn handle_remove(&mut self, index: usize, element: &T);

    /// `element` moves from `old_index` to `new_index`.
    fn handle_move(&mut self, old_index: usize, new_index: usize, element: &T) {
        self.handle_remove(old_index, element);
        self.handle_add(new_index, element);
    }

    /// The element at `index` changes from `old_element` to `new_element`.
    fn handle_replace(&mut self, index: usize, old_element: &T, new_element: &T) {
        self.handle_remove(index, old_element);
        self.handle_add(index, new_element);
    }
}

/// An ordered description of how one list became another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDiff<T> {
    entries: Vec<ListDiffEntry<T>>,
}

impl<T> Default for ListDiff<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> ListDiff<T> {
    /// Create a diff from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<ListDiffEntry<T>>) -> Self {
        Self { entries }
    }

    /// The diff from an empty list to `items`.
    pub fn inserting(items: impl IntoIterator<Item = T>) -> Self {
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, element)| ListDiffEntry::Add { index, element })
            .collect();
        Self { entries }
    }

    /// The entries in application order.
    #[must_use]
    pub fn entries(&self) -> &[ListDiffEntry<T>] {
        &self.entries
    }

    /// Whether the diff describes no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Apply this diff to `list` in place.
    ///
    /// # Panics
    ///
    /// Panics if an entry's index is out of bounds for `list`, i.e. the diff
    /// was not computed against this list.
    pub fn apply_to(&self, list: &mut Vec<T>)
    where
        T: Clone,
    {
        for entry in &self.entries {
            match entry {
                ListDiffEntry::Add { index, element } => list.insert(*index, element.clone()),
                ListDiffEntry::Remove { index, .. } => {
                    list.remove(*index);
                }
            }
        }
    }

    /// Replay this diff through `visitor`, coalescing moves and replaces.
    pub fn accept<V>(&self, visitor: &mut V)
    where
        T: PartialEq,
        V: ListDiffVisitor<T> + ?Sized,
    {
        let mut i = 0;
        while i < self.entries.len() {
            if let (
                ListDiffEntry::Remove {
                    index: from,
                    element: removed,
                },
                Some(ListDiffEntry::Add {
                    index: to,
                    element: added,
                }),
            ) = (&self.entries[i], self.entries.get(i + 1))
            {
                if removed == added {
                    visitor.handle_move(*from, *to, added);
                    i += 2;
                    continue;
                }
                if from == to {
                    visitor.handle_replace(*from, removed, added);
                    i += 2;
                    continue;
                }
            }
            match &self.entries[i] {
                ListDiffEntry::Add { index, element } => visitor.handle_add(*index, element),
                ListDiffEntry::Remove { index, element } => visitor.handle_remove(*index, element),
            }
            i += 1;
        }
    }
}

impl<T: Clone + PartialEq> ListDiff<T> {
    /// Compute a minimal add/remove diff turning `old` into `new`.
    ///
    /// Common prefixes and suffixes are skipped; the remaining window is
    /// diffed with a longest-common-subsequence table. On ties a removal is
    /// emitted before an addition, so a changed element shows up as a
    /// remove+add pair at the same index.
    #[must_use]
    pub fn compute(old: &[T], new: &[T]) -> Self {
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let old_rest = &old[prefix..];
        let new_rest = &new[prefix..];
        let suffix = old_rest
            .iter()
            .rev()
            .zip(new_rest.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        let o = &old_rest[..old_rest.len() - suffix];
        let n = &new_rest[..new_rest.len() - suffix];

        let (rows, cols) = (o.len(), n.len());
        let width = cols + 1;
        let mut lcs = vec![0usize; (rows + 1) * width];
        for i in (0..rows).rev() {
            for j in (0..cols).rev() {
                lcs[i * width + j] = if o[i] == n[j] {
                    lcs[(i + 1) * width + j + 1] + 1
                } else {
                    lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
                };
            }
        }

        let mut entries = Vec::new();
        let (mut i, mut j, mut pos) = (0, 0, prefix);
        while i < rows || j < cols {
            if i < rows
                && j < cols
                && o[i] == n[j]
                && lcs[i * width + j] == lcs[(i + 1) * width + j + 1] + 1
            {
                i += 1;
                j += 1;
                pos += 1;
            } else if j < cols && (i == rows || lcs[i * width + j + 1] > lcs[(i + 1) * width + j]) {
                entries.push(ListDiffEntry::Add {
                    index: pos,
                    element: n[j].clone(),
                });
                j += 1;
                pos += 1;
            } else {
                entries.push(ListDiffEntry::Remove {
                    index: pos,
                    element: o[i].clone(),
                });
                i += 1;
            }
        }
        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// SetDiff
// ---------------------------------------------------------------------------

/// The elements added to and removed from a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDiff<T> {
    additions: Vec<T>,
    removals: Vec<T>,
}

impl<T> Default for SetDiff<T> {
    fn default() -> Self {
        Self {
            additions: Vec::new(),
            removals: Vec::new(),
        }
    }
}

impl<T> SetDiff<T> {
    /// Create a set diff from explicit additions and removals.
    #[must_use]
    pub fn new(additions: Vec<T>, removals: Vec<T>) -> Self {
        Self {
            additions,
            removals,
        }
    }

    /// The diff from an empty set to `items`.
    pub fn inserting(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            additions: items.into_iter().collect(),
            removals: Vec::new(),
        }
    }

    /// Elements added.
    #[must_use]
    pub fn additions(&self) -> &[T] {
        &self.additions
    }

    /// Elements removed.
    #[must_use]
    pub fn removals(&self) -> &[T] {
        &self.removals
    }

    /// Whether the diff describes no change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

impl<T: Clone + PartialEq> SetDiff<T> {
    /// Compute the difference between two sets given as element slices.
    #[must_use]
    pub fn compute(old: &[T], new: &[T]) -> Self {
        let additions = new.iter().filter(|e| !old.contains(e)).cloned().collect();
        let removals = old.iter().filter(|e| !new.contains(e)).cloned().collect();
        Self {
            additions,
            removals,
        }
    }

    /// Apply this diff to `set` in place, preserving insertion order.
    pub fn apply_to(&self, set: &mut Vec<T>) {
        set.retain(|e| !self.removals.contains(e));
        for element in &self.additions {
            if !set.contains(element) {
                set.push(element.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ops: Vec<String>,
    }

    impl ListDiffVisitor<char> for Recorder {
        fn handle_add(&mut self, index: usize, element: &char) {
            self.ops.push(format!("add {index} {element}"));
        }

        fn handle_remove(&mut self, index: usize, element: &char) {
            self.ops.push(format!("remove {index} {element}"));
        }

        fn handle_move(&mut self, old_index: usize, new_index: usize, element: &char) {
            self.ops.push(format!("move {old_index}->{new_index} {element}"));
        }

        fn handle_replace(&mut self, index: usize, old_element: &char, new_element: &char) {
            self.ops
                .push(format!("replace {index} {old_element}->{new_element}"));
        }
    }

    #[derive(Default)]
    struct AddRemoveOnly {
        ops: Vec<String>,
    }

    impl ListDiffVisitor<char> for AddRemoveOnly {
        fn handle_add(&mut self, index: usize, element: &char) {
            self.ops.push(format!("add {index} {element}"));
        }

        fn handle_remove(&mut self, index: usize, element: &char) {
            self.ops.push(format!("remove {index} {element}"));
        }
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn compute_identical_is_empty() {
        let diff = ListDiff::compute(&chars("abc"), &chars("abc"));
        assert!(diff.is_empty());
    }

    #[test]
    fn compute_insert_in_middle() {
        let diff = ListDiff::compute(&chars("ac"), &chars("abc"));
        assert_eq!(
            diff.entries(),
            &[ListDiffEntry::Add {
                index: 1,
                element: 'b'
            }]
        );
    }

    #[test]
    fn compute_changed_element_is_replace() {
        let diff = ListDiff::compute(&chars("axc"), &chars("ayc"));
        let mut rec = Recorder::default();
        diff.accept(&mut rec);
        assert_eq!(rec.ops, vec!["replace 1 x->y"]);
    }

    #[test]
    fn compute_rotation_is_move() {
        let diff = ListDiff::compute(&chars("abc"), &chars("bca"));
        let mut rec = Recorder::default();
        diff.accept(&mut rec);
        assert_eq!(rec.ops, vec!["move 0->2 a"]);
    }

    #[test]
    fn default_visitor_decomposes_move_and_replace() {
        let diff = ListDiff::new(vec![
            ListDiffEntry::Remove {
                index: 0,
                element: 'a',
            },
            ListDiffEntry::Add {
                index: 2,
                element: 'a',
            },
            ListDiffEntry::Remove {
                index: 1,
                element: 'x',
            },
            ListDiffEntry::Add {
                index: 1,
                element: 'y',
            },
        ]);
        let mut rec = AddRemoveOnly::default();
        diff.accept(&mut rec);
        assert_eq!(
            rec.ops,
            vec!["remove 0 a", "add 2 a", "remove 1 x", "add 1 y"]
        );
    }

    #[test]
    fn inserting_adds_in_order() {
        let diff = ListDiff::inserting(chars("xyz"));
        let mut list = Vec::new();
        diff.apply_to(&mut list);
        assert_eq!(list, chars("xyz"));
    }

    #[test]
    fn set_diff_compute_and_apply() {
        let old = vec![1, 2, 3];
        let new = vec![2, 3, 4, 5];
        let diff = SetDiff::compute(&old, &new);
        assert_eq!(diff.additions(), &[4, 5]);
        assert_eq!(diff.removals(), &[1]);

        let mut set = old.clone();
        diff.apply_to(&mut set);
        assert_eq!(set, new);
    }
}
