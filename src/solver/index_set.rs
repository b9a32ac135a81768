//! Index sets used by the SMO solver
//!
//! `IndexSet` is an intrusive doubly linked list over `0..capacity` with O(1)
//! insert, delete and membership tests. Traversal visits members most recently
//! inserted first, so it depends only on the sequence of updates.

/// Set of training indices with constant-time updates and ordered traversal
#[derive(Debug, Clone)]
pub struct IndexSet {
    member: Vec<bool>,
    next: Vec<Option<usize>>,
    prev: Vec<Option<usize>>,
    first: Option<usize>,
    len: usize,
}

impl IndexSet {
    /// Empty set able to hold indices `0..capacity`
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            member: vec![false; capacity],
            next: vec![None; capacity],
            prev: vec![None; capacity],
            first: None,
            len: 0,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.member.get(index).copied().unwrap_or(false)
    }

    /// Insert `index`; no-op if already present
    pub fn insert(&mut self, index: usize) {
        if self.member[index] {
            return;
        }
        self.member[index] = true;
        self.prev[index] = None;
        self.next[index] = self.first;
        if let Some(head) = self.first {
            self.prev[head] = Some(index);
        }
        self.first = Some(index);
        self.len += 1;
    }

    /// Remove `index`; no-op if absent
    pub fn delete(&mut self, index: usize) {
        if !self.member[index] {
            return;
        }
        match self.prev[index] {
            Some(p) => self.next[p] = self.next[index],
            None => self.first = self.next[index],
        }
        if let Some(n) = self.next[index] {
            self.prev[n] = self.prev[index];
        }
        self.member[index] = false;
        self.next[index] = None;
        self.prev[index] = None;
        self.len -= 1;
    }

    /// Insert when `present`, delete otherwise
    pub fn set(&mut self, index: usize, present: bool) {
        if present {
            self.insert(index);
        } else {
            self.delete(index);
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> IndexSetIter<'_> {
        IndexSetIter {
            set: self,
            current: self.first,
        }
    }
}

pub struct IndexSetIter<'a> {
    set: &'a IndexSet,
    current: Option<usize>,
}

impl Iterator for IndexSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.current?;
        self.current = self.set.next[index];
        Some(index)
    }
}

/// The five disjoint sets of Keerthi et al. classifying each index by
/// pseudo-label and multiplier position
///
/// | set | label | alpha |
/// |-----|-------|-------|
/// | `free` | ±1 | 0 < alpha < C |
/// | `pos_at_zero` | +1 | 0 |
/// | `neg_at_bound` | −1 | C |
/// | `pos_at_bound` | +1 | C |
/// | `neg_at_zero` | −1 | 0 |
#[derive(Debug, Clone)]
pub struct PartitionSets {
    pub free: IndexSet,
    pub pos_at_zero: IndexSet,
    pub neg_at_bound: IndexSet,
    pub pos_at_bound: IndexSet,
    pub neg_at_zero: IndexSet,
}

impl PartitionSets {
    /// All multipliers start at zero: positives in `pos_at_zero`, negatives in `neg_at_zero`
    pub fn initial(labels: &[f64]) -> Self {
        let n = labels.len();
        let mut sets = Self {
            free: IndexSet::with_capacity(n),
            pos_at_zero: IndexSet::with_capacity(n),
            neg_at_bound: IndexSet::with_capacity(n),
            pos_at_bound: IndexSet::with_capacity(n),
            neg_at_zero: IndexSet::with_capacity(n),
        };
        for (i, &y) in labels.iter().enumerate() {
            if y > 0.0 {
                sets.pos_at_zero.insert(i);
            } else {
                sets.neg_at_zero.insert(i);
            }
        }
        sets
    }

    /// Move `index` into the set matching its new multiplier
    ///
    /// `alpha` must already be snapped exactly onto 0 or `bound` when at a bound.
    pub fn classify(&mut self, index: usize, label: f64, alpha: f64, bound: f64) {
        let positive = label > 0.0;
        self.free.set(index, alpha > 0.0 && alpha < bound);
        self.pos_at_zero.set(index, positive && alpha == 0.0);
        self.neg_at_bound.set(index, !positive && alpha == bound);
        self.pos_at_bound.set(index, positive && alpha == bound);
        self.neg_at_zero.set(index, !positive && alpha == 0.0);
    }

    /// Indices whose error may lower `b_up`
    pub fn is_up_candidate(&self, index: usize) -> bool {
        self.free.contains(index)
            || self.pos_at_zero.contains(index)
            || self.neg_at_bound.contains(index)
    }

    /// Indices whose error may raise `b_low`
    pub fn is_low_candidate(&self, index: usize) -> bool {
        self.free.contains(index)
            || self.pos_at_bound.contains(index)
            || self.neg_at_zero.contains(index)
    }
}
