//! Bounded top-k selection and range-search result collection.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::{Idx, NO_LABEL};

/// A candidate in the heap, keyed by normalized "worseness".
///
/// The key is the distance as-is for keep-smallest metrics and the negated
/// similarity for keep-largest ones, so the max-heap root is always the
/// worst retained candidate. Ties rank the larger id as worse, which makes
/// the final order deterministic and independent of scan order.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    key: f32,
    id: Idx,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.id == other.id
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .partial_cmp(&other.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Fixed-capacity accumulator retaining the k best candidates seen so far.
///
/// O(log k) per accepted candidate, O(1) for rejected ones once full.
#[derive(Debug)]
pub struct TopKSelector {
    k: usize,
    keep_largest: bool,
    heap: BinaryHeap<HeapEntry>,
}

impl TopKSelector {
    /// Create a selector retaining the k smallest scores (distances).
    pub fn smallest(k: usize) -> Self {
        Self {
            k,
            keep_largest: false,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    /// Create a selector retaining the k largest scores (similarities).
    pub fn largest(k: usize) -> Self {
        Self {
            k,
            keep_largest: true,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    fn key_of(&self, score: f32) -> f32 {
        if self.keep_largest { -score } else { score }
    }

    /// Offer a candidate to the selector.
    pub fn push(&mut self, id: Idx, score: f32) {
        let entry = HeapEntry {
            key: self.key_of(score),
            id,
        };
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek()
            && entry.cmp(worst) == Ordering::Less
        {
            self.heap.pop();
            self.heap.push(entry);
        }
    }

    /// Number of candidates currently retained.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no candidates are retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into metric order (best first).
    pub fn into_sorted(self) -> Vec<(Idx, f32)> {
        let keep_largest = self.keep_largest;
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| {
                let score = if keep_largest { -entry.key } else { entry.key };
                (entry.id, score)
            })
            .collect()
    }

    /// Drain into one caller-owned output row of length k, padding unfilled
    /// slots with the sentinel label and the metric's worst score.
    pub fn write_row(self, distances: &mut [f32], labels: &mut [Idx]) {
        debug_assert_eq!(distances.len(), self.k);
        debug_assert_eq!(labels.len(), self.k);

        let pad = if self.keep_largest {
            f32::NEG_INFINITY
        } else {
            f32::INFINITY
        };
        let sorted = self.into_sorted();
        let filled = sorted.len();
        for (slot, (id, score)) in sorted.into_iter().enumerate() {
            labels[slot] = id;
            distances[slot] = score;
        }
        for slot in filled..labels.len() {
            labels[slot] = NO_LABEL;
            distances[slot] = pad;
        }
    }
}

/// A fusion candidate carrying both raw channel distances next to the
/// combined ranking key, so the reported pair always belongs to the
/// winning id.
#[derive(Debug, Clone, Copy)]
struct FusionEntry {
    key: f32,
    primary: f32,
    filter: f32,
    id: Idx,
}

impl FusionEntry {
    fn order(&self, other: &Self) -> Ordering {
        self.key
            .partial_cmp(&other.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialEq for FusionEntry {
    fn eq(&self, other: &Self) -> bool {
        self.order(other) == Ordering::Equal
    }
}

impl Eq for FusionEntry {}

impl PartialOrd for FusionEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.order(other))
    }
}

impl Ord for FusionEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order(other)
    }
}

/// Top-k accumulator for the fusion metric's synchronized dual channel.
///
/// Ranks by the combined score (smaller is better) while retaining the raw
/// primary and filter distances of each retained candidate.
#[derive(Debug)]
pub struct FusionSelector {
    k: usize,
    heap: BinaryHeap<FusionEntry>,
}

impl FusionSelector {
    /// Create a selector retaining the k smallest combined scores.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    /// Offer a candidate with its combined key and both raw distances.
    pub fn push(&mut self, id: Idx, combined: f32, primary: f32, filter: f32) {
        let entry = FusionEntry {
            key: combined,
            primary,
            filter,
            id,
        };
        if self.heap.len() < self.k {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek()
            && entry.cmp(worst) == Ordering::Less
        {
            self.heap.pop();
            self.heap.push(entry);
        }
    }

    /// Drain into caller-owned rows of length k, padding unfilled slots.
    pub fn write_row(self, distances: &mut [f32], filter_distances: &mut [f32], labels: &mut [Idx]) {
        debug_assert_eq!(distances.len(), self.k);
        debug_assert_eq!(filter_distances.len(), self.k);
        debug_assert_eq!(labels.len(), self.k);

        let sorted = self.heap.into_sorted_vec();
        let filled = sorted.len();
        for (slot, entry) in sorted.into_iter().enumerate() {
            labels[slot] = entry.id;
            distances[slot] = entry.primary;
            filter_distances[slot] = entry.filter;
        }
        for slot in filled..labels.len() {
            labels[slot] = NO_LABEL;
            distances[slot] = f32::INFINITY;
            filter_distances[slot] = f32::INFINITY;
        }
    }
}

/// One range-search match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeHit {
    /// Stored id of the matching vector.
    pub label: Idx,
    /// Its score under the active metric.
    pub distance: f32,
}

/// Variable-length per-query result lists for range search.
///
/// Sizes are not known in advance; lists grow dynamically during the scan.
#[derive(Debug, Clone, Default)]
pub struct RangeSearchResults {
    queries: Vec<Vec<RangeHit>>,
}

impl RangeSearchResults {
    /// Create results for `n` queries, all initially empty.
    pub fn new(n: usize) -> Self {
        Self {
            queries: vec![Vec::new(); n],
        }
    }

    /// Assemble results from already-collected per-query lists.
    pub fn from_lists(queries: Vec<Vec<RangeHit>>) -> Self {
        Self { queries }
    }

    /// Append a match to one query's list.
    pub fn push(&mut self, query: usize, label: Idx, distance: f32) {
        self.queries[query].push(RangeHit { label, distance });
    }

    /// Matches for one query, in scan order.
    pub fn query(&self, query: usize) -> &[RangeHit] {
        &self.queries[query]
    }

    /// Number of queries.
    pub fn num_queries(&self) -> usize {
        self.queries.len()
    }

    /// Total matches across all queries.
    pub fn total_hits(&self) -> usize {
        self.queries.iter().map(Vec::len).sum()
    }
}
