//! Sorted-permutation index for 1-D data.
//!
//! A specialization of the L2 flat index for `d = 1`: instead of a linear
//! scan, searches binary-search an explicit permutation of stored indices
//! kept sorted by value, then walk outward to collect the k closest.
//!
//! Warning: the distances returned are absolute differences (L1), not
//! squared Euclidean, even though this is an L2 index type. The quirk is
//! inherited behavior and deliberately preserved.

use rayon::prelude::*;

use crate::error::{Result, VecscanError};
use crate::index::flat::FlatIndex;
use crate::metric::MetricType;
use crate::types::{Idx, NO_LABEL};

/// Below this many queries a batch is searched sequentially.
const PARALLEL_QUERY_THRESHOLD: usize = 100;

/// Optimized flat index for 1-D "vectors".
#[derive(Debug)]
pub struct Flat1DIndex {
    base: FlatIndex,
    /// Stored indices sorted by value (ties by id).
    perm: Vec<Idx>,
    continuous_update: bool,
}

impl Flat1DIndex {
    /// Create an empty 1-D index.
    ///
    /// With `continuous_update`, every `add` keeps the permutation sorted;
    /// otherwise the caller must invoke [`update_permutation`] between the
    /// last `add` and the first `search`.
    ///
    /// [`update_permutation`]: Flat1DIndex::update_permutation
    pub fn new(continuous_update: bool) -> Result<Self> {
        Ok(Self {
            base: FlatIndex::new(1, MetricType::L2)?,
            perm: Vec::new(),
            continuous_update,
        })
    }

    /// Whether the permutation is maintained on every add.
    pub fn continuous_update(&self) -> bool {
        self.continuous_update
    }

    /// Number of stored values.
    pub fn ntotal(&self) -> usize {
        self.base.ntotal()
    }

    /// Read-only view of the stored values.
    pub fn values(&self) -> &[f32] {
        self.base.vector_view()
    }

    /// Append a batch of scalar values; returns the number added.
    ///
    /// In continuous-update mode each new index is inserted at its sorted
    /// position; otherwise the permutation goes stale until
    /// [`update_permutation`](Flat1DIndex::update_permutation) is called.
    pub fn add(&mut self, values: &[f32]) -> Result<usize> {
        let start = self.base.ntotal();
        let added = self.base.add(values)?;

        if self.continuous_update {
            let stored = self.base.vector_view();
            for offset in 0..added {
                let id = (start + offset) as Idx;
                let value = stored[start + offset];
                let at = self.perm.partition_point(|&p| {
                    let pv = stored[p as usize];
                    pv < value || (pv == value && p < id)
                });
                self.perm.insert(at, id);
            }
        }
        Ok(added)
    }

    /// Rebuild the permutation with a full sort.
    ///
    /// Required between the last `add` and the first `search` when
    /// continuous updates are disabled.
    pub fn update_permutation(&mut self) {
        let stored = self.base.vector_view();
        self.perm = (0..self.base.ntotal() as Idx).collect();
        self.perm.sort_unstable_by(|&a, &b| {
            stored[a as usize]
                .partial_cmp(&stored[b as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cmp(&b))
        });
    }

    /// Remove all stored values and the permutation.
    pub fn reset(&mut self) {
        self.base.reset();
        self.perm.clear();
    }

    /// Search the k nearest stored values of each 1-D query.
    ///
    /// Output rows are ordered by ascending absolute difference; the
    /// reported distances are L1, not squared L2. Unfilled slots carry the
    /// sentinel label.
    pub fn search(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Idx],
    ) -> Result<()> {
        if k == 0 {
            return Err(VecscanError::precondition("k must be positive"));
        }
        let n = queries.len();
        if distances.len() != n * k || labels.len() != n * k {
            return Err(VecscanError::precondition(format!(
                "result buffers must hold {} entries each",
                n * k
            )));
        }
        if self.perm.len() != self.base.ntotal() {
            return Err(VecscanError::precondition(
                "permutation is stale; call update_permutation before search",
            ));
        }

        if n >= PARALLEL_QUERY_THRESHOLD {
            queries
                .par_iter()
                .zip(distances.par_chunks_mut(k))
                .zip(labels.par_chunks_mut(k))
                .for_each(|((&query, dist_row), label_row)| {
                    self.search_one(query, k, dist_row, label_row)
                });
        } else {
            for ((&query, dist_row), label_row) in queries
                .iter()
                .zip(distances.chunks_mut(k))
                .zip(labels.chunks_mut(k))
            {
                self.search_one(query, k, dist_row, label_row);
            }
        }
        Ok(())
    }

    /// Binary-search the permutation, then expand outward two-pointer style.
    fn search_one(&self, query: f32, k: usize, dist_row: &mut [f32], label_row: &mut [Idx]) {
        let stored = self.base.vector_view();
        let n = self.perm.len();

        // First permutation slot whose value is >= query.
        let mut right = self
            .perm
            .partition_point(|&p| stored[p as usize] < query);
        let mut left = right;

        let mut filled = 0;
        while filled < k && (left > 0 || right < n) {
            let dl = if left > 0 {
                query - stored[self.perm[left - 1] as usize]
            } else {
                f32::INFINITY
            };
            let dr = if right < n {
                stored[self.perm[right] as usize] - query
            } else {
                f32::INFINITY
            };

            // Closer side wins; exact ties go to the smaller id.
            let take_left = if dl < dr {
                true
            } else if dr < dl {
                false
            } else {
                self.perm[left - 1] < self.perm[right]
            };

            if take_left {
                left -= 1;
                label_row[filled] = self.perm[left];
                dist_row[filled] = dl;
            } else {
                label_row[filled] = self.perm[right];
                dist_row[filled] = dr;
                right += 1;
            }
            filled += 1;
        }

        // The walk emits non-decreasing distances, but equal distances can
        // interleave across the two sides; restore the smaller-id-first tie
        // order over the filled prefix.
        let mut row: Vec<(f32, Idx)> = dist_row[..filled]
            .iter()
            .copied()
            .zip(label_row[..filled].iter().copied())
            .collect();
        row.sort_unstable_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        for (slot, (distance, label)) in row.into_iter().enumerate() {
            dist_row[slot] = distance;
            label_row[slot] = label;
        }

        for slot in filled..k {
            label_row[slot] = NO_LABEL;
            dist_row[slot] = f32::INFINITY;
        }
    }
}
