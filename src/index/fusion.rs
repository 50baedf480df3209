//! Fusion flat index: exhaustive search ranked by a combined dual distance.
//!
//! Each stored item carries a primary vector and a parallel filter block of
//! `num_filters × filter_dim` floats. Candidates are ranked by a pluggable
//! monotonic combination of the primary L2 distance and the filter-block
//! L2 distance; both raw channel distances are reported for the winning ids.

use rayon::prelude::*;

use crate::config::FusionConfig;
use crate::error::{Result, VecscanError};
use crate::index::flat::FlatIndex;
use crate::metric::{MetricType, ScoreCombiner, WeightedSumCombiner, l2_sqr};
use crate::selector::FusionSelector;
use crate::storage::FlatStorage;
use crate::types::Idx;

/// Below this many queries a batch is searched sequentially.
const PARALLEL_QUERY_THRESHOLD: usize = 100;

/// Flat index specialized for the fusion metric.
pub struct FusionFlatIndex {
    base: FlatIndex,
    filters: FlatStorage,
    config: FusionConfig,
    combiner: Box<dyn ScoreCombiner>,
}

impl std::fmt::Debug for FusionFlatIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionFlatIndex")
            .field("base", &self.base)
            .field("filters", &self.filters)
            .field("config", &self.config)
            .field("combiner", &"<score combiner>")
            .finish()
    }
}

impl FusionFlatIndex {
    /// Create an empty fusion index with the default weighted-sum combiner.
    pub fn new(dimension: usize, num_filters: usize, filter_dim: usize) -> Result<Self> {
        Self::from_config(FusionConfig::new(dimension, num_filters, filter_dim))
    }

    /// Create an empty fusion index from a configuration.
    pub fn from_config(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        let base = FlatIndex::new(config.dimension, MetricType::Fusion)?;
        let filters = FlatStorage::new(config.filter_len())?;
        Ok(Self {
            base,
            filters,
            config,
            combiner: Box::new(WeightedSumCombiner::default()),
        })
    }

    /// Replace the combination rule.
    pub fn with_combiner(mut self, combiner: Box<dyn ScoreCombiner>) -> Self {
        self.combiner = combiner;
        self
    }

    /// Primary vector dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Number of filter vectors per item.
    pub fn num_filters(&self) -> usize {
        self.config.num_filters
    }

    /// Dimension of each filter vector.
    pub fn filter_dim(&self) -> usize {
        self.config.filter_dim
    }

    /// Encoded size of one item's filter block, in bytes.
    pub fn filter_size(&self) -> usize {
        self.config.filter_len() * std::mem::size_of::<f32>()
    }

    /// Number of stored items.
    pub fn ntotal(&self) -> usize {
        self.base.ntotal()
    }

    /// Whether the index is ready for additions (always true for flat).
    pub fn is_trained(&self) -> bool {
        self.base.is_trained()
    }

    /// Append items with their filter blocks; returns the number added.
    ///
    /// Both arenas grow in lockstep or not at all: a mismatched filter
    /// batch is rejected before either arena is touched.
    pub fn add(&mut self, vectors: &[f32], filters: &[f32]) -> Result<usize> {
        if !self.base.is_trained() {
            return Err(VecscanError::precondition(
                "index must be trained before adding vectors",
            ));
        }
        if vectors.len() % self.config.dimension != 0 {
            return Err(VecscanError::precondition(format!(
                "batch length {} is not a multiple of dimension {}",
                vectors.len(),
                self.config.dimension
            )));
        }
        let n = vectors.len() / self.config.dimension;
        if filters.len() != n * self.config.filter_len() {
            return Err(VecscanError::precondition(format!(
                "filter batch holds {} floats for {} vectors, expected {}",
                filters.len(),
                n,
                n * self.config.filter_len()
            )));
        }

        // Validated above; neither append can fail now.
        self.base.add(vectors)?;
        self.filters.append(filters)?;
        debug_assert_eq!(self.base.ntotal(), self.filters.ntotal());
        Ok(n)
    }

    /// Remove all stored items from both arenas.
    pub fn reset(&mut self) {
        self.base.reset();
        self.filters.reset();
    }

    /// Read-only typed view over the primary vectors.
    pub fn vector_view(&self) -> &[f32] {
        self.base.vector_view()
    }

    /// Read-only typed view over the filter blocks.
    pub fn filter_view(&self) -> &[f32] {
        self.filters.values()
    }

    /// Decode one stored primary vector.
    pub fn reconstruct(&self, id: Idx, out: &mut [f32]) -> Result<()> {
        self.base.reconstruct(id, out)
    }

    /// One stored item's filter block, bounds-checked.
    pub fn filter_block(&self, id: Idx) -> Result<&[f32]> {
        if id < 0 {
            return Err(VecscanError::precondition(format!(
                "id {id} out of range"
            )));
        }
        self.filters.record(id as usize)
    }

    /// Search the k best items of each query under the combined ranking.
    ///
    /// `queries` holds `n * d` floats and `query_filters` the matching
    /// `n * num_filters * filter_dim` filter floats. The output rows carry
    /// the winning labels with both raw channel distances (primary in
    /// `distances`, filter in `filter_distances`), ordered by the combined
    /// score ascending; unfilled slots carry the sentinel label.
    pub fn search(
        &self,
        queries: &[f32],
        query_filters: &[f32],
        k: usize,
        distances: &mut [f32],
        filter_distances: &mut [f32],
        labels: &mut [Idx],
    ) -> Result<()> {
        if k == 0 {
            return Err(VecscanError::precondition("k must be positive"));
        }
        let d = self.config.dimension;
        let flen = self.config.filter_len();
        if queries.len() % d != 0 {
            return Err(VecscanError::precondition(format!(
                "query batch length {} is not a multiple of dimension {d}",
                queries.len()
            )));
        }
        let n = queries.len() / d;
        if query_filters.len() != n * flen {
            return Err(VecscanError::precondition(format!(
                "query filter batch holds {} floats for {} queries, expected {}",
                query_filters.len(),
                n,
                n * flen
            )));
        }
        if distances.len() != n * k || filter_distances.len() != n * k || labels.len() != n * k {
            return Err(VecscanError::precondition(format!(
                "result buffers must hold {} entries each",
                n * k
            )));
        }

        if n >= PARALLEL_QUERY_THRESHOLD {
            queries
                .par_chunks(d)
                .zip(query_filters.par_chunks(flen))
                .zip(distances.par_chunks_mut(k))
                .zip(filter_distances.par_chunks_mut(k))
                .zip(labels.par_chunks_mut(k))
                .for_each(|((((query, qfilter), dist_row), frow), label_row)| {
                    self.scan_one(query, qfilter, k, dist_row, frow, label_row)
                });
        } else {
            for ((((query, qfilter), dist_row), frow), label_row) in queries
                .chunks(d)
                .zip(query_filters.chunks(flen))
                .zip(distances.chunks_mut(k))
                .zip(filter_distances.chunks_mut(k))
                .zip(labels.chunks_mut(k))
            {
                self.scan_one(query, qfilter, k, dist_row, frow, label_row);
            }
        }
        Ok(())
    }

    fn scan_one(
        &self,
        query: &[f32],
        qfilter: &[f32],
        k: usize,
        dist_row: &mut [f32],
        filter_row: &mut [f32],
        label_row: &mut [Idx],
    ) {
        let mut topk = FusionSelector::new(k);
        let vectors = self.base.vector_view();
        let d = self.config.dimension;
        for (id, fblock) in self.filters.iter() {
            let record = &vectors[id * d..(id + 1) * d];
            let primary = l2_sqr(query, record);
            let filter = l2_sqr(qfilter, fblock);
            let combined = self.combiner.combine(primary, filter);
            topk.push(id as Idx, combined, primary, filter);
        }
        topk.write_row(dist_row, filter_row, label_row);
    }
}
