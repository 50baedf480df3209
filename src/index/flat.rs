//! Flat index: exhaustive k-NN and radius search over uncompressed storage.
//!
//! Every query scans all stored vectors through the active metric into a
//! bounded top-k selector. Queries are mutually independent, so batches are
//! searched in parallel across rayon workers; mutation (`add`, `reset`) is
//! exclusive and must not run concurrently with searches (caller contract).

use rayon::prelude::*;

use crate::codec::FlatCodec;
use crate::config::IndexConfig;
use crate::error::{Result, VecscanError};
use crate::metric::{FlatDistanceComputer, MetricType};
use crate::selector::{RangeHit, RangeSearchResults, TopKSelector};
use crate::storage::FlatStorage;
use crate::types::{IdSelector, Idx, SearchParameters};

/// Below this many queries a batch is searched sequentially.
const PARALLEL_QUERY_THRESHOLD: usize = 100;

/// Index that stores full, uncompressed vectors and searches exhaustively.
#[derive(Debug)]
pub struct FlatIndex {
    config: IndexConfig,
    codec: FlatCodec,
    storage: FlatStorage,
    is_trained: bool,
}

impl FlatIndex {
    /// Create an empty flat index.
    pub fn new(dimension: usize, metric: MetricType) -> Result<Self> {
        Self::from_config(IndexConfig::new(dimension, metric))
    }

    /// Create an empty flat index from a configuration.
    pub fn from_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let codec = FlatCodec::new(config.dimension)?;
        let storage = FlatStorage::new(config.dimension)?;
        Ok(Self {
            config,
            codec,
            storage,
            // Flat indexes require no training.
            is_trained: true,
        })
    }

    /// Create an L2 (squared Euclidean) flat index.
    pub fn l2(dimension: usize) -> Result<Self> {
        Self::new(dimension, MetricType::L2)
    }

    /// Create an inner-product flat index.
    pub fn ip(dimension: usize) -> Result<Self> {
        Self::new(dimension, MetricType::InnerProduct)
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Active metric.
    pub fn metric(&self) -> MetricType {
        self.config.metric
    }

    /// Encoded size of one stored vector, in bytes.
    pub fn code_size(&self) -> usize {
        self.codec.code_size()
    }

    /// Number of stored vectors.
    pub fn ntotal(&self) -> usize {
        self.storage.ntotal()
    }

    /// Whether the index is ready for additions (always true for flat).
    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    /// Append a batch of whole vectors; returns the number added.
    ///
    /// A no-op for an empty batch. The grow is all-or-nothing: validation
    /// happens before storage is touched.
    pub fn add(&mut self, vectors: &[f32]) -> Result<usize> {
        if !self.is_trained {
            return Err(VecscanError::precondition(
                "index must be trained before adding vectors",
            ));
        }
        self.codec.batch_len(vectors.len())?;
        self.storage.append(vectors)
    }

    /// Remove all stored vectors.
    pub fn reset(&mut self) {
        self.storage.reset();
    }

    /// Read-only typed view over the stored vectors.
    ///
    /// Valid for the flat codec only (the encoding is an identity
    /// reinterpretation). The view borrows the index and cannot outlive it.
    pub fn vector_view(&self) -> &[f32] {
        self.storage.values()
    }

    /// Mutable typed view over the stored vectors.
    pub fn vector_view_mut(&mut self) -> &mut [f32] {
        self.storage.values_mut()
    }

    /// Decode one stored vector into `out` (length `d`).
    pub fn reconstruct(&self, id: Idx, out: &mut [f32]) -> Result<()> {
        if out.len() != self.config.dimension {
            return Err(VecscanError::precondition(format!(
                "output buffer holds {} floats, expected {}",
                out.len(),
                self.config.dimension
            )));
        }
        let record = self.checked_record(id)?;
        out.copy_from_slice(record);
        Ok(())
    }

    /// Decode one stored vector into a fresh buffer.
    pub fn reconstruct_owned(&self, id: Idx) -> Result<Vec<f32>> {
        Ok(self.checked_record(id)?.to_vec())
    }

    fn checked_record(&self, id: Idx) -> Result<&[f32]> {
        if id < 0 {
            return Err(VecscanError::precondition(format!(
                "id {id} out of range"
            )));
        }
        self.storage.record(id as usize)
    }

    /// Encode vectors into the standalone codec byte format.
    pub fn sa_encode(&self, vectors: &[f32], bytes: &mut [u8]) -> Result<()> {
        self.codec.encode(vectors, bytes)
    }

    /// Decode standalone codec bytes back into vectors.
    pub fn sa_decode(&self, bytes: &[u8], vectors: &mut [f32]) -> Result<()> {
        self.codec.decode(bytes, vectors)
    }

    /// Per-query distance computer over this index's storage.
    ///
    /// The seam external coarse indexes attach to: the returned computer
    /// holds the query once and scores arbitrary stored ids on demand.
    pub fn distance_computer(&self, query: &[f32]) -> Result<FlatDistanceComputer<'_>> {
        FlatDistanceComputer::new(
            self.config.metric,
            self.config.dimension,
            self.storage.values(),
            query,
        )
    }

    /// Search the k nearest neighbors of each query.
    ///
    /// `distances` and `labels` are caller-owned row-major buffers of
    /// length `n * k`. Rows are metric-ordered (ascending distance for L2,
    /// descending similarity for inner product); slots beyond `ntotal` are
    /// padded with the sentinel label.
    pub fn search(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Idx],
    ) -> Result<()> {
        self.search_with_params(queries, k, distances, labels, &SearchParameters::default())
    }

    /// Search with optional per-call parameters (e.g. an id selector).
    pub fn search_with_params(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &mut [Idx],
        params: &SearchParameters<'_>,
    ) -> Result<()> {
        let n = self.check_knn_shapes(queries, k, distances.len(), labels.len())?;
        let d = self.config.dimension;
        let selector = params.selector;

        if n >= PARALLEL_QUERY_THRESHOLD {
            queries
                .par_chunks(d)
                .zip(distances.par_chunks_mut(k))
                .zip(labels.par_chunks_mut(k))
                .for_each(|((query, dist_row), label_row)| {
                    self.scan_one(query, k, selector, dist_row, label_row)
                });
        } else {
            for ((query, dist_row), label_row) in queries
                .chunks(d)
                .zip(distances.chunks_mut(k))
                .zip(labels.chunks_mut(k))
            {
                self.scan_one(query, k, selector, dist_row, label_row);
            }
        }
        Ok(())
    }

    /// Collect every stored vector within the metric threshold of each query.
    ///
    /// L2 retains `distance <= radius`; inner product retains
    /// `similarity >= radius`. Match counts are unbounded.
    pub fn range_search(&self, queries: &[f32], radius: f32) -> Result<RangeSearchResults> {
        self.range_search_with_params(queries, radius, &SearchParameters::default())
    }

    /// Range search with optional per-call parameters.
    pub fn range_search_with_params(
        &self,
        queries: &[f32],
        radius: f32,
        params: &SearchParameters<'_>,
    ) -> Result<RangeSearchResults> {
        let n = self.codec.batch_len(queries.len())?;
        let d = self.config.dimension;
        let selector = params.selector;

        let lists: Vec<Vec<RangeHit>> = if n >= PARALLEL_QUERY_THRESHOLD {
            queries
                .par_chunks(d)
                .map(|query| self.range_scan_one(query, radius, selector))
                .collect()
        } else {
            queries
                .chunks(d)
                .map(|query| self.range_scan_one(query, radius, selector))
                .collect()
        };
        Ok(RangeSearchResults::from_lists(lists))
    }

    /// Score each query against an explicit candidate id list, no scan.
    ///
    /// `labels` supplies k candidate ids per query; `distances` receives the
    /// k scores per query. Negative candidate ids are skipped and their
    /// slots carry the metric's worst score. An out-of-range id fails the
    /// whole call before any distances are written.
    pub fn compute_distance_subset(
        &self,
        queries: &[f32],
        k: usize,
        distances: &mut [f32],
        labels: &[Idx],
    ) -> Result<()> {
        let n = self.check_knn_shapes(queries, k, distances.len(), labels.len())?;
        let ntotal = self.storage.ntotal();
        for &id in labels {
            if id >= 0 && id as usize >= ntotal {
                return Err(VecscanError::precondition(format!(
                    "candidate id {id} out of range (ntotal = {ntotal})"
                )));
            }
        }

        let d = self.config.dimension;
        let metric = self.config.metric;
        let pad = if metric.is_similarity() {
            f32::NEG_INFINITY
        } else {
            f32::INFINITY
        };
        for qi in 0..n {
            let query = &queries[qi * d..(qi + 1) * d];
            for slot in 0..k {
                let id = labels[qi * k + slot];
                distances[qi * k + slot] = if id < 0 {
                    pad
                } else {
                    // Bounds were checked above.
                    metric.score(query, &self.storage.values()[id as usize * d..][..d])
                };
            }
        }
        Ok(())
    }

    fn check_knn_shapes(
        &self,
        queries: &[f32],
        k: usize,
        distances_len: usize,
        labels_len: usize,
    ) -> Result<usize> {
        if k == 0 {
            return Err(VecscanError::precondition("k must be positive"));
        }
        let n = self.codec.batch_len(queries.len())?;
        if distances_len != n * k || labels_len != n * k {
            return Err(VecscanError::precondition(format!(
                "result buffers hold {distances_len} distances and {labels_len} labels, expected {} each",
                n * k
            )));
        }
        Ok(n)
    }

    fn scan_one(
        &self,
        query: &[f32],
        k: usize,
        selector: Option<&dyn IdSelector>,
        dist_row: &mut [f32],
        label_row: &mut [Idx],
    ) {
        let metric = self.config.metric;
        let mut topk = if metric.is_similarity() {
            TopKSelector::largest(k)
        } else {
            TopKSelector::smallest(k)
        };
        for (id, record) in self.storage.iter() {
            let id = id as Idx;
            if let Some(sel) = selector
                && !sel.is_member(id)
            {
                continue;
            }
            topk.push(id, metric.score(query, record));
        }
        topk.write_row(dist_row, label_row);
    }

    fn range_scan_one(
        &self,
        query: &[f32],
        radius: f32,
        selector: Option<&dyn IdSelector>,
    ) -> Vec<RangeHit> {
        let metric = self.config.metric;
        let mut hits = Vec::new();
        for (id, record) in self.storage.iter() {
            let id = id as Idx;
            if let Some(sel) = selector
                && !sel.is_member(id)
            {
                continue;
            }
            let score = metric.score(query, record);
            if metric.within(score, radius) {
                hits.push(RangeHit {
                    label: id,
                    distance: score,
                });
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NO_LABEL;

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::l2(2).unwrap();
        index
            .add(&[0.0, 0.0, 1.0, 0.0, 0.0, 2.0])
            .unwrap();
        index
    }

    #[test]
    fn test_add_updates_ntotal() {
        let mut index = FlatIndex::l2(4).unwrap();
        assert!(index.is_trained());
        assert_eq!(index.ntotal(), 0);

        assert_eq!(index.add(&[0.0; 8]).unwrap(), 2);
        assert_eq!(index.ntotal(), 2);
        assert_eq!(index.code_size(), 16);

        // Ragged batch is rejected without mutation.
        assert!(index.add(&[0.0; 5]).is_err());
        assert_eq!(index.ntotal(), 2);
    }

    #[test]
    fn test_l2_search_orders_ascending() {
        let index = sample_index();
        let mut distances = [0.0f32; 2];
        let mut labels = [0 as Idx; 2];
        index.search(&[0.0, 0.0], 2, &mut distances, &mut labels).unwrap();

        assert_eq!(labels, [0, 1]);
        assert_eq!(distances, [0.0, 1.0]);
    }

    #[test]
    fn test_ip_search_orders_descending() {
        let mut index = FlatIndex::ip(2).unwrap();
        index.add(&[1.0, 0.0, 0.5, 0.5, 0.0, 1.0]).unwrap();

        let mut distances = [0.0f32; 3];
        let mut labels = [0 as Idx; 3];
        index.search(&[1.0, 0.0], 3, &mut distances, &mut labels).unwrap();

        assert_eq!(labels, [0, 1, 2]);
        assert_eq!(distances, [1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_search_pads_when_k_exceeds_ntotal() {
        let index = sample_index();
        let mut distances = [0.0f32; 5];
        let mut labels = [0 as Idx; 5];
        index.search(&[0.0, 0.0], 5, &mut distances, &mut labels).unwrap();

        assert_eq!(&labels[..3], &[0, 1, 2]);
        assert_eq!(&labels[3..], &[NO_LABEL, NO_LABEL]);
        assert!(distances[3].is_infinite());
    }

    #[test]
    fn test_search_rejects_bad_shapes() {
        let index = sample_index();
        let mut distances = [0.0f32; 2];
        let mut labels = [0 as Idx; 2];

        assert!(index.search(&[0.0, 0.0], 0, &mut [], &mut []).is_err());
        assert!(index.search(&[0.0], 2, &mut distances, &mut labels).is_err());
        assert!(index.search(&[0.0, 0.0], 3, &mut distances, &mut labels).is_err());
    }

    #[test]
    fn test_search_with_id_selector() {
        let index = sample_index();
        let skip_zero = |id: Idx| id != 0;
        let params = SearchParameters {
            selector: Some(&skip_zero),
        };

        let mut distances = [0.0f32; 2];
        let mut labels = [0 as Idx; 2];
        index
            .search_with_params(&[0.0, 0.0], 2, &mut distances, &mut labels, &params)
            .unwrap();

        assert_eq!(labels, [1, 2]);
        assert_eq!(distances, [1.0, 4.0]);
    }

    #[test]
    fn test_range_search_inclusive_threshold() {
        let index = sample_index();
        let results = index.range_search(&[0.0, 0.0], 1.0).unwrap();

        assert_eq!(results.num_queries(), 1);
        let hits = results.query(0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].label, 0);
        assert_eq!(hits[1].label, 1);
        assert_eq!(hits[1].distance, 1.0);
    }

    #[test]
    fn test_reconstruct() {
        let index = sample_index();
        let mut out = [0.0f32; 2];
        index.reconstruct(2, &mut out).unwrap();
        assert_eq!(out, [0.0, 2.0]);

        assert_eq!(index.reconstruct_owned(1).unwrap(), vec![1.0, 0.0]);
        assert!(index.reconstruct(3, &mut out).is_err());
        assert!(index.reconstruct(-1, &mut out).is_err());
    }

    #[test]
    fn test_compute_distance_subset() {
        let index = sample_index();
        let labels = [2 as Idx, 0, NO_LABEL, 1];
        let mut distances = [0.0f32; 4];
        index
            .compute_distance_subset(&[0.0, 0.0, 0.0, 0.0], 2, &mut distances, &labels)
            .unwrap();

        assert_eq!(distances[0], 4.0);
        assert_eq!(distances[1], 0.0);
        assert!(distances[2].is_infinite());
        assert_eq!(distances[3], 1.0);

        // Out-of-range candidate fails the call.
        let bad = [5 as Idx, 0, 0, 0];
        assert!(
            index
                .compute_distance_subset(&[0.0, 0.0, 0.0, 0.0], 2, &mut distances, &bad)
                .is_err()
        );
    }

    #[test]
    fn test_sa_codec_round_trip() {
        let index = sample_index();
        let vectors = [0.5f32, -1.5, 2.25, 3.75];
        let mut bytes = vec![0u8; vectors.len() * 4];
        index.sa_encode(&vectors, &mut bytes).unwrap();

        let mut decoded = vec![0.0f32; 4];
        index.sa_decode(&bytes, &mut decoded).unwrap();
        assert_eq!(decoded, vectors);
    }

    #[test]
    fn test_vector_view_matches_storage() {
        let index = sample_index();
        let view = index.vector_view();
        assert_eq!(view.len(), index.ntotal() * index.dimension());
        assert_eq!(&view[2..4], &[1.0, 0.0]);
    }

    #[test]
    fn test_reset_empties_index() {
        let mut index = sample_index();
        index.reset();
        assert_eq!(index.ntotal(), 0);

        let mut distances = [0.0f32; 2];
        let mut labels = [0 as Idx; 2];
        index.search(&[0.0, 0.0], 2, &mut distances, &mut labels).unwrap();
        assert_eq!(labels, [NO_LABEL, NO_LABEL]);
    }

    #[test]
    fn test_distance_computer_scores_ids() {
        let index = sample_index();
        use crate::metric::DistanceComputer;

        let computer = index.distance_computer(&[0.0, 0.0]).unwrap();
        assert_eq!(computer.distance_to(2).unwrap(), 4.0);
        assert!(computer.distance_to(3).is_err());
    }
}
