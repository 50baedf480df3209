//! Distance metrics and per-query distance computers.
//!
//! The metric set is closed: {L2, inner product, fusion}. Dispatch happens
//! through [`MetricType`] rather than trait objects, and the per-query
//! [`DistanceComputer`] is the seam higher-level indexes attach to when they
//! only need candidates scored, not searched.

use serde::{Deserialize, Serialize};
use wide::f32x8;

use crate::error::{Result, VecscanError};

/// Distance metrics for ranking stored vectors against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Squared Euclidean distance (lower is better).
    #[default]
    L2,
    /// Dot product similarity (higher is better).
    InnerProduct,
    /// Composite metric combining a primary L2 distance with a per-item
    /// filter distance (lower combined score is better).
    Fusion,
}

impl MetricType {
    /// Whether larger scores rank better under this metric.
    pub fn is_similarity(&self) -> bool {
        matches!(self, MetricType::InnerProduct)
    }

    /// Metric-appropriate threshold test for range search.
    pub fn within(&self, score: f32, radius: f32) -> bool {
        if self.is_similarity() {
            score >= radius
        } else {
            score <= radius
        }
    }

    /// Score a single pair under this metric's primary channel.
    ///
    /// The fusion metric's primary channel is the L2 distance; the filter
    /// channel and combination rule live in the fusion index.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            MetricType::L2 | MetricType::Fusion => l2_sqr(a, b),
            MetricType::InnerProduct => inner_product(a, b),
        }
    }

    /// Get the name of this metric.
    pub fn name(&self) -> &'static str {
        match self {
            MetricType::L2 => "l2",
            MetricType::InnerProduct => "inner_product",
            MetricType::Fusion => "fusion",
        }
    }

    /// Parse a metric from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(MetricType::L2),
            "inner_product" | "ip" | "dot" => Ok(MetricType::InnerProduct),
            "fusion" => Ok(MetricType::Fusion),
            _ => Err(VecscanError::configuration(format!(
                "Unknown metric: {s}"
            ))),
        }
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn l2_sqr(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < 8 {
        return a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum();
    }

    let mut acc = f32x8::splat(0.0);

    // Process 8 values at a time
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let vec_a = f32x8::new(*<&[f32; 8]>::try_from(chunk_a).unwrap());
        let vec_b = f32x8::new(*<&[f32; 8]>::try_from(chunk_b).unwrap());
        let diff = vec_a - vec_b;
        acc = acc + diff * diff;
    }

    // Sum all lanes
    let acc_array = acc.to_array();
    let mut total = acc_array.iter().sum::<f32>();

    // Add remainder
    total += remainder_a
        .iter()
        .zip(remainder_b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>();

    total
}

/// Dot product between two equal-length vectors.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < 8 {
        return a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    }

    let mut acc = f32x8::splat(0.0);

    // Process 8 values at a time
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let vec_a = f32x8::new(*<&[f32; 8]>::try_from(chunk_a).unwrap());
        let vec_b = f32x8::new(*<&[f32; 8]>::try_from(chunk_b).unwrap());
        acc = acc + vec_a * vec_b;
    }

    // Sum all lanes
    let acc_array = acc.to_array();
    let mut total = acc_array.iter().sum::<f32>();

    // Add remainder
    total += remainder_a
        .iter()
        .zip(remainder_b.iter())
        .map(|(x, y)| x * y)
        .sum::<f32>();

    total
}

/// Per-query evaluator reusable across many stored-side comparisons.
///
/// Holds the query once; the candidate id is supplied per call. Stateless
/// with respect to the stored side, so one computer can score an arbitrary
/// id stream.
pub trait DistanceComputer {
    /// Replace the query this computer scores against.
    fn set_query(&mut self, query: &[f32]) -> Result<()>;

    /// Score stored record `id` against the current query.
    fn distance_to(&self, id: usize) -> Result<f32>;
}

/// Distance computer over a flat (uncompressed) typed storage view.
#[derive(Debug)]
pub struct FlatDistanceComputer<'a> {
    metric: MetricType,
    d: usize,
    values: &'a [f32],
    query: Vec<f32>,
}

impl<'a> FlatDistanceComputer<'a> {
    /// Create a computer over a typed storage view of `d`-float records.
    pub fn new(metric: MetricType, d: usize, values: &'a [f32], query: &[f32]) -> Result<Self> {
        let mut computer = Self {
            metric,
            d,
            values,
            query: Vec::new(),
        };
        computer.set_query(query)?;
        Ok(computer)
    }

    /// Number of records visible to this computer.
    pub fn ntotal(&self) -> usize {
        self.values.len() / self.d
    }
}

impl DistanceComputer for FlatDistanceComputer<'_> {
    fn set_query(&mut self, query: &[f32]) -> Result<()> {
        if query.len() != self.d {
            return Err(VecscanError::precondition(format!(
                "query has dimension {}, expected {}",
                query.len(),
                self.d
            )));
        }
        self.query.clear();
        self.query.extend_from_slice(query);
        Ok(())
    }

    fn distance_to(&self, id: usize) -> Result<f32> {
        let start = id * self.d;
        let end = start + self.d;
        if end > self.values.len() {
            return Err(VecscanError::precondition(format!(
                "id {} out of range (ntotal = {})",
                id,
                self.ntotal()
            )));
        }
        Ok(self.metric.score(&self.query, &self.values[start..end]))
    }
}

/// Pluggable rule combining the fusion metric's two distance channels.
///
/// Implementations must be monotonic: improving (lowering) either component
/// distance must not worsen the combined rank.
pub trait ScoreCombiner: Send + Sync {
    /// Combine the primary vector distance and the filter distance into the
    /// ranking key (lower is better).
    fn combine(&self, primary: f32, filter: f32) -> f32;
}

/// Convex weighted sum of the two channels: `alpha * primary + (1 - alpha) * filter`.
#[derive(Debug, Clone, Copy)]
pub struct WeightedSumCombiner {
    alpha: f32,
}

impl WeightedSumCombiner {
    /// Create a combiner with the given primary-channel weight in `[0, 1]`.
    pub fn new(alpha: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(VecscanError::configuration(format!(
                "combiner weight must be in [0, 1], got {alpha}"
            )));
        }
        Ok(Self { alpha })
    }

    /// Weight applied to the primary channel.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for WeightedSumCombiner {
    fn default() -> Self {
        Self { alpha: 0.5 }
    }
}

impl ScoreCombiner for WeightedSumCombiner {
    fn combine(&self, primary: f32, filter: f32) -> f32 {
        self.alpha * primary + (1.0 - self.alpha) * filter
    }
}
