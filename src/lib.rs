//! # Vecscan
//!
//! An exhaustive (flat) vector similarity search engine for Rust.
//!
//! ## Features
//!
//! - Pure Rust implementation
//! - Brute-force k-nearest-neighbor and radius search over uncompressed storage
//! - L2, inner-product and composite fusion metrics
//! - Bounded top-k selection with deterministic tie-breaking
//! - Sorted-permutation specialization for 1-D data
//! - Cross-query parallelism via rayon

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod metric;
pub mod selector;
pub mod storage;
pub mod types;

pub use self::config::{FusionConfig, IndexConfig};
pub use self::error::{Result, VecscanError};
pub use self::index::{Flat1DIndex, FlatIndex, FusionFlatIndex};
pub use self::metric::MetricType;
pub use self::types::{IdSelector, Idx, NO_LABEL, SearchParameters};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
