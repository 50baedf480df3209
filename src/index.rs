//! Index implementations.
//!
//! - `flat`: exhaustive search over uncompressed storage
//! - `fusion`: dual-channel fusion specialization with a parallel filter arena
//! - `flat1d`: sorted-permutation specialization for 1-D data

pub mod flat;
pub mod flat1d;
pub mod fusion;

pub use self::flat::FlatIndex;
pub use self::flat1d::Flat1DIndex;
pub use self::fusion::FusionFlatIndex;
