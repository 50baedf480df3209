//! Error types for the Vecscan library.
//!
//! All failures are synchronous and deterministic: the engine has no
//! transient failure modes, so nothing here is retried. Every public
//! operation either fully succeeds or fails without observable mutation.
//!
//! # Examples
//!
//! ```
//! use vecscan::error::{Result, VecscanError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(VecscanError::precondition("k must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use anyhow;
use thiserror::Error;

/// The main error type for Vecscan operations.
#[derive(Error, Debug)]
pub enum VecscanError {
    /// Invalid construction-time configuration (dimension, metric, filter shape).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A caller contract violated at call time (untrained mutation, bad id,
    /// mismatched batch shape, non-positive k).
    #[error("Precondition error: {0}")]
    Precondition(String),

    /// An internal invariant no longer holds. Should never surface.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// I/O errors (configuration files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with VecscanError.
pub type Result<T> = std::result::Result<T, VecscanError>;

impl VecscanError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        VecscanError::Configuration(msg.into())
    }

    /// Create a new precondition error.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        VecscanError::Precondition(msg.into())
    }

    /// Create a new invariant violation error.
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        VecscanError::Invariant(msg.into())
    }
}
