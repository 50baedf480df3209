//! Append-only flat storage for fixed-length vector records.
//!
//! The arena is the canonical typed view: for the flat codec, the byte
//! encoding is an identity reinterpretation of the f32 data, so the engine
//! scans this buffer directly and only materializes bytes at the codec
//! boundary. The buffer length is always an exact multiple of the record
//! length; it never shrinks except on explicit reset.

use crate::error::{Result, VecscanError};

/// Contiguous arena holding `ntotal` records of `record_len` floats each.
#[derive(Debug, Clone)]
pub struct FlatStorage {
    record_len: usize,
    values: Vec<f32>,
}

impl FlatStorage {
    /// Create empty storage for records of `record_len` floats.
    pub fn new(record_len: usize) -> Result<Self> {
        if record_len == 0 {
            return Err(VecscanError::configuration(
                "record length must be a positive integer",
            ));
        }
        Ok(Self {
            record_len,
            values: Vec::new(),
        })
    }

    /// Floats per record.
    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Number of stored records.
    pub fn ntotal(&self) -> usize {
        self.values.len() / self.record_len
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a batch of whole records; returns the number appended.
    ///
    /// Validation happens before any mutation, and the grow itself is a
    /// single extend, so a failing append leaves the arena untouched.
    pub fn append(&mut self, values: &[f32]) -> Result<usize> {
        if values.is_empty() {
            return Ok(0);
        }
        if values.len() % self.record_len != 0 {
            return Err(VecscanError::precondition(format!(
                "batch length {} is not a multiple of record length {}",
                values.len(),
                self.record_len
            )));
        }
        self.values.extend_from_slice(values);
        debug_assert_eq!(self.values.len() % self.record_len, 0);
        Ok(values.len() / self.record_len)
    }

    /// Clear all records.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Read-only typed view over the whole arena.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Mutable typed view over the whole arena.
    ///
    /// Valid for the flat codec only, where records are raw floats; the
    /// caller may rewrite values in place but cannot change the length.
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// One stored record, bounds-checked.
    pub fn record(&self, id: usize) -> Result<&[f32]> {
        let start = id * self.record_len;
        let end = start + self.record_len;
        if end > self.values.len() {
            return Err(VecscanError::precondition(format!(
                "id {} out of range (ntotal = {})",
                id,
                self.ntotal()
            )));
        }
        if self.values.len() % self.record_len != 0 {
            return Err(VecscanError::invariant(
                "storage length is not a multiple of the record length",
            ));
        }
        Ok(&self.values[start..end])
    }

    /// Iterate over `(id, record)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[f32])> {
        self.values.chunks_exact(self.record_len).enumerate()
    }
}
