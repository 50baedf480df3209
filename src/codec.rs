//! Flat codec: bit-exact conversion between vectors and fixed-size byte records.
//!
//! The flat format applies no transform: each record is the little-endian
//! IEEE-754 byte image of `d` floats, so encode and decode are mutual
//! inverses bit for bit.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, VecscanError};

/// Codec for uncompressed `d`-dimensional vector records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatCodec {
    d: usize,
}

impl FlatCodec {
    /// Create a codec for `d`-dimensional vectors.
    pub fn new(d: usize) -> Result<Self> {
        if d == 0 {
            return Err(VecscanError::configuration(
                "dimension must be a positive integer",
            ));
        }
        Ok(Self { d })
    }

    /// Vector dimension handled by this codec.
    pub fn dimension(&self) -> usize {
        self.d
    }

    /// Encoded size of one vector, in bytes.
    pub fn code_size(&self) -> usize {
        self.d * std::mem::size_of::<f32>()
    }

    /// Encode `n` vectors into `n * code_size` bytes.
    pub fn encode(&self, vectors: &[f32], bytes: &mut [u8]) -> Result<()> {
        let n = self.batch_len(vectors.len())?;
        if bytes.len() != n * self.code_size() {
            return Err(VecscanError::precondition(format!(
                "output buffer holds {} bytes, expected {}",
                bytes.len(),
                n * self.code_size()
            )));
        }
        LittleEndian::write_f32_into(vectors, bytes);
        Ok(())
    }

    /// Decode `n * code_size` bytes into `n` vectors.
    pub fn decode(&self, bytes: &[u8], vectors: &mut [f32]) -> Result<()> {
        if bytes.len() % self.code_size() != 0 {
            return Err(VecscanError::precondition(format!(
                "byte length {} is not a multiple of code_size {}",
                bytes.len(),
                self.code_size()
            )));
        }
        let n = bytes.len() / self.code_size();
        if vectors.len() != n * self.d {
            return Err(VecscanError::precondition(format!(
                "output buffer holds {} floats, expected {}",
                vectors.len(),
                n * self.d
            )));
        }
        LittleEndian::read_f32_into(bytes, vectors);
        Ok(())
    }

    /// Number of whole vectors in a float batch of this length.
    pub fn batch_len(&self, float_len: usize) -> Result<usize> {
        if float_len % self.d != 0 {
            return Err(VecscanError::precondition(format!(
                "batch length {} is not a multiple of dimension {}",
                float_len, self.d
            )));
        }
        Ok(float_len / self.d)
    }
}
