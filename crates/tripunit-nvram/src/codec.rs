//! Little-endian field codec for fixed-layout records.
//!
//! Records are assembled into a caller-provided slot buffer and read back field by
//! field. Every accessor is bounds-checked and returns [`NvError::RecordTooLarge`]
//! instead of panicking when a layout does not fit.

use crate::error::{NvError, NvResult};

/// Sequential writer over a record buffer.
#[derive(Debug)]
pub struct RecordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> RecordWriter<'a> {
    /// Start writing at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Append raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the bytes do not fit.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> NvResult<&mut Self> {
        let end = self.pos.saturating_add(bytes.len());
        let capacity = self.buf.len();
        let dst = self
            .buf
            .get_mut(self.pos..end)
            .ok_or_else(|| too_large(end, capacity))?;
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(self)
    }

    /// Append a `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the field does not fit.
    pub fn put_u16(&mut self, value: u16) -> NvResult<&mut Self> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Append a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the field does not fit.
    pub fn put_u32(&mut self, value: u32) -> NvResult<&mut Self> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Append an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the field does not fit.
    pub fn put_f32(&mut self, value: f32) -> NvResult<&mut Self> {
        self.put_bytes(&value.to_le_bytes())
    }
}

/// Sequential reader over a record buffer.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    /// Start reading at the beginning of `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Take the next `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the buffer is exhausted.
    pub fn take<const N: usize>(&mut self) -> NvResult<[u8; N]> {
        let end = self.pos.saturating_add(N);
        let src = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| too_large(end, self.buf.len()))?;
        let mut out = [0u8; N];
        out.copy_from_slice(src);
        self.pos = end;
        Ok(out)
    }

    /// Read a `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the buffer is exhausted.
    pub fn u16(&mut self) -> NvResult<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    /// Read a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the buffer is exhausted.
    pub fn u32(&mut self) -> NvResult<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Read an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] if the buffer is exhausted.
    pub fn f32(&mut self) -> NvResult<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }
}

fn too_large(needed: usize, available: usize) -> NvError {
    NvError::RecordTooLarge {
        len: needed,
        record_size: u16::try_from(available).unwrap_or(u16::MAX),
    }
}
