//! Byte-addressed persistent store abstraction.
//!
//! On the device this is battery-backed FRAM behind an SPI driver. The engine only
//! needs bounded reads, writes and zero-fills, so that is all the trait exposes.

use crate::error::{NvError, NvResult};

/// Byte-addressed persistent memory.
///
/// Implementations must complete a `write` before returning: callers rely on the
/// data being durable once the call succeeds.
pub trait PersistentStore {
    /// Fill `buf` with the bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the store or the device fails.
    fn read(&self, address: u32, buf: &mut [u8]) -> NvResult<()>;

    /// Write `data` starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the store or the device fails.
    fn write(&mut self, address: u32, data: &[u8]) -> NvResult<()>;

    /// Zero `len` bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the store or the device fails.
    fn clean(&mut self, address: u32, len: usize) -> NvResult<()>;

    /// Size of the store in bytes.
    fn len(&self) -> usize;

    /// Whether the store has no capacity at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`PersistentStore`] for tests and host-side tooling.
///
/// Besides plain storage it supports fault injection: bytes can be corrupted in
/// place and the next N writes can be made to fail, which is how power-loss and
/// bit-rot scenarios are exercised.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Vec<u8>,
    writes: u64,
    fail_writes: u32,
}

impl MemoryStore {
    /// Create a zero-filled store of `len` bytes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
            writes: 0,
            fail_writes: 0,
        }
    }

    /// Raw contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of successful writes since creation.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Flip every bit in `len` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the store.
    pub fn corrupt(&mut self, address: u32, len: usize) -> NvResult<()> {
        let range = self.range(address, len)?;
        for byte in self.bytes.get_mut(range).into_iter().flatten() {
            *byte = !*byte;
        }
        Ok(())
    }

    /// Make the next `count` writes fail with a device error.
    pub fn fail_next_writes(&mut self, count: u32) {
        self.fail_writes = count;
    }

    fn range(&self, address: u32, len: usize) -> NvResult<core::ops::Range<usize>> {
        let start = address as usize;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| NvError::address_out_of_range(address, len, self.bytes.len()))?;
        Ok(start..end)
    }
}

impl PersistentStore for MemoryStore {
    fn read(&self, address: u32, buf: &mut [u8]) -> NvResult<()> {
        let range = self.range(address, buf.len())?;
        let src = self
            .bytes
            .get(range)
            .ok_or_else(|| NvError::address_out_of_range(address, buf.len(), self.bytes.len()))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> NvResult<()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(NvError::device("injected write failure"));
        }
        let range = self.range(address, data.len())?;
        let capacity = self.bytes.len();
        let dst = self
            .bytes
            .get_mut(range)
            .ok_or_else(|| NvError::address_out_of_range(address, data.len(), capacity))?;
        dst.copy_from_slice(data);
        self.writes = self.writes.wrapping_add(1);
        Ok(())
    }

    fn clean(&mut self, address: u32, len: usize) -> NvResult<()> {
        let range = self.range(address, len)?;
        self.bytes
            .get_mut(range)
            .into_iter()
            .flatten()
            .for_each(|b| *b = 0);
        Ok(())
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl<S: PersistentStore + ?Sized> PersistentStore for &mut S {
    fn read(&self, address: u32, buf: &mut [u8]) -> NvResult<()> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> NvResult<()> {
        (**self).write(address, data)
    }

    fn clean(&mut self, address: u32, len: usize) -> NvResult<()> {
        (**self).clean(address, len)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}
