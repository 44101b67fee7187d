//! Error types for persistent storage operations.
//!
//! Integrity failures are not errors here: a register whose copies both fail the
//! complement check loads a default and reports [`CopySource::Defaulted`](crate::CopySource).
//! The variants below cover requests that can never succeed and device faults.

use thiserror::Error;

/// Errors raised by the persistent store, registers and logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NvError {
    /// An access fell outside the backing store.
    #[error("Address range {address:#07x}+{len} outside store of {capacity} bytes")]
    AddressOutOfRange {
        /// First byte of the access.
        address: u32,
        /// Number of bytes accessed.
        len: usize,
        /// Size of the backing store.
        capacity: usize,
    },

    /// A record does not fit its log slot.
    #[error("Record of {len} bytes exceeds slot size {record_size}")]
    RecordTooLarge {
        /// Length of the offered record.
        len: usize,
        /// Slot size of the log.
        record_size: u16,
    },

    /// A slot index beyond the log capacity.
    #[error("Index {index} outside log of capacity {capacity}")]
    IndexOutOfRange {
        /// Requested index.
        index: u16,
        /// Log capacity.
        capacity: u16,
    },

    /// A contiguous read that would cross the end of the circular buffer.
    #[error("Window {start}+{count} crosses the wrap boundary of capacity {capacity}")]
    WrapBoundary {
        /// First index of the window.
        start: u16,
        /// Number of records requested.
        count: u16,
        /// Log capacity.
        capacity: u16,
    },

    /// Log geometry rejected at construction.
    #[error("Invalid log geometry: {0}")]
    InvalidGeometry(String),

    /// The underlying device reported a failure.
    #[error("Storage device error: {0}")]
    Device(String),
}

impl NvError {
    /// Create an out-of-range error.
    #[must_use]
    pub fn address_out_of_range(address: u32, len: usize, capacity: usize) -> Self {
        Self::AddressOutOfRange {
            address,
            len,
            capacity,
        }
    }

    /// Create an invalid geometry error.
    #[must_use]
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a device error.
    #[must_use]
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Only device faults are transient; every other variant describes a request
    /// that is wrong for the configured layout.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}

/// Result type for persistent storage operations.
pub type NvResult<T> = Result<T, NvError>;
