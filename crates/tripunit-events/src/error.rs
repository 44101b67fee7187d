//! Error types for the event engine.
//!
//! Only store I/O failures and configuration mistakes are errors. Integrity
//! failures, queue overflow, lookup misses and capture contention are degraded
//! outcomes reported through return values, counters and fault flags.

use thiserror::Error;
use tripunit_nvram::NvError;

use crate::layout::LogKind;

/// Errors raised by the event engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The persistent store rejected an access.
    #[error("Storage error: {0}")]
    Storage(#[from] NvError),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two regions of the memory map share bytes.
    #[error("Memory map regions {first} and {second} overlap")]
    LayoutOverlap {
        /// First overlapping region.
        first: &'static str,
        /// Second overlapping region.
        second: &'static str,
    },

    /// The store cannot hold the planned memory map.
    #[error("Memory map needs {required} bytes but the store has {available}")]
    StoreTooSmall {
        /// Bytes the memory map needs.
        required: u32,
        /// Bytes the store provides.
        available: usize,
    },

    /// The operation does not apply to this log.
    #[error("Operation not supported for the {0} log")]
    UnsupportedLog(LogKind),

    /// A read request with out-of-range parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl EventError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Whether the engine can keep running after this error.
    ///
    /// Device faults are transient; the next tick retries. Configuration and
    /// layout errors mean the engine was never built.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            Self::UnsupportedLog(_) | Self::InvalidRequest(_) => true,
            Self::InvalidConfiguration(_)
            | Self::LayoutOverlap { .. }
            | Self::StoreTooSmall { .. } => false,
        }
    }
}

/// Result type for event engine operations.
pub type EventResult<T> = Result<T, EventError>;
