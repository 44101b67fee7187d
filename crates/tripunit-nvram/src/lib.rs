//! Persistent storage primitives for the trip unit event engine.
//!
//! Everything the event logs keep across power cycles lives in a small,
//! byte-addressed, battery-backed memory. This crate provides the three layers
//! built on top of it:
//!
//! - **PersistentStore**: the device seam, with an in-memory [`MemoryStore`] that
//!   supports fault injection
//! - **PersistentRegister**: a 32-bit value stored with its complement at two
//!   independent addresses
//! - **IndexedLog**: a fixed-capacity circular log of equally sized records whose
//!   cursor lives in a register
//!
//! plus [`find_eid`], the rollover-aware binary search used by every read path.
//!
//! # Integrity
//!
//! ```text
//!   load(primary) ──ok──► value (Primary)
//!        │ complement mismatch
//!        ▼
//!   load(mirror) ───ok──► value (Mirror)
//!        │ complement mismatch
//!        ▼
//!   default value (Defaulted)
//! ```
//!
//! Integrity failures never surface as `Err`. They come back as
//! [`CopySource::Defaulted`] so the caller can raise a sticky fault and keep
//! running. `Err` is reserved for out-of-range requests and device faults.
//!
//! # RT Safety
//!
//! Appends, loads and lookups perform a bounded number of store accesses and do
//! not allocate. [`MemoryStore`] allocates once at construction.
//!
//! # Example
//!
//! ```rust
//! use tripunit_nvram::{IndexedLog, LogCursor, LogGeometry, MemoryStore, PersistentRegister, find_eid};
//!
//! # fn main() -> Result<(), tripunit_nvram::NvError> {
//! let mut store = MemoryStore::new(256);
//! let register = PersistentRegister::new(0, 8, LogCursor::EMPTY)?;
//! let geometry = LogGeometry::new(16, 8, 4)?;
//! let mut log = IndexedLog::open(geometry, register, &store)?;
//!
//! for eid in 1u32..=6 {
//!     let mut record = [0u8; 8];
//!     record[..4].copy_from_slice(&eid.to_le_bytes());
//!     log.append(&mut store, &record)?;
//! }
//!
//! assert!(log.is_rolled_over());
//! assert_eq!(log.earliest_index(), 2);
//! assert_eq!(find_eid(&log, &store, 5)?, Some(0));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod codec;
mod error;
mod log;
mod lookup;
mod register;
mod store;

pub mod prelude;

pub use codec::{RecordReader, RecordWriter};
pub use error::{NvError, NvResult};
pub use log::{EID_LEN, IndexedLog, LogCursor, LogGeometry};
pub use lookup::find_eid;
pub use register::{
    Complemented, CopySource, PersistentRegister, REGISTER_COPY_LEN, RegisterLoad,
};
pub use store::{MemoryStore, PersistentStore};
