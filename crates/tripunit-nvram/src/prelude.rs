//! Prelude for convenient imports.
//!
//! ```rust
//! use tripunit_nvram::prelude::*;
//! ```

pub use crate::{
    CopySource, IndexedLog, LogCursor, LogGeometry, MemoryStore, NvError, NvResult,
    PersistentRegister, PersistentStore, RecordReader, RecordWriter, RegisterLoad, find_eid,
};
