//! Prelude for convenient imports.
//!
//! ```rust
//! use tripunit_events::prelude::*;
//! ```

pub use crate::{
    BulkOp, BulkRequests, CaptureKind, DispatchState, DisturbanceParameter, Eid, EnergyPayload,
    EngineConfig, EventCode, EventEngine, EventError, EventResult, ExtendedCause, Handshake,
    LogKind, MeteringSnapshot, ProtectionStatus, RangeStart, RealTimeClock, Record, RmsSample,
    RmsWindow, SnapshotBlock, Timestamp, TriggerSignals,
};
pub use tripunit_nvram::{MemoryStore, PersistentStore};
