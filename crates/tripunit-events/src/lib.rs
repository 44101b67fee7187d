//! Event logging and disturbance capture for a circuit-breaker trip unit.
//!
//! Protection, metering and maintenance code report events by code. The
//! engine stamps each with a monotonically increasing event identifier (EID),
//! writes it to a summary log and, depending on its code range, to a snapshot
//! log, the disturbance log, the energy log or a waveform header log. Every log
//! is a fixed-capacity circular log in battery-backed memory
//! ([`tripunit_nvram`]); cursors and the master EID survive power loss through
//! complement-checked registers.
//!
//! # Architecture
//!
//! ```text
//!  interrupt ──stage()──► InterruptProducer ─┐
//!                                            ▼
//!  foreground ──admit()──────────────► EidSequencer (pending queue)
//!                                            │
//!   run_one_cycle ─► DisturbanceAggregator ──┤ exit codes
//!                 └► ExtendedCaptureCoalescer┤ extended codes
//!                                            ▼
//!                           run_event_manager (dispatch)
//!                   ┌──────────┬──────────┬─┴────────┬──────────────┐
//!                   ▼          ▼          ▼          ▼              ▼
//!               summary    snapshot  disturbance  energy log ◄──► BulkRequests
//!                                                                   ▲
//!   run_waveform_arbiter ─► WaveformArbiter ─► waveform headers ─────┘
//! ```
//!
//! # RT Safety
//!
//! Admission from interrupt context goes through a bounded lock-free queue and
//! never allocates. Tick methods do bounded work and never block; waits on the
//! bulk store are explicit handshake states polled on the next call. Read
//! methods allocate their result vectors and are meant for the communications
//! task, not the tick path.
//!
//! # Example
//!
//! ```rust
//! use tripunit_events::prelude::*;
//! # struct Clock;
//! # impl RealTimeClock for Clock { fn now(&self) -> Timestamp { Timestamp::new(100, 0) } }
//! # struct Metering;
//! # impl MeteringSnapshot for Metering {
//! #     fn capture(&mut self, _: EventCode) -> SnapshotBlock { SnapshotBlock::default() }
//! #     fn rms_sample(&mut self, _: RmsWindow) -> RmsSample { RmsSample::default() }
//! #     fn disturbance_value(&self, _: DisturbanceParameter) -> f32 { 0.0 }
//! #     fn energy_entry(&mut self) -> EnergyPayload { EnergyPayload::default() }
//! # }
//! # struct Protection;
//! # impl ProtectionStatus for Protection {
//! #     fn thermal_bucket_percent(&self) -> f32 { 0.0 }
//! #     fn trip_bucket_tenths(&self, _: DisturbanceParameter) -> u16 { 0 }
//! #     fn temperature_trip_threshold(&self) -> f32 { 0.0 }
//! # }
//!
//! # fn main() -> Result<(), EventError> {
//! let config = EngineConfig::default();
//! let store = MemoryStore::new(256 * 1024);
//! let mut engine = EventEngine::open(config, store, Clock, Metering, Protection)?;
//! engine.clear_all()?;
//!
//! let eid = engine.admit(EventCode::TRIP_LONG_DELAY);
//! assert_eq!(eid, Eid::new(1));
//! engine.run_event_manager()?;
//!
//! let info = engine.log_info(LogKind::Trip)?;
//! assert_eq!(info.count, 1);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod coalescer;
mod codes;
mod config;
mod dispatch;
mod disturbance;
mod eid;
mod energy;
mod engine;
mod error;
mod faults;
mod handshake;
mod layout;
mod logs;
mod ports;
mod read;
mod records;
mod sequencer;
mod signals;
mod stats;
mod time;
mod waveform;

pub mod prelude;

pub use coalescer::{CoalescerState, ExtendedCaptureCoalescer, ExtendedCause};
pub use codes::{EventCategory, EventCode};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use dispatch::{DispatchState, EnergyPhase};
pub use disturbance::{
    DISTURBANCE_PARAMETERS, DisturbanceAggregator, DisturbanceInputs, DisturbanceParameter,
    DisturbanceTrack, EpisodeStats, PercentSource, ProcessingMode, TrackState, UNSIGNED_MIN_SEED,
};
pub use eid::{Eid, raw_eid};
pub use energy::{EnergyCursor, EnergyGeometry};
pub use engine::EventEngine;
pub use error::{EventError, EventResult};
pub use faults::IntegrityFaults;
pub use handshake::{BulkOp, BulkRequests, ENERGY_WRITE_LEN, EnergyWrite, Handshake};
pub use layout::{LogKind, MemoryMap, RegisterSlot, RmsRegion};
pub use ports::{MeteringSnapshot, ProtectionStatus, RealTimeClock, RmsWindow};
pub use read::{
    ExtendedCaptureInfo, LogInfo, MAX_DISTURBANCES, MAX_RANGE, MAX_SNAPSHOT_HEADERS, RangeStart,
    RecordPage, WaveformEids,
};
pub use records::{
    DisturbanceRecord, ENERGY_PAYLOAD_LEN, EnergyEntry, EnergyPayload, RMS_CHANNELS, Record,
    RmsSample, SNAPSHOT_BLOCK_LEN, SnapshotBlock, SnapshotRecord, SummaryRecord, WaveformHeader,
};
pub use sequencer::{
    EidSequencer, InterruptProducer, PENDING_CAPACITY, PendingEvent, STAGING_CAPACITY, StagedEvent,
};
pub use signals::TriggerSignals;
pub use stats::{CounterSnapshot, EventCounters};
pub use time::Timestamp;
pub use waveform::{ArbiterPhase, CaptureKind, CaptureSession, CaptureSessions, WaveformArbiter};

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests unwrap fixture setup")]
mod tests;
