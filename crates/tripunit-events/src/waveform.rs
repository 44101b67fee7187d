//! Waveform capture sessions and the header arbiter.
//!
//! The sampler fills waveform buffers on its own schedule and the bulk-store
//! arbiter writes them out. This module only tracks who asked for a capture,
//! whether one is running, and which EID its header should carry, and appends
//! the header once the bulk write is acknowledged.
//!
//! ```text
//!  Idle ──(requested && in progress)──► Waiting{kind} ──ack──► header appended ──► Idle
//!                                            │
//!                                            ├─ alarm/extended stopped ──► header appended
//!                                            └─ timeout ──► abandoned, no header
//! ```
//!
//! Only one capture is written at a time, picked in [`CaptureKind::ALL`] order.
//! The timeout runs from the bulk request, so a capture queued behind another
//! one's write gets its full window.

use crate::eid::{Eid, raw_eid};
use crate::handshake::{BulkOp, BulkRequests, Handshake};
use crate::layout::LogKind;
use crate::records::WaveformHeader;
use crate::time::Timestamp;

/// A waveform capture kind, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    /// Captured on a trip.
    Trip,
    /// Captured on an alarm.
    Alarm,
    /// Captured for an extended-capture session.
    Extended,
}

impl CaptureKind {
    /// All kinds in priority order.
    pub const ALL: [Self; 3] = [Self::Trip, Self::Alarm, Self::Extended];

    /// Bulk operation that stores this kind's waveform.
    #[must_use]
    pub fn bulk_op(self) -> BulkOp {
        match self {
            Self::Trip => BulkOp::WriteTripWaveform,
            Self::Alarm => BulkOp::WriteAlarmWaveform,
            Self::Extended => BulkOp::WriteExtendedWaveform,
        }
    }

    /// Header log for this kind.
    #[must_use]
    pub fn log_kind(self) -> LogKind {
        match self {
            Self::Trip => LogKind::TripWaveform,
            Self::Alarm => LogKind::AlarmWaveform,
            Self::Extended => LogKind::ExtendedWaveform,
        }
    }

    /// Kind name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trip => "trip",
            Self::Alarm => "alarm",
            Self::Extended => "extended",
        }
    }
}

impl core::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one capture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureSession {
    requested: bool,
    in_progress: bool,
    eid: Option<Eid>,
    num_samples: u16,
    started_at: Timestamp,
}

impl CaptureSession {
    /// Whether a capture has been asked for and not yet picked up.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Whether the sampler is capturing or the capture awaits its write.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    /// EID of the event the header will carry.
    #[must_use]
    pub fn eid(&self) -> Option<Eid> {
        self.eid
    }

    /// Samples captured so far.
    #[must_use]
    pub fn num_samples(&self) -> u16 {
        self.num_samples
    }

    /// When the sampler started the capture.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub(crate) fn request(&mut self) {
        self.requested = true;
    }

    pub(crate) fn withdraw(&mut self) {
        self.requested = false;
    }

    pub(crate) fn set_eid(&mut self, eid: Eid) {
        self.eid = Some(eid);
    }

    /// Returns `false` if a capture of this kind is already running.
    pub(crate) fn start(&mut self, now: Timestamp) -> bool {
        if self.in_progress {
            return false;
        }
        self.in_progress = true;
        self.num_samples = 0;
        self.started_at = now;
        true
    }

    pub(crate) fn add_samples(&mut self, samples: u16) {
        if self.in_progress {
            self.num_samples = self.num_samples.saturating_add(samples);
        }
    }

    pub(crate) fn stop(&mut self) {
        self.in_progress = false;
    }

    fn header(&self) -> WaveformHeader {
        WaveformHeader {
            num_samples: self.num_samples,
            eid: raw_eid(self.eid),
            timestamp: self.started_at,
        }
    }
}

/// The three sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSessions {
    trip: CaptureSession,
    alarm: CaptureSession,
    extended: CaptureSession,
}

impl CaptureSessions {
    /// Session of `kind`.
    #[must_use]
    pub fn get(&self, kind: CaptureKind) -> &CaptureSession {
        match kind {
            CaptureKind::Trip => &self.trip,
            CaptureKind::Alarm => &self.alarm,
            CaptureKind::Extended => &self.extended,
        }
    }

    pub(crate) fn get_mut(&mut self, kind: CaptureKind) -> &mut CaptureSession {
        match kind {
            CaptureKind::Trip => &mut self.trip,
            CaptureKind::Alarm => &mut self.alarm,
            CaptureKind::Extended => &mut self.extended,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Arbiter phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArbiterPhase {
    /// No capture being written.
    #[default]
    Idle,
    /// Waiting for the bulk write of `kind`.
    Waiting(CaptureKind),
}

/// What one poll of the arbiter produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArbiterOutcome {
    Idle,
    Waiting,
    Finished(CaptureKind, WaveformHeader),
    TimedOut(CaptureKind),
}

/// Serializes waveform header writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaveformArbiter {
    phase: ArbiterPhase,
    requested_at: Timestamp,
}

impl WaveformArbiter {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ArbiterPhase {
        self.phase
    }

    /// Advance by one tick.
    ///
    /// A trip capture is only finished by its acknowledgement. Alarm and
    /// extended captures also finish when the sampler stops them early. Any
    /// capture not acknowledged within `timeout_ms` of its bulk request is
    /// abandoned.
    pub(crate) fn poll(
        &mut self,
        sessions: &mut CaptureSessions,
        bulk: &mut BulkRequests,
        now: Timestamp,
        timeout_ms: u32,
    ) -> ArbiterOutcome {
        if self.phase == ArbiterPhase::Idle {
            let picked = CaptureKind::ALL.into_iter().find(|kind| {
                let session = sessions.get(*kind);
                session.requested && session.in_progress
            });
            let Some(kind) = picked else {
                return ArbiterOutcome::Idle;
            };
            sessions.get_mut(kind).withdraw();
            bulk.request(kind.bulk_op());
            self.phase = ArbiterPhase::Waiting(kind);
            self.requested_at = now;
            tracing::debug!(%kind, "waveform write requested");
        }

        let ArbiterPhase::Waiting(kind) = self.phase else {
            return ArbiterOutcome::Idle;
        };
        let op = kind.bulk_op();
        let session = sessions.get_mut(kind);
        let acknowledged = bulk.state(op) == Handshake::Acknowledged;
        let stopped = kind != CaptureKind::Trip && !session.in_progress;

        if acknowledged || stopped {
            bulk.reset(op);
            let header = session.header();
            session.stop();
            self.phase = ArbiterPhase::Idle;
            return ArbiterOutcome::Finished(kind, header);
        }

        let elapsed = now.millis_since(self.requested_at);
        if elapsed > u64::from(timeout_ms) {
            bulk.reset(op);
            session.stop();
            self.phase = ArbiterPhase::Idle;
            tracing::warn!(
                %kind,
                elapsed_ms = elapsed,
                "waveform write not acknowledged, abandoning capture"
            );
            return ArbiterOutcome::TimedOut(kind);
        }
        ArbiterOutcome::Waiting
    }

    pub(crate) fn reset(&mut self) {
        self.phase = ArbiterPhase::Idle;
    }
}
