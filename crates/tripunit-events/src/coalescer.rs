//! Extended-capture coalescing.
//!
//! Five causes can request an extended capture. The first request of a cause
//! admits a composite event (summary, snapshot, waveform and RMS windows); any
//! further request of the same cause while its acknowledge bit is set admits a
//! summary-only event. A single session collects RMS windows at a time.
//!
//! ```text
//!          request           waveform running        200 ms windows full
//!  Idle ────────────► Start ──────────────────► InProgress ─────────────► End ──► Idle
//!                       │ trip/alarm running          │ timeout                   ▲
//!                       ▼                             ▼                           │
//!                      Idle                         Cancel ──────────────────────┘
//! ```
//!
//! The RMS region is written incrementally: the session EID is invalidated when
//! collection starts, each sample and its window count as it arrives, and the
//! EID last, so a reader never pairs a stale EID with fresh samples.

use tripunit_nvram::{PersistentStore, RecordWriter};

use crate::codes::EventCode;
use crate::config::EngineConfig;
use crate::disturbance::DisturbanceParameter;
use crate::eid::{Eid, raw_eid};
use crate::error::EventResult;
use crate::layout::RmsRegion;
use crate::ports::{MeteringSnapshot, RmsWindow};
use crate::records::{Record, RmsSample};
use crate::time::Timestamp;
use crate::waveform::{CaptureKind, CaptureSessions};

/// A cause that can start an extended capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtendedCause {
    /// External capture command.
    GooseCapture = 0,
    /// Overvoltage.
    Overvoltage = 1,
    /// Undervoltage.
    Undervoltage = 2,
    /// High load 1.
    HighLoad1 = 3,
    /// High load 2.
    HighLoad2 = 4,
}

impl ExtendedCause {
    /// All causes, in request-bit order.
    pub const ALL: [Self; 5] = [
        Self::GooseCapture,
        Self::Overvoltage,
        Self::Undervoltage,
        Self::HighLoad1,
        Self::HighLoad2,
    ];

    /// Bit in the request and acknowledge masks.
    #[must_use]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Event admitted for the first request of a session.
    #[must_use]
    pub fn composite_code(self) -> EventCode {
        EventCode::new(
            EventCode::EXTCAP_GOOSE_CAPTURE
                .raw()
                .saturating_add(self as u8),
        )
    }

    /// Event admitted for a repeated request.
    #[must_use]
    pub fn summary_only_code(self) -> EventCode {
        EventCode::new(
            self.composite_code()
                .raw()
                .saturating_add(EventCode::EXTCAP_SUMMARY_ONLY_OFFSET),
        )
    }

    /// Disturbance track whose originating EID is set by this cause.
    #[must_use]
    pub fn linked_parameter(self) -> DisturbanceParameter {
        match self {
            Self::GooseCapture => DisturbanceParameter::GooseCapture,
            Self::Overvoltage => DisturbanceParameter::Overvoltage,
            Self::Undervoltage => DisturbanceParameter::Undervoltage,
            Self::HighLoad1 => DisturbanceParameter::HighLoad1,
            Self::HighLoad2 => DisturbanceParameter::HighLoad2,
        }
    }

    /// Cause name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GooseCapture => "GooseCapture",
            Self::Overvoltage => "Overvoltage",
            Self::Undervoltage => "Undervoltage",
            Self::HighLoad1 => "HighLoad1",
            Self::HighLoad2 => "HighLoad2",
        }
    }
}

impl core::fmt::Display for ExtendedCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum CoalescerState {
    /// No session.
    #[default]
    Idle,
    /// Waiting for the paired waveform capture to start.
    Start,
    /// Collecting RMS windows.
    InProgress,
    /// All windows collected.
    End,
    /// Timed out.
    Cancel,
}

/// How an admission request should be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Admission {
    pub(crate) cause: ExtendedCause,
    pub(crate) code: EventCode,
    pub(crate) composite: bool,
}

/// What one [`ExtendedCaptureCoalescer::step`] did, for the caller to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoalescerOutcome {
    Running,
    Abandoned(ExtendedCause),
    Completed(ExtendedCause, Option<Eid>),
    TimedOut(ExtendedCause),
}

/// The global extended-capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedCaptureCoalescer {
    state: CoalescerState,
    cause: Option<ExtendedCause>,
    acks: u8,
    session_eid: Option<Eid>,
    started_at: Timestamp,
    one_cycle_count: u16,
    two_hundred_count: u16,
    rms: RmsRegion,
    timeout_ms: u64,
}

impl ExtendedCaptureCoalescer {
    pub(crate) fn new(rms: RmsRegion, config: &EngineConfig) -> Self {
        Self {
            state: CoalescerState::Idle,
            cause: None,
            acks: 0,
            session_eid: None,
            started_at: Timestamp::ZERO,
            one_cycle_count: 0,
            two_hundred_count: 0,
            rms,
            timeout_ms: u64::from(config.extended_capture_timeout_ms),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CoalescerState {
        self.state
    }

    /// Cause of the running session.
    #[must_use]
    pub fn cause(&self) -> Option<ExtendedCause> {
        self.cause
    }

    /// Causes acknowledged since the last session ended.
    #[must_use]
    pub fn acknowledged(&self) -> u8 {
        self.acks
    }

    /// EID of the composite event that opened the session.
    #[must_use]
    pub fn session_eid(&self) -> Option<Eid> {
        self.session_eid
    }

    /// Samples collected so far in `window`.
    #[must_use]
    pub fn samples(&self, window: RmsWindow) -> u16 {
        match window {
            RmsWindow::OneCycle => self.one_cycle_count,
            RmsWindow::TwoHundredMs => self.two_hundred_count,
        }
    }

    /// Code to admit for a request of `cause`.
    pub(crate) fn admission(&self, cause: ExtendedCause) -> Admission {
        let composite = self.acks & cause.bit() == 0;
        let code = if composite {
            cause.composite_code()
        } else {
            cause.summary_only_code()
        };
        Admission {
            cause,
            code,
            composite,
        }
    }

    /// Mark `cause` acknowledged; an idle coalescer opens a session for it.
    pub(crate) fn acknowledge(&mut self, cause: ExtendedCause, now: Timestamp) {
        self.acks |= cause.bit();
        if self.state == CoalescerState::Idle {
            self.cause = Some(cause);
            self.session_eid = None;
            self.started_at = now;
            self.state = CoalescerState::Start;
            tracing::debug!(%cause, "extended capture session opened");
        }
    }

    /// Record the EID of a dispatched extended-capture event if it opened this session.
    pub(crate) fn note_dispatched(&mut self, code: EventCode, eid: Eid) {
        if self.cause.map(ExtendedCause::composite_code) == Some(code) {
            self.session_eid = Some(eid);
        }
    }

    /// Run one RMS window.
    ///
    /// # Errors
    ///
    /// Propagates store errors; the session state is left where it was.
    pub(crate) fn step<S, M>(
        &mut self,
        window: RmsWindow,
        sessions: &CaptureSessions,
        store: &mut S,
        metering: &mut M,
        now: Timestamp,
    ) -> EventResult<CoalescerOutcome>
    where
        S: PersistentStore + ?Sized,
        M: MeteringSnapshot + ?Sized,
    {
        let Some(cause) = self.cause else {
            return Ok(CoalescerOutcome::Running);
        };
        if matches!(self.state, CoalescerState::Start | CoalescerState::InProgress)
            && now.millis_since(self.started_at) > self.timeout_ms
        {
            self.state = CoalescerState::Cancel;
        }

        if self.state == CoalescerState::Start {
            let trip = sessions.get(CaptureKind::Trip);
            let alarm = sessions.get(CaptureKind::Alarm);
            if trip.is_in_progress() || alarm.is_in_progress() {
                self.close();
                return Ok(CoalescerOutcome::Abandoned(cause));
            }
            if !sessions.get(CaptureKind::Extended).is_in_progress() {
                return Ok(CoalescerOutcome::Running);
            }
            self.begin_collection(store)?;
        }

        match self.state {
            CoalescerState::InProgress => {
                self.collect(window, store, metering, now)?;
                Ok(CoalescerOutcome::Running)
            }
            CoalescerState::End => {
                store.write(self.rms.eid_address, &raw_eid(self.session_eid).to_le_bytes())?;
                let eid = self.session_eid;
                tracing::info!(
                    %cause,
                    eid = raw_eid(eid),
                    one_cycle = self.one_cycle_count,
                    two_hundred_ms = self.two_hundred_count,
                    "extended capture complete"
                );
                self.close();
                Ok(CoalescerOutcome::Completed(cause, eid))
            }
            CoalescerState::Cancel => {
                store.write(self.rms.eid_address, &0u32.to_le_bytes())?;
                tracing::warn!(
                    %cause,
                    elapsed_ms = now.millis_since(self.started_at),
                    "extended capture timed out"
                );
                self.close();
                Ok(CoalescerOutcome::TimedOut(cause))
            }
            CoalescerState::Idle | CoalescerState::Start => Ok(CoalescerOutcome::Running),
        }
    }

    /// Drop the session and every acknowledge bit.
    pub(crate) fn reset(&mut self) {
        self.close();
    }

    fn begin_collection<S: PersistentStore + ?Sized>(&mut self, store: &mut S) -> EventResult<()> {
        store.write(self.rms.eid_address, &0u32.to_le_bytes())?;
        store.write(self.rms.one_cycle_count_address, &0u16.to_le_bytes())?;
        store.write(self.rms.two_hundred_count_address, &0u16.to_le_bytes())?;
        self.one_cycle_count = 0;
        self.two_hundred_count = 0;
        self.state = CoalescerState::InProgress;
        Ok(())
    }

    fn collect<S, M>(
        &mut self,
        window: RmsWindow,
        store: &mut S,
        metering: &mut M,
        now: Timestamp,
    ) -> EventResult<()>
    where
        S: PersistentStore + ?Sized,
        M: MeteringSnapshot + ?Sized,
    {
        let (count, capacity, base, time_address, count_address) = match window {
            RmsWindow::OneCycle => (
                self.one_cycle_count,
                self.rms.one_cycle_capacity,
                self.rms.one_cycle_base,
                self.rms.one_cycle_time_address,
                self.rms.one_cycle_count_address,
            ),
            RmsWindow::TwoHundredMs => (
                self.two_hundred_count,
                self.rms.two_hundred_capacity,
                self.rms.two_hundred_base,
                self.rms.two_hundred_time_address,
                self.rms.two_hundred_count_address,
            ),
        };
        if count >= capacity {
            return Ok(());
        }
        if count == 0 {
            let mut stamp = [0u8; 8];
            RecordWriter::new(&mut stamp)
                .put_u32(now.seconds)?
                .put_u32(now.nanos)?;
            store.write(time_address, &stamp)?;
        }

        let sample = metering.rms_sample(window);
        let mut buf = [0u8; RmsSample::LEN as usize];
        sample.write_to(&mut buf)?;
        let offset = u32::from(count).saturating_mul(u32::from(RmsSample::LEN));
        store.write(base.saturating_add(offset), &buf)?;

        let count = count.saturating_add(1);
        store.write(count_address, &count.to_le_bytes())?;
        match window {
            RmsWindow::OneCycle => self.one_cycle_count = count,
            RmsWindow::TwoHundredMs => {
                self.two_hundred_count = count;
                if count >= capacity {
                    self.state = CoalescerState::End;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.state = CoalescerState::Idle;
        self.cause = None;
        self.acks = 0;
        self.session_eid = None;
        self.started_at = Timestamp::ZERO;
        self.one_cycle_count = 0;
        self.two_hundred_count = 0;
    }
}
