//! Engine counters.
//!
//! Every degraded outcome (dropped admission, abandoned capture, timeout,
//! defaulted register) increments a counter here instead of returning an error.
//!
//! # RT Safety
//!
//! Increments are a single `fetch_add` with `Ordering::Relaxed`. The counters are
//! shared with interrupt-context producers through an `Arc`.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`EventCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Events given an EID and queued for dispatch.
    pub admitted: u64,
    /// Events dropped because the pending queue was full.
    pub dropped: u64,
    /// Events published by interrupt context.
    pub staged: u64,
    /// Interrupt events lost because the staging queue was full.
    pub staging_overflow: u64,
    /// Queue entries fully dispatched.
    pub dispatched: u64,
    /// Queue entries with an unrecognized code.
    pub unknown_codes: u64,
    /// Registers that fell back to their default at open.
    pub integrity_faults: u64,
    /// Extended captures abandoned to a higher-priority capture.
    pub abandoned_captures: u64,
    /// Waveform captures abandoned without an acknowledgement.
    pub waveform_timeouts: u64,
    /// Extended-capture sessions that ran out of time.
    pub extended_timeouts: u64,
    /// Disturbance episodes that reached the log.
    pub disturbance_episodes: u64,
}

/// Atomic engine counters.
#[derive(Debug, Default)]
pub struct EventCounters {
    admitted: AtomicU64,
    dropped: AtomicU64,
    staged: AtomicU64,
    staging_overflow: AtomicU64,
    dispatched: AtomicU64,
    unknown_codes: AtomicU64,
    integrity_faults: AtomicU64,
    abandoned_captures: AtomicU64,
    waveform_timeouts: AtomicU64,
    extended_timeouts: AtomicU64,
    disturbance_episodes: AtomicU64,
}

impl EventCounters {
    /// All counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            admitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            staged: AtomicU64::new(0),
            staging_overflow: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            unknown_codes: AtomicU64::new(0),
            integrity_faults: AtomicU64::new(0),
            abandoned_captures: AtomicU64::new(0),
            waveform_timeouts: AtomicU64::new(0),
            extended_timeouts: AtomicU64::new(0),
            disturbance_episodes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_staged(&self) {
        self.staged.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_staging_overflow(&self) {
        self.staging_overflow.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_unknown_codes(&self) {
        self.unknown_codes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_integrity_faults(&self) {
        self.integrity_faults.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_abandoned_captures(&self) {
        self.abandoned_captures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_waveform_timeouts(&self) {
        self.waveform_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_extended_timeouts(&self) {
        self.extended_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_disturbance_episodes(&self) {
        self.disturbance_episodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    ///
    /// Each value is read independently, so a snapshot taken while the engine runs
    /// is not a consistent cut.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            staged: self.staged.load(Ordering::Relaxed),
            staging_overflow: self.staging_overflow.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            unknown_codes: self.unknown_codes.load(Ordering::Relaxed),
            integrity_faults: self.integrity_faults.load(Ordering::Relaxed),
            abandoned_captures: self.abandoned_captures.load(Ordering::Relaxed),
            waveform_timeouts: self.waveform_timeouts.load(Ordering::Relaxed),
            extended_timeouts: self.extended_timeouts.load(Ordering::Relaxed),
            disturbance_episodes: self.disturbance_episodes.load(Ordering::Relaxed),
        }
    }
}
