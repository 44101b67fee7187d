//! Per-parameter disturbance statistics.
//!
//! Each monitored parameter has a [`DisturbanceTrack`]. While the parameter's
//! level bit is set the track accumulates an extremum and a two-level running
//! average (sub-interval sums folded into minutes). When the bit clears the
//! episode ends: the exit event is admitted and the track holds its statistics
//! until the dispatcher has written the disturbance record.
//!
//! ```text
//!          level            !level           admitted          written
//!  Idle ─────────► Start ──► InProgress ────► End ───────────► Wait ─────────► Cancel ─► Idle
//!                                              │ not admitted                    ▲
//!                                              └─────────────────────────────────┘
//!  any state ──cancel──► Cancel
//! ```

use crate::codes::EventCode;
use crate::eid::Eid;
use crate::time::Timestamp;

/// Extremum seed for [`ProcessingMode::UnsignedMin`].
pub const UNSIGNED_MIN_SEED: f32 = 1.0e9;

/// A monitored disturbance parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DisturbanceParameter {
    /// Long-delay pickup.
    LongDelayPickup = 0,
    /// High temperature.
    HighTemperature = 1,
    /// Overvoltage.
    Overvoltage = 2,
    /// Undervoltage.
    Undervoltage = 3,
    /// Voltage unbalance.
    VoltageUnbalance = 4,
    /// Current unbalance.
    CurrentUnbalance = 5,
    /// Reverse active power.
    ReverseActivePower = 6,
    /// Reverse reactive power.
    ReverseReactivePower = 7,
    /// Phase loss.
    PhaseLoss = 8,
    /// Overfrequency.
    Overfrequency = 9,
    /// Underfrequency.
    Underfrequency = 10,
    /// Over active power.
    OverActivePower = 11,
    /// Over reactive power.
    OverReactivePower = 12,
    /// Over apparent power.
    OverApparentPower = 13,
    /// Under power factor.
    UnderPowerFactor = 14,
    /// High load 1.
    HighLoad1 = 15,
    /// High load 2.
    HighLoad2 = 16,
    /// External capture command.
    GooseCapture = 17,
    /// Ground fault.
    GroundFault = 18,
    /// Short-delay pickup.
    ShortDelayPickup = 19,
}

/// Number of disturbance parameters.
pub const DISTURBANCE_PARAMETERS: usize = 20;

impl DisturbanceParameter {
    /// All parameters, in track order.
    pub const ALL: [Self; DISTURBANCE_PARAMETERS] = [
        Self::LongDelayPickup,
        Self::HighTemperature,
        Self::Overvoltage,
        Self::Undervoltage,
        Self::VoltageUnbalance,
        Self::CurrentUnbalance,
        Self::ReverseActivePower,
        Self::ReverseReactivePower,
        Self::PhaseLoss,
        Self::Overfrequency,
        Self::Underfrequency,
        Self::OverActivePower,
        Self::OverReactivePower,
        Self::OverApparentPower,
        Self::UnderPowerFactor,
        Self::HighLoad1,
        Self::HighLoad2,
        Self::GooseCapture,
        Self::GroundFault,
        Self::ShortDelayPickup,
    ];

    /// Track index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parameter at `index`.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Bit in the level and cancel masks.
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// How samples fold into the extremum.
    #[must_use]
    pub fn mode(self) -> ProcessingMode {
        match self {
            Self::Undervoltage | Self::Underfrequency => ProcessingMode::UnsignedMin,
            Self::ReverseActivePower
            | Self::ReverseReactivePower
            | Self::OverActivePower
            | Self::OverReactivePower => ProcessingMode::SignedMaxMagnitude,
            Self::UnderPowerFactor => ProcessingMode::SignedMinMagnitude,
            _ => ProcessingMode::UnsignedMax,
        }
    }

    /// Where the percent-to-trip figure comes from.
    #[must_use]
    pub fn percent_source(self) -> PercentSource {
        match self {
            Self::LongDelayPickup | Self::HighLoad1 | Self::HighLoad2 => {
                PercentSource::ThermalBucket
            }
            Self::HighTemperature => PercentSource::TemperatureRatio,
            Self::GooseCapture => PercentSource::NotApplicable,
            _ => PercentSource::TripBucket,
        }
    }

    /// Event admitted when an episode ends.
    #[must_use]
    pub fn exit_code(self) -> EventCode {
        EventCode::new(EventCode::DISTURBANCE_EXIT_BASE.raw().saturating_add(self as u8))
    }

    /// Parameter name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LongDelayPickup => "LongDelayPickup",
            Self::HighTemperature => "HighTemperature",
            Self::Overvoltage => "Overvoltage",
            Self::Undervoltage => "Undervoltage",
            Self::VoltageUnbalance => "VoltageUnbalance",
            Self::CurrentUnbalance => "CurrentUnbalance",
            Self::ReverseActivePower => "ReverseActivePower",
            Self::ReverseReactivePower => "ReverseReactivePower",
            Self::PhaseLoss => "PhaseLoss",
            Self::Overfrequency => "Overfrequency",
            Self::Underfrequency => "Underfrequency",
            Self::OverActivePower => "OverActivePower",
            Self::OverReactivePower => "OverReactivePower",
            Self::OverApparentPower => "OverApparentPower",
            Self::UnderPowerFactor => "UnderPowerFactor",
            Self::HighLoad1 => "HighLoad1",
            Self::HighLoad2 => "HighLoad2",
            Self::GooseCapture => "GooseCapture",
            Self::GroundFault => "GroundFault",
            Self::ShortDelayPickup => "ShortDelayPickup",
        }
    }
}

impl core::fmt::Display for DisturbanceParameter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an episode's extremum is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    /// Largest value, seeded at 0.
    UnsignedMax,
    /// Smallest value, seeded at [`UNSIGNED_MIN_SEED`].
    UnsignedMin,
    /// Largest magnitude, keeping the sign.
    SignedMaxMagnitude,
    /// Smallest magnitude, keeping the sign, seeded with the first sample.
    SignedMinMagnitude,
}

impl ProcessingMode {
    /// Extremum at the start of an episode whose first sample is `first`.
    #[must_use]
    pub fn seed(self, first: f32) -> f32 {
        match self {
            Self::UnsignedMin => UNSIGNED_MIN_SEED,
            Self::UnsignedMax | Self::SignedMaxMagnitude => 0.0,
            Self::SignedMinMagnitude => first,
        }
    }

    /// Fold `sample` into `extremum`.
    ///
    /// The signed modes assume every sample of an episode has the same sign.
    #[must_use]
    pub fn fold(self, extremum: f32, sample: f32) -> f32 {
        match self {
            Self::UnsignedMax => extremum.max(sample),
            Self::UnsignedMin => extremum.min(sample),
            Self::SignedMaxMagnitude if sample < 0.0 => extremum.min(sample),
            Self::SignedMaxMagnitude => extremum.max(sample),
            Self::SignedMinMagnitude if sample < 0.0 => extremum.max(sample),
            Self::SignedMinMagnitude => extremum.min(sample),
        }
    }
}

/// Source of the percent-to-trip figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PercentSource {
    /// Long-delay thermal bucket, already in percent.
    ThermalBucket,
    /// Extremum over the temperature trip threshold.
    TemperatureRatio,
    /// The parameter's own protection time bucket, in tenths of a percent.
    TripBucket,
    /// Not a protection function.
    NotApplicable,
}

/// State of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum TrackState {
    /// No episode.
    #[default]
    Idle = 0,
    /// Episode detected, accumulators not yet seeded.
    Start = 1,
    /// Accumulating samples.
    InProgress = 2,
    /// Level cleared, statistics to finalize.
    End = 3,
    /// Statistics held until the disturbance record is written.
    Wait = 4,
    /// Discarding the episode.
    Cancel = 5,
}

impl TrackState {
    /// State name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Start => "Start",
            Self::InProgress => "InProgress",
            Self::End => "End",
            Self::Wait => "Wait",
            Self::Cancel => "Cancel",
        }
    }
}

impl core::fmt::Display for TrackState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final statistics of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeStats {
    /// When the episode started.
    pub entry_timestamp: Timestamp,
    /// Episode length in milliseconds.
    pub duration_ms: f32,
    /// Extremum per the parameter's mode.
    pub extremum: f32,
    /// Weighted average of every sample.
    pub average: f32,
    /// How close protection came to tripping, in percent.
    pub percent_to_trip: f32,
}

/// Running state for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct DisturbanceTrack {
    parameter: DisturbanceParameter,
    state: TrackState,
    entry_timestamp: Timestamp,
    extremum: f32,
    sub_sum: f32,
    sub_count: u32,
    minutes_sum: f32,
    minutes: u32,
    stats: Option<EpisodeStats>,
    origin_eid: Option<Eid>,
    pending_write: bool,
}

impl DisturbanceTrack {
    /// An idle track.
    #[must_use]
    pub fn new(parameter: DisturbanceParameter) -> Self {
        Self {
            parameter,
            state: TrackState::Idle,
            entry_timestamp: Timestamp::ZERO,
            extremum: 0.0,
            sub_sum: 0.0,
            sub_count: 0,
            minutes_sum: 0.0,
            minutes: 0,
            stats: None,
            origin_eid: None,
            pending_write: false,
        }
    }

    /// Parameter tracked.
    #[must_use]
    pub fn parameter(&self) -> DisturbanceParameter {
        self.parameter
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Running extremum.
    #[must_use]
    pub fn extremum(&self) -> f32 {
        self.extremum
    }

    /// Completed one-minute sub-intervals.
    #[must_use]
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Samples in the open sub-interval.
    #[must_use]
    pub fn sub_count(&self) -> u32 {
        self.sub_count
    }

    /// Finalized statistics, present from `End` until the track is released.
    #[must_use]
    pub fn stats(&self) -> Option<&EpisodeStats> {
        self.stats.as_ref()
    }

    /// EID of the event that started the episode.
    #[must_use]
    pub fn origin_eid(&self) -> Option<Eid> {
        self.origin_eid
    }

    /// Whether the disturbance record is still to be written.
    #[must_use]
    pub fn is_pending_write(&self) -> bool {
        self.pending_write
    }

    /// Record the event that started the episode.
    pub fn set_origin(&mut self, eid: Option<Eid>) {
        self.origin_eid = eid;
    }

    /// Apply this cycle's level and cancel signals.
    ///
    /// A set level starts an idle track; a clear level ends one in progress. A
    /// cancel overrides both.
    pub fn apply_signal(&mut self, level: bool, cancel: bool) {
        match (self.state, level) {
            (TrackState::Idle, true) => self.state = TrackState::Start,
            (TrackState::InProgress, false) => self.state = TrackState::End,
            _ => {}
        }
        if cancel {
            self.state = TrackState::Cancel;
        }
    }

    /// Run one cycle with the parameter's present value.
    ///
    /// Returns `true` when the episode has just ended: the statistics are final
    /// apart from the percent-to-trip figure, and the caller must either
    /// [`accept`](Self::accept) or [`discard`](Self::discard) them.
    pub fn step(&mut self, sample: f32, now: Timestamp, minute_threshold: u32) -> bool {
        match self.state {
            TrackState::Idle => false,
            TrackState::Start => {
                self.seed(now, sample);
                self.state = TrackState::InProgress;
                self.accumulate(sample, minute_threshold);
                false
            }
            TrackState::InProgress => {
                self.accumulate(sample, minute_threshold);
                false
            }
            TrackState::End => {
                self.stats = Some(self.finalize(minute_threshold));
                true
            }
            TrackState::Wait => {
                if !self.pending_write {
                    self.release();
                }
                false
            }
            TrackState::Cancel => {
                self.release();
                false
            }
        }
    }

    /// Hold the finalized statistics until the disturbance record is written.
    pub fn accept(&mut self, percent_to_trip: f32) {
        if let Some(stats) = self.stats.as_mut() {
            stats.percent_to_trip = percent_to_trip;
        }
        self.pending_write = true;
        self.state = TrackState::Wait;
    }

    /// Drop the episode without a record.
    pub fn discard(&mut self) {
        self.release();
    }

    /// Mark the disturbance record written.
    pub fn clear_pending_write(&mut self) {
        self.pending_write = false;
    }

    /// Return to idle, keeping only the originating EID.
    pub fn release(&mut self) {
        let origin = self.origin_eid;
        *self = Self::new(self.parameter);
        self.origin_eid = origin;
    }

    fn seed(&mut self, now: Timestamp, first: f32) {
        self.entry_timestamp = now;
        self.extremum = self.parameter.mode().seed(first);
        self.sub_sum = 0.0;
        self.sub_count = 0;
        self.minutes_sum = 0.0;
        self.minutes = 0;
        self.stats = None;
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "sub-minute sample counts stay far below f32's exact integer range"
    )]
    fn accumulate(&mut self, sample: f32, minute_threshold: u32) {
        self.extremum = self.parameter.mode().fold(self.extremum, sample);
        self.sub_sum += sample;
        self.sub_count = self.sub_count.saturating_add(1);
        if self.sub_count > minute_threshold {
            self.minutes_sum += self.sub_sum / self.sub_count as f32;
            self.minutes = self.minutes.saturating_add(1);
            self.sub_sum = 0.0;
            self.sub_count = 0;
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "sample and minute counts stay far below f32's exact integer range"
    )]
    fn finalize(&self, minute_threshold: u32) -> EpisodeStats {
        let sub_count = self.sub_count as f32;
        let minutes = self.minutes as f32;
        let sub_avg = if self.sub_count > 0 {
            self.sub_sum / sub_count
        } else {
            0.0
        };
        let minutes_avg = if self.minutes > 0 {
            self.minutes_sum / minutes
        } else {
            0.0
        };
        let per_minute = minute_threshold.saturating_add(1) as f32;
        let weight = minutes * per_minute + sub_count;
        let average = if weight > 0.0 {
            (minutes_avg * minutes * per_minute + sub_avg * sub_count) / weight
        } else {
            0.0
        };
        let duration_ms = minutes * 60_000.0 + sub_count * (60_000.0 / minute_threshold as f32);
        EpisodeStats {
            entry_timestamp: self.entry_timestamp,
            duration_ms,
            extremum: self.extremum,
            average,
            percent_to_trip: 0.0,
        }
    }
}

/// Signals for one cycle, already merged by [`TriggerSignals`](crate::TriggerSignals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisturbanceInputs {
    /// Level bits by parameter.
    pub levels: u32,
    /// Cancel bits by parameter.
    pub cancels: u32,
}

/// The twenty tracks, in [`DisturbanceParameter::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct DisturbanceAggregator {
    tracks: [DisturbanceTrack; DISTURBANCE_PARAMETERS],
}

impl Default for DisturbanceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl DisturbanceAggregator {
    /// All tracks idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracks: DisturbanceParameter::ALL.map(DisturbanceTrack::new),
        }
    }

    /// Track for `parameter`.
    #[must_use]
    pub fn track(&self, parameter: DisturbanceParameter) -> Option<&DisturbanceTrack> {
        self.tracks.get(parameter.index())
    }

    /// Mutable track for `parameter`.
    pub fn track_mut(&mut self, parameter: DisturbanceParameter) -> Option<&mut DisturbanceTrack> {
        self.tracks.get_mut(parameter.index())
    }

    /// Every track.
    pub fn tracks(&self) -> impl Iterator<Item = &DisturbanceTrack> {
        self.tracks.iter()
    }

    /// Every track, mutably.
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut DisturbanceTrack> {
        self.tracks.iter_mut()
    }

    /// Return every track to idle.
    pub fn reset(&mut self) {
        self.tracks.iter_mut().for_each(DisturbanceTrack::release);
    }
}
