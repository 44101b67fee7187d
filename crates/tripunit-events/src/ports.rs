//! Collaborators the engine consumes but does not own.

use crate::codes::EventCode;
use crate::disturbance::DisturbanceParameter;
use crate::records::{EnergyPayload, RmsSample, SnapshotBlock};
use crate::time::Timestamp;

/// Source of event timestamps.
pub trait RealTimeClock {
    /// Current time. Implementations read the clock atomically with respect to
    /// the tick interrupt.
    fn now(&self) -> Timestamp;
}

/// Which RMS window a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RmsWindow {
    /// One-cycle RMS values.
    OneCycle,
    /// Two-hundred-millisecond RMS values.
    TwoHundredMs,
}

impl RmsWindow {
    /// Window name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneCycle => "one-cycle",
            Self::TwoHundredMs => "200ms",
        }
    }
}

/// Present measurements from the metering pipeline.
pub trait MeteringSnapshot {
    /// Measurement block for a snapshot record.
    fn capture(&mut self, code: EventCode) -> SnapshotBlock;

    /// Latest RMS values for `window`.
    fn rms_sample(&mut self, window: RmsWindow) -> RmsSample;

    /// Present value of a monitored disturbance parameter.
    fn disturbance_value(&self, parameter: DisturbanceParameter) -> f32;

    /// Demand payload for an energy log entry.
    fn energy_entry(&mut self) -> EnergyPayload;
}

/// Protection state consulted when a disturbance ends.
pub trait ProtectionStatus {
    /// Long-delay thermal memory, in percent of the trip level.
    fn thermal_bucket_percent(&self) -> f32;

    /// Time bucket of the protection function behind `parameter`, in tenths of a
    /// percent of its trip setting.
    fn trip_bucket_tenths(&self, parameter: DisturbanceParameter) -> u16;

    /// Temperature at which the high-temperature protection trips.
    fn temperature_trip_threshold(&self) -> f32;
}

impl<T: RealTimeClock + ?Sized> RealTimeClock for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}
