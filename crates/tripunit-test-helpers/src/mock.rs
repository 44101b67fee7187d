//! Scriptable collaborators for driving an engine in tests.

use tripunit_events::{
    BulkOp, BulkRequests, DISTURBANCE_PARAMETERS, DisturbanceParameter, ENERGY_PAYLOAD_LEN,
    EnergyPayload, EnergyWrite, EventCode, MeteringSnapshot, ProtectionStatus, RMS_CHANNELS,
    RealTimeClock, RmsSample, RmsWindow, SnapshotBlock, Timestamp,
};

/// A clock that only moves when told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualClock {
    now: Timestamp,
}

impl ManualClock {
    /// Clock reading `now`.
    pub fn new(now: Timestamp) -> Self {
        Self { now }
    }

    /// Move forward by `ms`.
    pub fn advance_ms(&mut self, ms: u64) {
        self.now = self.now.add_millis(ms);
    }

    /// Jump to `now`.
    pub fn set(&mut self, now: Timestamp) {
        self.now = now;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Timestamp::new(1_000, 0))
    }
}

impl RealTimeClock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}

/// Metering that returns scripted disturbance values and recognizable
/// snapshots, RMS samples and energy payloads.
///
/// Snapshots carry the event code as their first value. RMS samples carry a
/// per-window sequence number (starting at 1) in every channel. Energy payloads
/// are filled with a wrapping sequence byte (starting at 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMetering {
    disturbance: [f32; DISTURBANCE_PARAMETERS],
    captured: Vec<EventCode>,
    one_cycle_samples: u32,
    two_hundred_samples: u32,
    energy_entries: u8,
}

impl Default for ScriptedMetering {
    fn default() -> Self {
        Self {
            disturbance: [0.0; DISTURBANCE_PARAMETERS],
            captured: Vec::new(),
            one_cycle_samples: 0,
            two_hundred_samples: 0,
            energy_entries: 0,
        }
    }
}

impl ScriptedMetering {
    /// Set the value reported for `parameter`.
    pub fn set_disturbance(&mut self, parameter: DisturbanceParameter, value: f32) {
        if let Some(slot) = self.disturbance.get_mut(parameter.index()) {
            *slot = value;
        }
    }

    /// Codes a snapshot was captured for, in order.
    pub fn captured(&self) -> &[EventCode] {
        &self.captured
    }

    /// RMS samples handed out for `window`.
    pub fn samples_taken(&self, window: RmsWindow) -> u32 {
        match window {
            RmsWindow::OneCycle => self.one_cycle_samples,
            RmsWindow::TwoHundredMs => self.two_hundred_samples,
        }
    }

    /// Energy payloads handed out.
    pub fn energy_entries(&self) -> u8 {
        self.energy_entries
    }
}

impl MeteringSnapshot for ScriptedMetering {
    fn capture(&mut self, code: EventCode) -> SnapshotBlock {
        self.captured.push(code);
        SnapshotBlock::from_values(&[f32::from(code.raw())])
    }

    fn rms_sample(&mut self, window: RmsWindow) -> RmsSample {
        let counter = match window {
            RmsWindow::OneCycle => &mut self.one_cycle_samples,
            RmsWindow::TwoHundredMs => &mut self.two_hundred_samples,
        };
        *counter += 1;
        RmsSample {
            values: [*counter as f32; RMS_CHANNELS],
        }
    }

    fn disturbance_value(&self, parameter: DisturbanceParameter) -> f32 {
        self.disturbance
            .get(parameter.index())
            .copied()
            .unwrap_or(0.0)
    }

    fn energy_entry(&mut self) -> EnergyPayload {
        self.energy_entries = self.energy_entries.wrapping_add(1);
        EnergyPayload::new([self.energy_entries; ENERGY_PAYLOAD_LEN])
    }
}

/// Protection state with fixed readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedProtection {
    /// Reported thermal memory, percent.
    pub thermal_percent: f32,
    /// Reported time bucket, tenths of a percent, for every parameter.
    pub trip_bucket_tenths: u16,
    /// Reported high-temperature trip threshold.
    pub temperature_threshold: f32,
}

impl Default for FixedProtection {
    fn default() -> Self {
        Self {
            thermal_percent: 0.0,
            trip_bucket_tenths: 0,
            temperature_threshold: 100.0,
        }
    }
}

impl ProtectionStatus for FixedProtection {
    fn thermal_bucket_percent(&self) -> f32 {
        self.thermal_percent
    }

    fn trip_bucket_tenths(&self, _parameter: DisturbanceParameter) -> u16 {
        self.trip_bucket_tenths
    }

    fn temperature_trip_threshold(&self) -> f32 {
        self.temperature_threshold
    }
}

/// Plays the bulk-store arbiter: picks up requests and acknowledges them,
/// recording what was asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponder {
    held: Vec<BulkOp>,
    completed: Vec<BulkOp>,
    energy_writes: Vec<EnergyWrite>,
    erased: Vec<u32>,
}

impl BulkResponder {
    /// Responder that acknowledges everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up `op` but never acknowledge it.
    pub fn hold(&mut self, op: BulkOp) {
        if !self.held.contains(&op) {
            self.held.push(op);
        }
    }

    /// Stop holding `op`.
    pub fn release(&mut self, op: BulkOp) {
        self.held.retain(|held| *held != op);
    }

    /// Service every pending request once. Returns how many were acknowledged.
    pub fn service(&mut self, bulk: &mut BulkRequests) -> usize {
        let mut acknowledged = 0;
        for op in BulkOp::ALL {
            if bulk.state(op).is_outstanding() {
                bulk.begin(op);
                if self.held.contains(&op) {
                    continue;
                }
                match op {
                    BulkOp::WriteEnergyHalfPage => {
                        if let Some(write) = bulk.energy_write() {
                            self.energy_writes.push(*write);
                        }
                    }
                    BulkOp::EraseEnergySector => {
                        if let Some(sector) = bulk.erase_sector() {
                            self.erased.push(sector);
                        }
                    }
                    BulkOp::WriteTripWaveform
                    | BulkOp::WriteAlarmWaveform
                    | BulkOp::WriteExtendedWaveform => {}
                }
                if bulk.acknowledge(op) {
                    self.completed.push(op);
                    acknowledged += 1;
                }
            }
        }
        acknowledged
    }

    /// Operations acknowledged, in order.
    pub fn completed(&self) -> &[BulkOp] {
        &self.completed
    }

    /// Energy page writes acknowledged, in order.
    pub fn energy_writes(&self) -> &[EnergyWrite] {
        &self.energy_writes
    }

    /// Sectors erased, in order.
    pub fn erased(&self) -> &[u32] {
        &self.erased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let mut clock = ManualClock::new(Timestamp::new(10, 0));
        clock.advance_ms(1_500);
        assert_eq!(clock.now(), Timestamp::new(11, 500_000_000));
    }

    #[test]
    fn test_scripted_rms_sequence() {
        let mut metering = ScriptedMetering::default();
        assert_eq!(metering.rms_sample(RmsWindow::OneCycle).values[0], 1.0);
        assert_eq!(metering.rms_sample(RmsWindow::OneCycle).values[10], 2.0);
        assert_eq!(metering.rms_sample(RmsWindow::TwoHundredMs).values[0], 1.0);
        assert_eq!(metering.samples_taken(RmsWindow::OneCycle), 2);
    }

    #[test]
    fn test_responder_holds_op() {
        let mut responder = BulkResponder::new();
        let mut bulk = BulkRequests::default();
        responder.hold(BulkOp::WriteTripWaveform);
        assert_eq!(responder.service(&mut bulk), 0);
        assert!(responder.completed().is_empty());
    }
}
