mod state_machine_tests;
mod unit_tests;

use tripunit_nvram::MemoryStore;

use crate::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone, Copy)]
struct StepClock {
    now: Timestamp,
}

impl StepClock {
    fn advance_ms(&mut self, ms: u64) {
        self.now = self.now.add_millis(ms);
    }
}

impl RealTimeClock for StepClock {
    fn now(&self) -> Timestamp {
        self.now
    }
}

#[derive(Debug, Default)]
struct Metering {
    values: [f32; DISTURBANCE_PARAMETERS],
    rms_taken: u32,
    energy_taken: u8,
}

impl Metering {
    fn set(&mut self, parameter: DisturbanceParameter, value: f32) {
        if let Some(slot) = self.values.get_mut(parameter.index()) {
            *slot = value;
        }
    }
}

impl MeteringSnapshot for Metering {
    fn capture(&mut self, code: EventCode) -> SnapshotBlock {
        SnapshotBlock::from_values(&[f32::from(code.raw())])
    }

    fn rms_sample(&mut self, _window: RmsWindow) -> RmsSample {
        self.rms_taken += 1;
        RmsSample {
            values: [self.rms_taken as f32; RMS_CHANNELS],
        }
    }

    fn disturbance_value(&self, parameter: DisturbanceParameter) -> f32 {
        self.values.get(parameter.index()).copied().unwrap_or(0.0)
    }

    fn energy_entry(&mut self) -> EnergyPayload {
        self.energy_taken = self.energy_taken.wrapping_add(1);
        EnergyPayload::new([self.energy_taken; ENERGY_PAYLOAD_LEN])
    }
}

#[derive(Debug, Clone, Copy)]
struct Protection {
    thermal: f32,
    bucket_tenths: u16,
    temperature_threshold: f32,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            thermal: 42.0,
            bucket_tenths: 555,
            temperature_threshold: 120.0,
        }
    }
}

impl ProtectionStatus for Protection {
    fn thermal_bucket_percent(&self) -> f32 {
        self.thermal
    }

    fn trip_bucket_tenths(&self, _parameter: DisturbanceParameter) -> u16 {
        self.bucket_tenths
    }

    fn temperature_trip_threshold(&self) -> f32 {
        self.temperature_threshold
    }
}

type Engine = EventEngine<MemoryStore, StepClock, Metering, Protection>;

fn tiny_config() -> EngineConfig {
    EngineConfig {
        summary_capacity: 8,
        trip_capacity: 3,
        alarm_capacity: 3,
        disturbance_capacity: 4,
        extended_capacity: 2,
        trip_waveforms: 3,
        alarm_waveforms: 3,
        extended_waveforms: 2,
        one_cycle_samples: 4,
        two_hundred_ms_samples: 2,
        minute_threshold: 4,
        waveform_timeout_ms: 700,
        extended_capture_timeout_ms: 2_000,
        energy_first_sector: 1,
        energy_end_sector: 4,
        energy_half_pages_per_sector: 2,
        store_base: 0,
    }
}

fn store_for(config: &EngineConfig) -> Result<MemoryStore, EventError> {
    let map = MemoryMap::plan(config)?;
    Ok(MemoryStore::new(map.required_len() as usize))
}

fn open_with(config: EngineConfig, store: MemoryStore) -> EventResult<Engine> {
    EventEngine::open(
        config,
        store,
        StepClock {
            now: Timestamp::new(500, 0),
        },
        Metering::default(),
        Protection::default(),
    )
}

/// A cleared engine over [`tiny_config`] with the clear's erase acknowledged.
fn engine() -> EventResult<Engine> {
    let config = tiny_config();
    let mut engine = open_with(config, store_for(&config)?)?;
    engine.clear_all()?;
    engine.clear_faults();
    let bulk = engine.bulk_requests_mut();
    bulk.begin(BulkOp::EraseEnergySector);
    bulk.acknowledge(BulkOp::EraseEnergySector);
    Ok(engine)
}

/// Acknowledge every outstanding bulk request.
fn acknowledge_all(engine: &mut Engine) {
    let bulk = engine.bulk_requests_mut();
    for op in BulkOp::ALL {
        if bulk.state(op).is_outstanding() {
            bulk.begin(op);
            bulk.acknowledge(op);
        }
    }
}
