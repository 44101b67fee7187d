//! Engine fixture builder.

use tripunit_events::{EngineConfig, EventEngine, EventResult};
use tripunit_nvram::MemoryStore;

use crate::mock::{FixedProtection, ManualClock, ScriptedMetering};

/// An engine over an in-memory store and the scriptable collaborators.
pub type TestEngine = EventEngine<MemoryStore, ManualClock, ScriptedMetering, FixedProtection>;

/// A configuration small enough to roll every log over in a few events.
///
/// Summary 16, trip/alarm 4, disturbance 5, extended 3, three slots per
/// waveform log, 6 one-cycle and 4 two-hundred-millisecond RMS samples, a
/// minute threshold of 9 samples and a 6-sector energy region of 4 half-pages
/// per sector.
pub fn small_config() -> EngineConfig {
    EngineConfig {
        summary_capacity: 16,
        trip_capacity: 4,
        alarm_capacity: 4,
        disturbance_capacity: 5,
        extended_capacity: 3,
        trip_waveforms: 3,
        alarm_waveforms: 3,
        extended_waveforms: 3,
        one_cycle_samples: 6,
        two_hundred_ms_samples: 4,
        minute_threshold: 9,
        waveform_timeout_ms: 700,
        extended_capture_timeout_ms: 75_000,
        energy_first_sector: 2,
        energy_end_sector: 8,
        energy_half_pages_per_sector: 4,
        store_base: 0,
    }
}

/// Builder for a [`TestEngine`].
#[derive(Debug, Clone)]
pub struct EngineFixture {
    config: EngineConfig,
    store: Option<MemoryStore>,
    clock: ManualClock,
    protection: FixedProtection,
    cleared: bool,
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self {
            config: small_config(),
            store: None,
            clock: ManualClock::default(),
            protection: FixedProtection::default(),
            cleared: true,
        }
    }
}

impl EngineFixture {
    /// Fixture with [`small_config`], a fresh store, and a cleared engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config`.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reopen over an existing store image instead of a fresh one. The engine
    /// is not cleared.
    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = Some(store);
        self.cleared = false;
        self
    }

    /// Start the clock at `clock`.
    pub fn clock(mut self, clock: ManualClock) -> Self {
        self.clock = clock;
        self
    }

    /// Report `protection` readings.
    pub fn protection(mut self, protection: FixedProtection) -> Self {
        self.protection = protection;
        self
    }

    /// Open the engine. A cleared engine also has its faults acknowledged and
    /// the first-sector erase request acknowledged.
    ///
    /// # Errors
    ///
    /// Propagates engine open and clear errors.
    pub fn build(self) -> EventResult<TestEngine> {
        let store = match self.store {
            Some(store) => store,
            None => {
                let map = tripunit_events::MemoryMap::plan(&self.config)?;
                MemoryStore::new(map.required_len() as usize)
            }
        };
        let mut engine = EventEngine::open(
            self.config,
            store,
            self.clock,
            ScriptedMetering::default(),
            self.protection,
        )?;
        if self.cleared {
            engine.clear_all()?;
            engine.clear_faults();
            let mut responder = crate::mock::BulkResponder::new();
            responder.service(engine.bulk_requests_mut());
        }
        Ok(engine)
    }
}
