//! Engine configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{EventError, EventResult};

/// Sizes, timeouts and placement for one engine instance.
///
/// # Real-Time Safety
///
/// Read once at [`EventEngine::open`](crate::EventEngine::open); nothing on the
/// tick path consults it afterwards except copied scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Summary log capacity.
    pub summary_capacity: u16,
    /// Trip snapshot log capacity.
    pub trip_capacity: u16,
    /// Alarm snapshot log capacity.
    pub alarm_capacity: u16,
    /// Disturbance log capacity.
    pub disturbance_capacity: u16,
    /// Extended-capture snapshot log capacity.
    pub extended_capacity: u16,
    /// Trip waveform header slots.
    pub trip_waveforms: u16,
    /// Alarm waveform header slots.
    pub alarm_waveforms: u16,
    /// Extended waveform header slots.
    pub extended_waveforms: u16,
    /// One-cycle RMS samples per extended capture.
    pub one_cycle_samples: u16,
    /// Two-hundred-millisecond RMS samples per extended capture.
    pub two_hundred_ms_samples: u16,
    /// Disturbance sub-interval samples folded into one minute.
    ///
    /// Default: 3599, one sample per one-cycle tick at 60 Hz.
    pub minute_threshold: u32,
    /// How long a waveform capture may wait for its bulk write.
    pub waveform_timeout_ms: u32,
    /// How long an extended-capture session may run.
    pub extended_capture_timeout_ms: u32,
    /// First bulk-store sector of the energy log.
    pub energy_first_sector: u32,
    /// One past the last bulk-store sector of the energy log.
    pub energy_end_sector: u32,
    /// Energy half-pages per bulk-store sector.
    pub energy_half_pages_per_sector: u32,
    /// First byte of the persistent store used by the engine.
    pub store_base: u32,
}

impl EngineConfig {
    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidConfiguration`] naming the first field that is
    /// out of range.
    pub fn validate(&self) -> EventResult<()> {
        let capacities = [
            ("summary_capacity", self.summary_capacity),
            ("trip_capacity", self.trip_capacity),
            ("alarm_capacity", self.alarm_capacity),
            ("disturbance_capacity", self.disturbance_capacity),
            ("extended_capacity", self.extended_capacity),
            ("trip_waveforms", self.trip_waveforms),
            ("alarm_waveforms", self.alarm_waveforms),
            ("extended_waveforms", self.extended_waveforms),
        ];
        for (name, capacity) in capacities {
            if capacity < 2 {
                return Err(EventError::invalid_configuration(format!(
                    "{name} must be at least 2, got {capacity}"
                )));
            }
        }
        if self.one_cycle_samples == 0 || self.two_hundred_ms_samples == 0 {
            return Err(EventError::invalid_configuration(
                "RMS sample counts must be at least 1",
            ));
        }
        if self.minute_threshold == 0 {
            return Err(EventError::invalid_configuration(
                "minute_threshold must be at least 1",
            ));
        }
        if !(1..=60_000).contains(&self.waveform_timeout_ms) {
            return Err(EventError::invalid_configuration(
                "waveform_timeout_ms must be between 1 and 60000",
            ));
        }
        if self.extended_capture_timeout_ms < self.waveform_timeout_ms {
            return Err(EventError::invalid_configuration(
                "extended_capture_timeout_ms must not be shorter than waveform_timeout_ms",
            ));
        }
        if self.energy_first_sector >= self.energy_end_sector {
            return Err(EventError::invalid_configuration(
                "energy_first_sector must be below energy_end_sector",
            ));
        }
        if !self.energy_half_pages_per_sector.is_power_of_two() {
            return Err(EventError::invalid_configuration(
                "energy_half_pages_per_sector must be a power of two",
            ));
        }
        if self
            .energy_end_sector
            .checked_mul(self.energy_half_pages_per_sector)
            .is_none()
        {
            return Err(EventError::invalid_configuration(
                "energy log half-page addresses overflow",
            ));
        }
        Ok(())
    }

    /// Half-page entries the energy log keeps once it has wrapped: the whole
    /// region less the sector being erased.
    #[must_use]
    pub fn energy_entry_cap(&self) -> u32 {
        self.energy_end_sector
            .saturating_sub(self.energy_first_sector)
            .saturating_sub(1)
            .saturating_mul(self.energy_half_pages_per_sector)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            summary_capacity: 500,
            trip_capacity: 200,
            alarm_capacity: 200,
            disturbance_capacity: 75,
            extended_capacity: 25,
            trip_waveforms: 21,
            alarm_waveforms: 21,
            extended_waveforms: 7,
            one_cycle_samples: 360,
            two_hundred_ms_samples: 300,
            minute_threshold: 3599,
            waveform_timeout_ms: 700,
            extended_capture_timeout_ms: 75_000,
            energy_first_sector: 0x10,
            energy_end_sector: 0x1A6,
            energy_half_pages_per_sector: 32,
            store_base: 0,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the summary log capacity.
    #[must_use]
    pub fn summary_capacity(mut self, capacity: u16) -> Self {
        self.config.summary_capacity = capacity;
        self
    }

    /// Set the trip, alarm, disturbance and extended snapshot log capacities.
    #[must_use]
    pub fn snapshot_capacities(
        mut self,
        trip: u16,
        alarm: u16,
        disturbance: u16,
        extended: u16,
    ) -> Self {
        self.config.trip_capacity = trip;
        self.config.alarm_capacity = alarm;
        self.config.disturbance_capacity = disturbance;
        self.config.extended_capacity = extended;
        self
    }

    /// Set the waveform header slots for trip, alarm and extended captures.
    #[must_use]
    pub fn waveform_slots(mut self, trip: u16, alarm: u16, extended: u16) -> Self {
        self.config.trip_waveforms = trip;
        self.config.alarm_waveforms = alarm;
        self.config.extended_waveforms = extended;
        self
    }

    /// Set the RMS sample counts per extended capture.
    #[must_use]
    pub fn rms_samples(mut self, one_cycle: u16, two_hundred_ms: u16) -> Self {
        self.config.one_cycle_samples = one_cycle;
        self.config.two_hundred_ms_samples = two_hundred_ms;
        self
    }

    /// Set the disturbance minute threshold.
    #[must_use]
    pub fn minute_threshold(mut self, samples: u32) -> Self {
        self.config.minute_threshold = samples;
        self
    }

    /// Set the waveform capture timeout.
    #[must_use]
    pub fn waveform_timeout_ms(mut self, ms: u32) -> Self {
        self.config.waveform_timeout_ms = ms;
        self
    }

    /// Set the extended-capture session timeout.
    #[must_use]
    pub fn extended_capture_timeout_ms(mut self, ms: u32) -> Self {
        self.config.extended_capture_timeout_ms = ms;
        self
    }

    /// Set the energy log sector range and sector size.
    #[must_use]
    pub fn energy_sectors(mut self, first: u32, end: u32, half_pages_per_sector: u32) -> Self {
        self.config.energy_first_sector = first;
        self.config.energy_end_sector = end;
        self.config.energy_half_pages_per_sector = half_pages_per_sector;
        self
    }

    /// Set the first store byte used by the engine.
    #[must_use]
    pub fn store_base(mut self, base: u32) -> Self {
        self.config.store_base = base;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> EventResult<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
