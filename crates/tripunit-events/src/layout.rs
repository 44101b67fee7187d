//! Memory map: where every register, log and capture region lives.
//!
//! ```text
//!  store_base
//!  ├─ primary register block   master EID │ 8 log cursors │ energy cursor
//!  ├─ energy holding register  one 128-byte energy entry
//!  ├─ waveform header logs     trip │ alarm │ extended
//!  ├─ snapshot logs            summary │ trip │ alarm │ disturbance │ extended
//!  ├─ mirror register block
//!  └─ RMS region               header │ one-cycle samples │ 200 ms samples
//! ```

use tripunit_nvram::{Complemented, LogGeometry, PersistentRegister, REGISTER_COPY_LEN};

use crate::config::EngineConfig;
use crate::error::{EventError, EventResult};
use crate::records::{
    DisturbanceRecord, EnergyEntry, Record, RmsSample, SnapshotRecord, SummaryRecord,
    WaveformHeader,
};

/// Every indexed log the engine keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogKind {
    /// One summary record per admitted event.
    Summary = 0,
    /// Trip snapshots.
    Trip = 1,
    /// Alarm snapshots.
    Alarm = 2,
    /// Disturbance statistics.
    Disturbance = 3,
    /// Extended-capture snapshots.
    Extended = 4,
    /// Trip waveform headers.
    TripWaveform = 5,
    /// Alarm waveform headers.
    AlarmWaveform = 6,
    /// Extended-capture waveform headers.
    ExtendedWaveform = 7,
}

impl LogKind {
    /// All kinds, in register order.
    pub const ALL: [Self; 8] = [
        Self::Summary,
        Self::Trip,
        Self::Alarm,
        Self::Disturbance,
        Self::Extended,
        Self::TripWaveform,
        Self::AlarmWaveform,
        Self::ExtendedWaveform,
    ];

    /// Position in [`LogKind::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Log name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trip => "trip",
            Self::Alarm => "alarm",
            Self::Disturbance => "disturbance",
            Self::Extended => "extended",
            Self::TripWaveform => "trip waveform",
            Self::AlarmWaveform => "alarm waveform",
            Self::ExtendedWaveform => "extended waveform",
        }
    }

    /// Whether this log holds waveform headers.
    #[must_use]
    pub fn is_waveform(self) -> bool {
        matches!(
            self,
            Self::TripWaveform | Self::AlarmWaveform | Self::ExtendedWaveform
        )
    }

    /// Whether this log holds [`SnapshotRecord`]s.
    #[must_use]
    pub fn is_snapshot(self) -> bool {
        matches!(self, Self::Trip | Self::Alarm | Self::Extended)
    }

    /// Bytes per record.
    #[must_use]
    pub fn record_len(self) -> u16 {
        match self {
            Self::Summary => SummaryRecord::LEN,
            Self::Trip | Self::Alarm | Self::Extended => SnapshotRecord::LEN,
            Self::Disturbance => DisturbanceRecord::LEN,
            Self::TripWaveform | Self::AlarmWaveform | Self::ExtendedWaveform => {
                WaveformHeader::LEN
            }
        }
    }

    fn capacity(self, config: &EngineConfig) -> u16 {
        match self {
            Self::Summary => config.summary_capacity,
            Self::Trip => config.trip_capacity,
            Self::Alarm => config.alarm_capacity,
            Self::Disturbance => config.disturbance_capacity,
            Self::Extended => config.extended_capacity,
            Self::TripWaveform => config.trip_waveforms,
            Self::AlarmWaveform => config.alarm_waveforms,
            Self::ExtendedWaveform => config.extended_waveforms,
        }
    }
}

impl core::fmt::Display for LogKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complement-checked register in the register blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterSlot {
    /// Next EID to assign.
    MasterEid,
    /// Cursor of one log.
    Cursor(LogKind),
    /// Energy log cursor.
    EnergyCursor,
}

impl RegisterSlot {
    /// Registers per block.
    pub const COUNT: u32 = 10;

    fn position(self) -> u32 {
        match self {
            Self::MasterEid => 0,
            Self::Cursor(kind) => u32::from(kind as u8).saturating_add(1),
            Self::EnergyCursor => 9,
        }
    }
}

const REGISTER_BLOCK_LEN: u32 = RegisterSlot::COUNT * REGISTER_COPY_LEN as u32;

/// Placement of the extended-capture RMS region.
///
/// The header holds the session EID (u32), the first-sample timestamps of the
/// one-cycle and 200 ms windows (8 bytes each) and the two sample counts (u16 each).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmsRegion {
    /// Session EID.
    pub eid_address: u32,
    /// One-cycle window first-sample timestamp.
    pub one_cycle_time_address: u32,
    /// 200 ms window first-sample timestamp.
    pub two_hundred_time_address: u32,
    /// One-cycle sample count.
    pub one_cycle_count_address: u32,
    /// 200 ms sample count.
    pub two_hundred_count_address: u32,
    /// First one-cycle sample.
    pub one_cycle_base: u32,
    /// One-cycle sample slots.
    pub one_cycle_capacity: u16,
    /// First 200 ms sample.
    pub two_hundred_base: u32,
    /// 200 ms sample slots.
    pub two_hundred_capacity: u16,
}

impl RmsRegion {
    /// Bytes in the region header.
    pub const HEADER_LEN: u32 = 24;

    /// First byte of the region.
    #[must_use]
    pub fn base(&self) -> u32 {
        self.eid_address
    }

    /// One past the last byte of the region.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.two_hundred_base.saturating_add(
            u32::from(self.two_hundred_capacity).saturating_mul(u32::from(RmsSample::LEN)),
        )
    }
}

/// One geometry per [`LogKind`], addressed exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogGeometries {
    summary: LogGeometry,
    trip: LogGeometry,
    alarm: LogGeometry,
    disturbance: LogGeometry,
    extended: LogGeometry,
    trip_waveform: LogGeometry,
    alarm_waveform: LogGeometry,
    extended_waveform: LogGeometry,
}

impl LogGeometries {
    fn get(&self, kind: LogKind) -> LogGeometry {
        match kind {
            LogKind::Summary => self.summary,
            LogKind::Trip => self.trip,
            LogKind::Alarm => self.alarm,
            LogKind::Disturbance => self.disturbance,
            LogKind::Extended => self.extended,
            LogKind::TripWaveform => self.trip_waveform,
            LogKind::AlarmWaveform => self.alarm_waveform,
            LogKind::ExtendedWaveform => self.extended_waveform,
        }
    }
}

/// The closed `LogKind → LogGeometry` map plus every fixed region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    primary_registers: u32,
    mirror_registers: u32,
    energy_holding: u32,
    logs: LogGeometries,
    rms: RmsRegion,
}

struct Allocator {
    next: u32,
}

impl Allocator {
    fn take(&mut self, len: u32) -> EventResult<u32> {
        let at = self.next;
        self.next = at.checked_add(len).ok_or_else(|| {
            EventError::invalid_configuration("memory map overflows the 32-bit address space")
        })?;
        Ok(at)
    }

    fn log(&mut self, kind: LogKind, config: &EngineConfig) -> EventResult<LogGeometry> {
        let capacity = kind.capacity(config);
        let len = u32::from(kind.record_len()).saturating_mul(u32::from(capacity));
        let geometry = LogGeometry::new(self.take(len)?, kind.record_len(), capacity)?;
        if kind.is_waveform() {
            return Ok(geometry.with_eid_offset(WaveformHeader::EID_OFFSET)?);
        }
        Ok(geometry)
    }
}

impl MemoryMap {
    /// Lay out every region for `config`, back to back from `store_base`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidConfiguration`] for an invalid configuration or
    /// an address overflow, and [`EventError::LayoutOverlap`] if two regions share
    /// bytes.
    pub fn plan(config: &EngineConfig) -> EventResult<Self> {
        config.validate()?;
        let mut at = Allocator {
            next: config.store_base,
        };

        let primary_registers = at.take(REGISTER_BLOCK_LEN)?;
        let energy_holding = at.take(u32::from(EnergyEntry::LEN))?;

        let trip_waveform = at.log(LogKind::TripWaveform, config)?;
        let alarm_waveform = at.log(LogKind::AlarmWaveform, config)?;
        let extended_waveform = at.log(LogKind::ExtendedWaveform, config)?;
        let logs = LogGeometries {
            summary: at.log(LogKind::Summary, config)?,
            trip: at.log(LogKind::Trip, config)?,
            alarm: at.log(LogKind::Alarm, config)?,
            disturbance: at.log(LogKind::Disturbance, config)?,
            extended: at.log(LogKind::Extended, config)?,
            trip_waveform,
            alarm_waveform,
            extended_waveform,
        };

        let mirror_registers = at.take(REGISTER_BLOCK_LEN)?;

        let header = at.take(RmsRegion::HEADER_LEN)?;
        let sample = u32::from(RmsSample::LEN);
        let one_cycle_base = at.take(sample.saturating_mul(u32::from(config.one_cycle_samples)))?;
        let two_hundred_base =
            at.take(sample.saturating_mul(u32::from(config.two_hundred_ms_samples)))?;
        let rms = RmsRegion {
            eid_address: header,
            one_cycle_time_address: header.saturating_add(4),
            two_hundred_time_address: header.saturating_add(12),
            one_cycle_count_address: header.saturating_add(20),
            two_hundred_count_address: header.saturating_add(22),
            one_cycle_base,
            one_cycle_capacity: config.one_cycle_samples,
            two_hundred_base,
            two_hundred_capacity: config.two_hundred_ms_samples,
        };

        let map = Self {
            primary_registers,
            mirror_registers,
            energy_holding,
            logs,
            rms,
        };
        map.check_overlaps()?;
        Ok(map)
    }

    /// Geometry of one log.
    #[must_use]
    pub fn geometry(&self, kind: LogKind) -> LogGeometry {
        self.logs.get(kind)
    }

    /// Build the register at `slot`, primary and mirror copies.
    ///
    /// # Errors
    ///
    /// Returns an error if the two copies would overlap.
    pub fn register<T: Complemented>(
        &self,
        slot: RegisterSlot,
        default: T,
    ) -> EventResult<PersistentRegister<T>> {
        let offset = slot.position().saturating_mul(REGISTER_COPY_LEN as u32);
        Ok(PersistentRegister::new(
            self.primary_registers.saturating_add(offset),
            self.mirror_registers.saturating_add(offset),
            default,
        )?)
    }

    /// Address of the energy holding register.
    #[must_use]
    pub fn energy_holding(&self) -> u32 {
        self.energy_holding
    }

    /// The RMS region.
    #[must_use]
    pub fn rms(&self) -> &RmsRegion {
        &self.rms
    }

    /// Bytes of store the map needs, counted from address 0.
    #[must_use]
    pub fn required_len(&self) -> u32 {
        self.rms.end()
    }

    fn regions(&self) -> Vec<(&'static str, u32, u32)> {
        let mut regions = vec![
            (
                "primary registers",
                self.primary_registers,
                self.primary_registers.saturating_add(REGISTER_BLOCK_LEN),
            ),
            (
                "energy holding",
                self.energy_holding,
                self.energy_holding
                    .saturating_add(u32::from(EnergyEntry::LEN)),
            ),
            (
                "mirror registers",
                self.mirror_registers,
                self.mirror_registers.saturating_add(REGISTER_BLOCK_LEN),
            ),
            ("rms region", self.rms.base(), self.rms.end()),
        ];
        for kind in LogKind::ALL {
            let geometry = self.geometry(kind);
            regions.push((kind.as_str(), geometry.base(), geometry.end()));
        }
        regions
    }

    fn check_overlaps(&self) -> EventResult<()> {
        let regions = self.regions();
        for (i, &(first, first_start, first_end)) in regions.iter().enumerate() {
            for &(second, second_start, second_end) in regions.iter().skip(i.saturating_add(1)) {
                if first_start < second_end && second_start < first_end {
                    return Err(EventError::LayoutOverlap { first, second });
                }
            }
        }
        Ok(())
    }
}
