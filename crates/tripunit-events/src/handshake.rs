//! Request/acknowledge handshakes with the bulk block store.
//!
//! The engine and the bulk-store arbiter never call each other. The engine
//! raises a request and polls; the arbiter picks up pending requests, marks them
//! in progress and acknowledges them when the medium is done.
//!
//! ```text
//!   engine            arbiter            arbiter              engine
//!   request()  ──►  Requested ─begin()─► InProgress ─acknowledge()─► Acknowledged ─reset()─► Idle
//!                       └────────────── withdraw() ─────────────────────────────────────────► Idle
//! ```

/// One two-phase handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum Handshake {
    /// Nothing requested.
    #[default]
    Idle = 0,
    /// Raised by the engine, not yet picked up.
    Requested = 1,
    /// Picked up by the arbiter.
    InProgress = 2,
    /// Completed by the arbiter, not yet consumed by the engine.
    Acknowledged = 3,
}

impl Handshake {
    /// State name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Requested => "Requested",
            Self::InProgress => "InProgress",
            Self::Acknowledged => "Acknowledged",
        }
    }

    /// Whether the request is still outstanding.
    #[must_use]
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Requested | Self::InProgress)
    }
}

impl core::fmt::Display for Handshake {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the engine asks of the bulk store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOp {
    /// Erase the energy sector in [`BulkRequests::erase_sector`].
    EraseEnergySector,
    /// Write the two energy entries in [`BulkRequests::energy_write`].
    WriteEnergyHalfPage,
    /// Store the finished trip waveform.
    WriteTripWaveform,
    /// Store the finished alarm waveform.
    WriteAlarmWaveform,
    /// Store the finished extended-capture waveform.
    WriteExtendedWaveform,
}

impl BulkOp {
    /// All operations, in the order the arbiter should service them.
    pub const ALL: [Self; 5] = [
        Self::EraseEnergySector,
        Self::WriteEnergyHalfPage,
        Self::WriteTripWaveform,
        Self::WriteAlarmWaveform,
        Self::WriteExtendedWaveform,
    ];
}

/// Bytes written by one energy bulk write: the held entry plus the new one.
pub const ENERGY_WRITE_LEN: usize = 256;

/// Data for a [`BulkOp::WriteEnergyHalfPage`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyWrite {
    /// Half-page address of the first entry.
    pub half_page: u32,
    /// Both entries, held one first.
    pub data: [u8; ENERGY_WRITE_LEN],
}

/// The handshake table shared with the bulk-store arbiter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRequests {
    erase_energy: Handshake,
    write_energy: Handshake,
    write_trip: Handshake,
    write_alarm: Handshake,
    write_extended: Handshake,
    energy_write: Option<EnergyWrite>,
    erase_sector: Option<u32>,
}

impl BulkRequests {
    fn slot(&self, op: BulkOp) -> Handshake {
        match op {
            BulkOp::EraseEnergySector => self.erase_energy,
            BulkOp::WriteEnergyHalfPage => self.write_energy,
            BulkOp::WriteTripWaveform => self.write_trip,
            BulkOp::WriteAlarmWaveform => self.write_alarm,
            BulkOp::WriteExtendedWaveform => self.write_extended,
        }
    }

    fn slot_mut(&mut self, op: BulkOp) -> &mut Handshake {
        match op {
            BulkOp::EraseEnergySector => &mut self.erase_energy,
            BulkOp::WriteEnergyHalfPage => &mut self.write_energy,
            BulkOp::WriteTripWaveform => &mut self.write_trip,
            BulkOp::WriteAlarmWaveform => &mut self.write_alarm,
            BulkOp::WriteExtendedWaveform => &mut self.write_extended,
        }
    }

    /// Current state of `op`.
    #[must_use]
    pub fn state(&self, op: BulkOp) -> Handshake {
        self.slot(op)
    }

    /// First operation waiting to be picked up.
    #[must_use]
    pub fn pending(&self) -> Option<BulkOp> {
        BulkOp::ALL
            .into_iter()
            .find(|op| self.slot(*op) == Handshake::Requested)
    }

    /// Mark `op` as picked up. Returns `false` unless it was requested.
    pub fn begin(&mut self, op: BulkOp) -> bool {
        let slot = self.slot_mut(op);
        if *slot != Handshake::Requested {
            return false;
        }
        *slot = Handshake::InProgress;
        tracing::trace!(?op, "bulk request picked up");
        true
    }

    /// Mark `op` as complete. Returns `false` unless it was outstanding.
    pub fn acknowledge(&mut self, op: BulkOp) -> bool {
        let slot = self.slot_mut(op);
        if !slot.is_outstanding() {
            return false;
        }
        *slot = Handshake::Acknowledged;
        tracing::trace!(?op, "bulk request acknowledged");
        true
    }

    /// Drop an outstanding request without completing it.
    pub fn withdraw(&mut self, op: BulkOp) {
        let slot = self.slot_mut(op);
        if slot.is_outstanding() {
            *slot = Handshake::Idle;
        }
    }

    /// Entries to write for [`BulkOp::WriteEnergyHalfPage`].
    #[must_use]
    pub fn energy_write(&self) -> Option<&EnergyWrite> {
        self.energy_write.as_ref()
    }

    /// Sector to erase for [`BulkOp::EraseEnergySector`].
    #[must_use]
    pub fn erase_sector(&self) -> Option<u32> {
        self.erase_sector
    }

    pub(crate) fn request(&mut self, op: BulkOp) {
        *self.slot_mut(op) = Handshake::Requested;
        tracing::trace!(?op, "bulk request raised");
    }

    pub(crate) fn request_energy_write(&mut self, write: EnergyWrite) {
        self.energy_write = Some(write);
        self.request(BulkOp::WriteEnergyHalfPage);
    }

    pub(crate) fn request_erase(&mut self, sector: u32) {
        self.erase_sector = Some(sector);
        self.request(BulkOp::EraseEnergySector);
    }

    pub(crate) fn reset(&mut self, op: BulkOp) {
        *self.slot_mut(op) = Handshake::Idle;
        match op {
            BulkOp::WriteEnergyHalfPage => self.energy_write = None,
            BulkOp::EraseEnergySector => self.erase_sector = None,
            BulkOp::WriteTripWaveform
            | BulkOp::WriteAlarmWaveform
            | BulkOp::WriteExtendedWaveform => {}
        }
    }
}
