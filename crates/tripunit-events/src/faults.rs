//! Sticky integrity fault flags.

use crate::layout::{LogKind, RegisterSlot};

/// Registers that fell back to their defaults since the flags were last cleared.
///
/// Bit 0 is the master EID, bits 1..=8 the log cursors in [`LogKind::ALL`] order,
/// bit 9 the energy cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct IntegrityFaults(u16);

impl IntegrityFaults {
    /// No faults.
    pub const NONE: Self = Self(0);

    fn bit(slot: RegisterSlot) -> u16 {
        match slot {
            RegisterSlot::MasterEid => 1,
            RegisterSlot::Cursor(kind) => 1 << (kind as u16 + 1),
            RegisterSlot::EnergyCursor => 1 << 9,
        }
    }

    /// Raise the flag for `slot`.
    pub fn raise(&mut self, slot: RegisterSlot) {
        self.0 |= Self::bit(slot);
    }

    /// Whether the flag for `slot` is raised.
    #[must_use]
    pub fn contains(self, slot: RegisterSlot) -> bool {
        self.0 & Self::bit(slot) != 0
    }

    /// Whether any flag is raised.
    #[must_use]
    pub fn any(self) -> bool {
        self.0 != 0
    }

    /// Logs whose cursor was defaulted.
    pub fn defaulted_logs(self) -> impl Iterator<Item = LogKind> {
        LogKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(RegisterSlot::Cursor(*kind)))
    }

    /// Raw bitmask.
    #[must_use]
    pub fn bits(self) -> u16 {
        self.0
    }
}
