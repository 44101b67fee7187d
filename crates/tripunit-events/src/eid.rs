//! Event identifiers.

use core::num::NonZeroU32;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A monotonically increasing event identifier.
///
/// Zero is reserved on the medium for "empty slot", so an `Eid` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Eid(NonZeroU32);

impl Eid {
    /// The first identifier handed out after a full clear.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Wrap a raw value, `None` for zero.
    #[must_use]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Raw value.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The identifier after this one.
    ///
    /// Wraps to [`Eid::FIRST`] past `u32::MAX`, which no device lifetime reaches.
    #[must_use]
    pub fn next(self) -> Self {
        self.0.checked_add(1).map_or(Self::FIRST, Self)
    }
}

impl From<Eid> for u32 {
    fn from(eid: Eid) -> Self {
        eid.get()
    }
}

impl core::fmt::Display for Eid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw on-medium value of an optional identifier.
#[must_use]
pub fn raw_eid(eid: Option<Eid>) -> u32 {
    eid.map_or(0, Eid::get)
}
