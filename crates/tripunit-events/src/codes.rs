//! Event codes and their dispatch categories.
//!
//! Codes are grouped in contiguous ranges; the range decides which logs an
//! event is written to.
//!
//! | range      | category          |
//! |------------|-------------------|
//! | 1..=96     | summary           |
//! | 97..=128   | trip              |
//! | 129..=157  | alarm             |
//! | 158..=189  | extended capture  |
//! | 190..=219  | disturbance       |
//! | 220..=236  | summary (diagnostics) |
//! | 245        | energy log        |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An event code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EventCode(u8);

impl EventCode {
    /// No event. Never admitted.
    pub const NO_EVENT: Self = Self(0);
    /// Power up with a valid real-time clock.
    pub const POWER_UP_RTC_GOOD: Self = Self(1);
    /// Power up with an invalid real-time clock.
    pub const POWER_UP_RTC_BAD: Self = Self(2);
    /// Setpoints downloaded.
    pub const SETPOINTS_DOWNLOAD: Self = Self(3);
    /// Maintenance mode entered.
    pub const ENTER_MAINTENANCE_MODE: Self = Self(18);
    /// Maintenance mode exited.
    pub const EXIT_MAINTENANCE_MODE: Self = Self(19);
    /// Non-volatile memory fault detected.
    pub const NV_MEMORY_ERROR: Self = Self(47);
    /// Long-delay pickup entered. Starts the long-delay disturbance track.
    pub const LDPU_ENTRY: Self = Self(63);
    /// Short-delay pickup entered. Starts the short-delay disturbance track.
    pub const SDPU_ENTRY: Self = Self(65);
    /// Undervoltage pickup.
    pub const UV_PICKUP: Self = Self(83);
    /// Ground-fault pickup, the last summary-only code.
    pub const GF_PICKUP: Self = Self(96);
    /// Long-delay trip.
    pub const TRIP_LONG_DELAY: Self = Self(98);
    /// Short-delay trip.
    pub const TRIP_SHORT_DELAY: Self = Self(99);
    /// Instantaneous trip.
    pub const TRIP_INSTANTANEOUS: Self = Self(100);
    /// Ground-fault trip.
    pub const TRIP_GROUND_FAULT: Self = Self(127);
    /// Last trip code.
    pub const TRIP_MCR: Self = Self(128);
    /// First alarm code.
    pub const ALARM_MECHANICAL: Self = Self(130);
    /// Ground-fault alarm. Sets the ground-fault disturbance origin.
    pub const ALARM_GROUND_FAULT: Self = Self(132);
    /// Overvoltage alarm entry.
    pub const ALARM_OVERVOLTAGE: Self = Self(141);
    /// Last alarm code.
    pub const ALARM_GOOSE_CAPTURE: Self = Self(157);
    /// First composite extended-capture code.
    pub const EXTCAP_GOOSE_CAPTURE: Self = Self(180);
    /// Offset from a composite extended-capture code to its summary-only variant.
    pub const EXTCAP_SUMMARY_ONLY_OFFSET: u8 = 5;
    /// First disturbance exit code.
    pub const DISTURBANCE_EXIT_BASE: Self = Self(200);
    /// Manual trip test.
    pub const TRIP_TEST: Self = Self(235);
    /// Demand / energy log entry.
    pub const DEMAND_EVENT: Self = Self(245);
    /// Highest admissible code.
    pub const MAX: Self = Self(246);

    /// Wrap a raw code.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw code.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Whether this code may be admitted into the pending queue.
    #[must_use]
    pub fn is_admissible(self) -> bool {
        self.0 > Self::NO_EVENT.0 && self.0 <= Self::MAX.0
    }

    /// Dispatch category by code range.
    #[must_use]
    pub fn category(self) -> EventCategory {
        match self.0 {
            1..=96 => EventCategory::Summary,
            97..=128 => EventCategory::Trip,
            129..=157 => EventCategory::Alarm,
            158..=189 => EventCategory::ExtendedCapture,
            190..=219 => EventCategory::Disturbance,
            245 => EventCategory::EnergyLog,
            220..=236 => EventCategory::Summary,
            _ => EventCategory::Unknown,
        }
    }

    /// Whether an extended-capture code also writes a snapshot.
    #[must_use]
    pub fn is_composite_extended(self) -> bool {
        (180..=184).contains(&self.0)
    }

    /// Disturbance track index for a disturbance exit code.
    #[must_use]
    pub fn disturbance_index(self) -> Option<usize> {
        (200..=219)
            .contains(&self.0)
            .then(|| usize::from(self.0 - Self::DISTURBANCE_EXIT_BASE.0))
    }
}

impl From<u8> for EventCode {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl From<EventCode> for u8 {
    fn from(code: EventCode) -> Self {
        code.0
    }
}

impl core::fmt::Display for EventCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.0, self.category())
    }
}

/// Which dispatch path an event takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventCategory {
    /// Summary record only.
    Summary = 0,
    /// Summary plus trip snapshot; arms the trip waveform header.
    Trip = 1,
    /// Summary plus alarm snapshot; arms the alarm waveform header.
    Alarm = 2,
    /// Summary, optionally an extended snapshot; arms the extended waveform header.
    ExtendedCapture = 3,
    /// Summary plus disturbance statistics.
    Disturbance = 4,
    /// Demand / energy entry written through the bulk store.
    EnergyLog = 5,
    /// Unrecognized; dropped at `Finish`.
    Unknown = 6,
}

impl EventCategory {
    /// Category name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Trip => "Trip",
            Self::Alarm => "Alarm",
            Self::ExtendedCapture => "ExtendedCapture",
            Self::Disturbance => "Disturbance",
            Self::EnergyLog => "EnergyLog",
            Self::Unknown => "Unknown",
        }
    }
}

impl core::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
