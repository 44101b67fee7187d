//! Event timestamps.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Real-time clock reading: seconds plus a sub-second part in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timestamp {
    /// Whole seconds.
    pub seconds: u32,
    /// Nanoseconds within the second, below 1e9.
    pub nanos: u32,
}

impl Timestamp {
    /// The zero timestamp, written for never-captured fields.
    pub const ZERO: Self = Self {
        seconds: 0,
        nanos: 0,
    };

    /// Build a timestamp, normalizing nanoseconds above one second.
    #[must_use]
    pub fn new(seconds: u32, nanos: u32) -> Self {
        let carry = nanos / 1_000_000_000;
        Self {
            seconds: seconds.saturating_add(carry),
            nanos: nanos % 1_000_000_000,
        }
    }

    /// Build a timestamp from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::from_nanos(millis.saturating_mul(NANOS_PER_MILLI))
    }

    fn from_nanos(total: u64) -> Self {
        Self {
            seconds: u32::try_from(total / NANOS_PER_SEC).unwrap_or(u32::MAX),
            nanos: u32::try_from(total % NANOS_PER_SEC).unwrap_or(0),
        }
    }

    /// Total nanoseconds.
    #[must_use]
    pub fn as_nanos(&self) -> u64 {
        u64::from(self.seconds) * NANOS_PER_SEC + u64::from(self.nanos)
    }

    /// Whole milliseconds elapsed since `earlier`, zero if the clock went backwards.
    #[must_use]
    pub fn millis_since(&self, earlier: Self) -> u64 {
        self.as_nanos().saturating_sub(earlier.as_nanos()) / NANOS_PER_MILLI
    }

    /// This timestamp advanced by `millis`.
    #[must_use]
    pub fn add_millis(&self, millis: u64) -> Self {
        Self::from_nanos(
            self.as_nanos()
                .saturating_add(millis.saturating_mul(NANOS_PER_MILLI)),
        )
    }

    /// Whether this is the zero timestamp.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
