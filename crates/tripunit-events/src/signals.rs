//! Trigger signals raised from interrupt context.
//!
//! Protection code running in the sampling interrupt sets level and cancel bits
//! here; the foreground merges them once per cycle before the disturbance and
//! extended-capture state machines run. Every field is a single atomic, so a
//! signal is never observed half-written.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::coalescer::ExtendedCause;
use crate::disturbance::{DisturbanceInputs, DisturbanceParameter};

/// Every trigger bit shared with interrupt context.
#[derive(Debug, Default)]
pub struct TriggerSignals {
    levels: AtomicU32,
    cancels: AtomicU32,
    external_command: AtomicBool,
    external_command_cancel: AtomicBool,
    short_delay: AtomicBool,
    short_delay_cancel: AtomicBool,
    ground_fault: AtomicBool,
    ground_fault_cancel: AtomicBool,
    extended_requests: AtomicU8,
}

impl TriggerSignals {
    /// No signal raised.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            levels: AtomicU32::new(0),
            cancels: AtomicU32::new(0),
            external_command: AtomicBool::new(false),
            external_command_cancel: AtomicBool::new(false),
            short_delay: AtomicBool::new(false),
            short_delay_cancel: AtomicBool::new(false),
            ground_fault: AtomicBool::new(false),
            ground_fault_cancel: AtomicBool::new(false),
            extended_requests: AtomicU8::new(0),
        }
    }

    /// Raise or clear the level bit of `parameter`.
    ///
    /// The external-command, short-delay and ground-fault bits are overwritten
    /// each cycle by their dedicated signals.
    pub fn set_level(&self, parameter: DisturbanceParameter, active: bool) {
        if active {
            self.levels.fetch_or(parameter.bit(), Ordering::AcqRel);
        } else {
            self.levels.fetch_and(!parameter.bit(), Ordering::AcqRel);
        }
    }

    /// Cancel the episode of `parameter` at the next cycle.
    pub fn cancel(&self, parameter: DisturbanceParameter) {
        self.cancels.fetch_or(parameter.bit(), Ordering::AcqRel);
    }

    /// Cancel every episode at the next cycle.
    pub fn cancel_all(&self) {
        self.cancels.fetch_or(u32::MAX >> 12, Ordering::AcqRel);
    }

    /// Set the external capture command level.
    pub fn set_external_command(&self, active: bool) {
        self.external_command.store(active, Ordering::Release);
    }

    /// Cancel the external capture command episode.
    pub fn cancel_external_command(&self) {
        self.external_command_cancel.store(true, Ordering::Release);
    }

    /// Set the short-delay pickup level.
    pub fn set_short_delay(&self, active: bool) {
        self.short_delay.store(active, Ordering::Release);
    }

    /// Cancel the short-delay pickup episode.
    pub fn cancel_short_delay(&self) {
        self.short_delay_cancel.store(true, Ordering::Release);
    }

    /// Set the ground-fault pickup level.
    pub fn set_ground_fault(&self, active: bool) {
        self.ground_fault.store(active, Ordering::Release);
    }

    /// Cancel the ground-fault pickup episode.
    pub fn cancel_ground_fault(&self) {
        self.ground_fault_cancel.store(true, Ordering::Release);
    }

    /// Request an extended capture for `cause`.
    ///
    /// Raise this once per occurrence: every request seen while a session for
    /// the same cause runs is logged as a summary-only event.
    pub fn request_extended_capture(&self, cause: ExtendedCause) {
        self.extended_requests.fetch_or(cause.bit(), Ordering::AcqRel);
    }

    /// Current level bits.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.levels.load(Ordering::Acquire)
    }

    /// Whether any level bit is set.
    #[must_use]
    pub fn any_level(&self) -> bool {
        self.levels() != 0
    }

    /// Fold the dedicated signals into the masks and take this cycle's cancels.
    ///
    /// A cancelled parameter also has its level bit cleared.
    pub(crate) fn merge(&self) -> DisturbanceInputs {
        let dedicated = [
            (
                &self.external_command,
                &self.external_command_cancel,
                DisturbanceParameter::GooseCapture,
            ),
            (
                &self.short_delay,
                &self.short_delay_cancel,
                DisturbanceParameter::ShortDelayPickup,
            ),
            (
                &self.ground_fault,
                &self.ground_fault_cancel,
                DisturbanceParameter::GroundFault,
            ),
        ];
        for (level, cancel, parameter) in dedicated {
            self.set_level(parameter, level.load(Ordering::Acquire));
            if cancel.swap(false, Ordering::AcqRel) {
                self.cancel(parameter);
            }
        }
        let cancels = self.cancels.swap(0, Ordering::AcqRel);
        if cancels != 0 {
            self.levels.fetch_and(!cancels, Ordering::AcqRel);
        }
        DisturbanceInputs {
            levels: self.levels(),
            cancels,
        }
    }

    /// Take the pending extended-capture requests.
    pub(crate) fn take_extended_requests(&self) -> u8 {
        self.extended_requests.swap(0, Ordering::AcqRel)
    }

    /// Drop every level, cancel and request.
    pub(crate) fn reset(&self) {
        self.levels.store(0, Ordering::Release);
        self.external_command.store(false, Ordering::Release);
        self.short_delay.store(false, Ordering::Release);
        self.ground_fault.store(false, Ordering::Release);
        self.external_command_cancel.store(false, Ordering::Release);
        self.short_delay_cancel.store(false, Ordering::Release);
        self.ground_fault_cancel.store(false, Ordering::Release);
        self.extended_requests.store(0, Ordering::Release);
        self.cancels.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedicated_signals_override_level_bits() {
        let signals = TriggerSignals::new();
        signals.set_level(DisturbanceParameter::ShortDelayPickup, true);
        signals.set_ground_fault(true);
        let inputs = signals.merge();
        assert_eq!(inputs.levels, DisturbanceParameter::GroundFault.bit());
        assert_eq!(inputs.cancels, 0);
    }

    #[test]
    fn test_cancel_clears_level_and_is_one_shot() {
        let signals = TriggerSignals::new();
        signals.set_level(DisturbanceParameter::Overvoltage, true);
        signals.cancel(DisturbanceParameter::Overvoltage);
        let first = signals.merge();
        assert_eq!(first.levels, 0);
        assert_eq!(first.cancels, DisturbanceParameter::Overvoltage.bit());
        assert_eq!(signals.merge().cancels, 0);
    }

    #[test]
    fn test_dedicated_cancel_reaches_mask() {
        let signals = TriggerSignals::new();
        signals.set_short_delay(true);
        signals.cancel_short_delay();
        let inputs = signals.merge();
        assert_eq!(inputs.cancels, DisturbanceParameter::ShortDelayPickup.bit());
        assert_eq!(inputs.levels, 0);
    }

    #[test]
    fn test_cancel_all_covers_every_parameter() {
        let signals = TriggerSignals::new();
        signals.cancel_all();
        let inputs = signals.merge();
        for parameter in DisturbanceParameter::ALL {
            assert_ne!(inputs.cancels & parameter.bit(), 0, "{parameter}");
        }
    }

    #[test]
    fn test_extended_requests_are_taken_once() {
        let signals = TriggerSignals::new();
        signals.request_extended_capture(ExtendedCause::Overvoltage);
        signals.request_extended_capture(ExtendedCause::HighLoad2);
        assert_eq!(signals.take_extended_requests(), 0b1_0010);
        assert_eq!(signals.take_extended_requests(), 0);
    }

    #[test]
    fn test_reset_drops_everything() {
        let signals = TriggerSignals::new();
        signals.set_level(DisturbanceParameter::PhaseLoss, true);
        signals.set_ground_fault(true);
        signals.cancel_all();
        signals.request_extended_capture(ExtendedCause::GooseCapture);
        signals.reset();
        assert_eq!(signals.merge(), DisturbanceInputs::default());
        assert_eq!(signals.take_extended_requests(), 0);
    }
}
