//! The eight indexed logs, keyed by [`LogKind`].

use tripunit_nvram::{CopySource, IndexedLog, LogCursor, PersistentStore};

use crate::error::EventResult;
use crate::faults::IntegrityFaults;
use crate::layout::{LogKind, MemoryMap, RegisterSlot};

#[derive(Debug, Clone)]
pub(crate) struct LogSet {
    summary: IndexedLog,
    trip: IndexedLog,
    alarm: IndexedLog,
    disturbance: IndexedLog,
    extended: IndexedLog,
    trip_waveform: IndexedLog,
    alarm_waveform: IndexedLog,
    extended_waveform: IndexedLog,
}

impl LogSet {
    /// Open every log, raising a fault for each cursor that had to be defaulted.
    pub(crate) fn open<S: PersistentStore + ?Sized>(
        map: &MemoryMap,
        store: &S,
        faults: &mut IntegrityFaults,
    ) -> EventResult<Self> {
        let mut open = |kind: LogKind| -> EventResult<IndexedLog> {
            let register = map.register(RegisterSlot::Cursor(kind), LogCursor::EMPTY)?;
            let log = IndexedLog::open(map.geometry(kind), register, store)?;
            match log.opened_from() {
                CopySource::Defaulted => {
                    faults.raise(RegisterSlot::Cursor(kind));
                    tracing::warn!(%kind, "log cursor lost, log reset to empty");
                }
                CopySource::Mirror => {
                    tracing::warn!(%kind, "log cursor recovered from mirror copy");
                }
                CopySource::Primary => {}
            }
            Ok(log)
        };
        Ok(Self {
            summary: open(LogKind::Summary)?,
            trip: open(LogKind::Trip)?,
            alarm: open(LogKind::Alarm)?,
            disturbance: open(LogKind::Disturbance)?,
            extended: open(LogKind::Extended)?,
            trip_waveform: open(LogKind::TripWaveform)?,
            alarm_waveform: open(LogKind::AlarmWaveform)?,
            extended_waveform: open(LogKind::ExtendedWaveform)?,
        })
    }

    pub(crate) fn get(&self, kind: LogKind) -> &IndexedLog {
        match kind {
            LogKind::Summary => &self.summary,
            LogKind::Trip => &self.trip,
            LogKind::Alarm => &self.alarm,
            LogKind::Disturbance => &self.disturbance,
            LogKind::Extended => &self.extended,
            LogKind::TripWaveform => &self.trip_waveform,
            LogKind::AlarmWaveform => &self.alarm_waveform,
            LogKind::ExtendedWaveform => &self.extended_waveform,
        }
    }

    pub(crate) fn get_mut(&mut self, kind: LogKind) -> &mut IndexedLog {
        match kind {
            LogKind::Summary => &mut self.summary,
            LogKind::Trip => &mut self.trip,
            LogKind::Alarm => &mut self.alarm,
            LogKind::Disturbance => &mut self.disturbance,
            LogKind::Extended => &mut self.extended,
            LogKind::TripWaveform => &mut self.trip_waveform,
            LogKind::AlarmWaveform => &mut self.alarm_waveform,
            LogKind::ExtendedWaveform => &mut self.extended_waveform,
        }
    }
}
