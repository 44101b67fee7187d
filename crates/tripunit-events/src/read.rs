//! Read-side projections over the logs.
//!
//! Nothing here mutates engine state. Waveform header logs keep the slot at the
//! next index erased for the capture being written, so they expose at most
//! `capacity - 1` records and, once full, start one slot after the next index.

use tripunit_nvram::{IndexedLog, PersistentStore, RecordReader, find_eid};

use crate::eid::Eid;
use crate::engine::EventEngine;
use crate::error::{EventError, EventResult};
use crate::layout::{LogKind, RmsRegion};
use crate::ports::{MeteringSnapshot, ProtectionStatus, RealTimeClock, RmsWindow};
use crate::records::{DisturbanceRecord, Record, RmsSample, SnapshotRecord, SummaryRecord};
use crate::time::Timestamp;

/// Most records one [`EventEngine::read_range`] call returns.
pub const MAX_RANGE: u16 = 20;

/// Most headers one [`EventEngine::read_snapshot_headers`] call returns.
pub const MAX_SNAPSHOT_HEADERS: u16 = 12;

/// Most records one [`EventEngine::read_disturbances`] call returns.
pub const MAX_DISTURBANCES: u16 = 5;

/// Occupancy of a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogInfo {
    /// Records readable.
    pub count: u32,
    /// EID of the oldest readable record.
    pub earliest_eid: Option<Eid>,
    /// EID of the newest readable record.
    pub latest_eid: Option<Eid>,
}

/// Which record a range ends at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStart {
    /// The record `n` places before the newest (0 is the newest).
    Newest(u16),
    /// The record carrying this EID.
    Eid(Eid),
}

/// Records returned by a range read, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPage<R> {
    /// The records.
    pub records: Vec<R>,
    /// EID just before the window, or the first record's own EID at the oldest end.
    pub previous_eid: u32,
    /// EID just after the window, or the last record's own EID at the newest end.
    pub next_eid: u32,
}

impl<R> RecordPage<R> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            previous_eid: 0,
            next_eid: 0,
        }
    }
}

/// Header EIDs of a waveform log, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaveformEids {
    /// Header EIDs.
    pub eids: Vec<u32>,
    /// Position of the searched EID in `eids`.
    pub found_index: Option<u16>,
}

/// The RMS region header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedCaptureInfo {
    /// EID of the last completed session.
    pub eid: Option<Eid>,
    /// Time of the first one-cycle sample.
    pub one_cycle_start: Timestamp,
    /// Time of the first two-hundred-millisecond sample.
    pub two_hundred_ms_start: Timestamp,
    /// One-cycle samples stored.
    pub one_cycle_samples: u16,
    /// Two-hundred-millisecond samples stored.
    pub two_hundred_ms_samples: u16,
}

/// Readable window of one log in slot terms.
#[derive(Debug, Clone, Copy)]
struct LogView {
    earliest: u16,
    count: u16,
    capacity: u16,
}

impl LogView {
    fn of(log: &IndexedLog, kind: LogKind) -> Self {
        let capacity = log.capacity();
        if !kind.is_waveform() {
            return Self {
                earliest: log.earliest_index(),
                count: log.num_events(),
                capacity,
            };
        }
        let visible = capacity.saturating_sub(1);
        let earliest = if log.num_events() > visible {
            Self::wrap(log.next_index(), 1, capacity)
        } else {
            0
        };
        Self {
            earliest,
            count: log.num_events().min(visible),
            capacity,
        }
    }

    fn wrap(index: u16, by: u16, capacity: u16) -> u16 {
        let wrapped = (u32::from(index) + u32::from(by)) % u32::from(capacity.max(1));
        u16::try_from(wrapped).unwrap_or(0)
    }

    /// Slot of the `age`-th oldest readable record.
    fn index_at(&self, age: u16) -> Option<u16> {
        (age < self.count).then(|| Self::wrap(self.earliest, age, self.capacity))
    }

    /// Age of the record in `index`, if it is readable.
    fn age_of(&self, index: u16) -> Option<u16> {
        if index >= self.capacity {
            return None;
        }
        let capacity = u32::from(self.capacity);
        let age = (u32::from(index) + capacity - u32::from(self.earliest)) % capacity;
        let age = u16::try_from(age).ok()?;
        (age < self.count).then_some(age)
    }

    /// Age of the record `offset` places before the newest.
    fn age_from_newest(&self, offset: u16) -> Option<u16> {
        self.count.checked_sub(1)?.checked_sub(offset)
    }
}

impl<S, C, M, P> EventEngine<S, C, M, P>
where
    S: PersistentStore,
    C: RealTimeClock,
    M: MeteringSnapshot,
    P: ProtectionStatus,
{
    /// Count and boundary EIDs of `kind`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn log_info(&self, kind: LogKind) -> EventResult<LogInfo> {
        let log = self.logs.get(kind);
        let view = LogView::of(log, kind);
        let eid_at = |age: Option<u16>| -> EventResult<Option<Eid>> {
            match age.and_then(|age| view.index_at(age)) {
                Some(index) => Ok(Eid::new(log.read_eid(&self.store, index)?)),
                None => Ok(None),
            }
        };
        Ok(LogInfo {
            count: u32::from(view.count),
            earliest_eid: eid_at(Some(0))?,
            latest_eid: eid_at(view.age_from_newest(0))?,
        })
    }

    /// Entry count of the energy log. The energy log has no EID index.
    #[must_use]
    pub fn energy_log_info(&self) -> LogInfo {
        LogInfo {
            count: self.energy.entries,
            earliest_eid: None,
            latest_eid: None,
        }
    }

    /// Up to `count` records of `kind` ending at `start`, oldest first.
    ///
    /// The window is clamped at the oldest record. An EID that is not in the
    /// log gives an empty page.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidRequest`] for a count outside
    /// `1..=`[`MAX_RANGE`], [`EventError::UnsupportedLog`] if `R` is not the
    /// record type of `kind`, and propagates store errors.
    pub fn read_range<R: Record>(
        &self,
        kind: LogKind,
        start: RangeStart,
        count: u16,
    ) -> EventResult<RecordPage<R>> {
        if count == 0 || count > MAX_RANGE {
            return Err(EventError::invalid_request(format!(
                "range of {count} records, expected 1..={MAX_RANGE}"
            )));
        }
        let log = self.logs.get(kind);
        if R::LEN != log.geometry().record_size() {
            return Err(EventError::UnsupportedLog(kind));
        }
        let view = LogView::of(log, kind);
        let last = match start {
            RangeStart::Newest(offset) => view.age_from_newest(offset),
            RangeStart::Eid(eid) => {
                find_eid(log, &self.store, eid.get())?.and_then(|index| view.age_of(index))
            }
        };
        let Some(last) = last else {
            return Ok(RecordPage::empty());
        };
        let first = last.saturating_sub(count.saturating_sub(1));

        let bytes = self.read_window(log, &view, first, last)?;
        let records = bytes
            .chunks_exact(usize::from(R::LEN))
            .map(R::read_from)
            .collect::<Result<Vec<_>, _>>()?;

        let before = first.checked_sub(1).unwrap_or(first);
        let after = if last.saturating_add(1) < view.count {
            last.saturating_add(1)
        } else {
            last
        };
        Ok(RecordPage {
            records,
            previous_eid: self.eid_at_age(log, &view, before)?,
            next_eid: self.eid_at_age(log, &view, after)?,
        })
    }

    /// The snapshot record carrying `eid`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnsupportedLog`] unless `kind` is a snapshot log and
    /// propagates store errors.
    pub fn read_snapshot(&self, kind: LogKind, eid: Eid) -> EventResult<Option<SnapshotRecord>> {
        if !kind.is_snapshot() {
            return Err(EventError::UnsupportedLog(kind));
        }
        let log = self.logs.get(kind);
        let Some(index) = find_eid(log, &self.store, eid.get())? else {
            return Ok(None);
        };
        let mut buf = [0u8; SnapshotRecord::LEN as usize];
        log.read_by_index(&self.store, index, &mut buf)?;
        Ok(Some(SnapshotRecord::read_from(&buf)?))
    }

    /// Headers of up to `count` records of `kind`, newest first, skipping the
    /// newest `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnsupportedLog`] unless `kind` is the summary log or
    /// a snapshot log, [`EventError::InvalidRequest`] for a count outside
    /// `1..=`[`MAX_SNAPSHOT_HEADERS`], and propagates store errors.
    pub fn read_snapshot_headers(
        &self,
        kind: LogKind,
        offset: u16,
        count: u16,
    ) -> EventResult<Vec<SummaryRecord>> {
        if !(kind.is_snapshot() || kind == LogKind::Summary) {
            return Err(EventError::UnsupportedLog(kind));
        }
        if count == 0 || count > MAX_SNAPSHOT_HEADERS {
            return Err(EventError::invalid_request(format!(
                "{count} headers, expected 1..={MAX_SNAPSHOT_HEADERS}"
            )));
        }
        let log = self.logs.get(kind);
        let view = LogView::of(log, kind);
        let mut headers = Vec::with_capacity(usize::from(count));
        for step in 0..count {
            let Some(index) = view
                .age_from_newest(offset.saturating_add(step))
                .and_then(|age| view.index_at(age))
            else {
                break;
            };
            let mut buf = [0u8; SummaryRecord::LEN as usize];
            log.read_by_index(&self.store, index, &mut buf)?;
            headers.push(SummaryRecord::read_from(&buf)?);
        }
        Ok(headers)
    }

    /// Up to `count` disturbance records ending at `start`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidRequest`] for a count outside
    /// `1..=`[`MAX_DISTURBANCES`] and propagates store errors.
    pub fn read_disturbances(
        &self,
        start: RangeStart,
        count: u16,
    ) -> EventResult<RecordPage<DisturbanceRecord>> {
        if count > MAX_DISTURBANCES {
            return Err(EventError::invalid_request(format!(
                "{count} disturbance records, expected 1..={MAX_DISTURBANCES}"
            )));
        }
        self.read_range(LogKind::Disturbance, start, count)
    }

    /// Newest disturbance record whose episode was started by `origin`.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn read_disturbance_by_origin(
        &self,
        origin: Eid,
    ) -> EventResult<Option<DisturbanceRecord>> {
        let log = self.logs.get(LogKind::Disturbance);
        let view = LogView::of(log, LogKind::Disturbance);
        let mut buf = [0u8; DisturbanceRecord::LEN as usize];
        for offset in 0..view.count {
            let Some(index) = view
                .age_from_newest(offset)
                .and_then(|age| view.index_at(age))
            else {
                break;
            };
            log.read_by_index(&self.store, index, &mut buf)?;
            let record = DisturbanceRecord::read_from(&buf)?;
            if record.origin_eid == origin.get() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Every readable header EID of waveform log `kind`, oldest first, and the
    /// position of `search` among them.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::UnsupportedLog`] unless `kind` is a waveform log and
    /// propagates store errors.
    pub fn read_waveform_eids(
        &self,
        kind: LogKind,
        search: Option<Eid>,
    ) -> EventResult<WaveformEids> {
        if !kind.is_waveform() {
            return Err(EventError::UnsupportedLog(kind));
        }
        let log = self.logs.get(kind);
        let view = LogView::of(log, kind);
        let mut eids = Vec::with_capacity(usize::from(view.count));
        for age in 0..view.count {
            eids.push(self.eid_at_age(log, &view, age)?);
        }
        let found_index = search
            .and_then(|search| eids.iter().position(|eid| *eid == search.get()))
            .and_then(|position| u16::try_from(position).ok());
        Ok(WaveformEids { eids, found_index })
    }

    /// The RMS region header.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn extended_capture_info(&self) -> EventResult<ExtendedCaptureInfo> {
        let rms = self.map.rms();
        let mut header = [0u8; RmsRegion::HEADER_LEN as usize];
        self.store.read(rms.base(), &mut header)?;
        let mut reader = RecordReader::new(&header);
        Ok(ExtendedCaptureInfo {
            eid: Eid::new(reader.u32()?),
            one_cycle_start: Timestamp {
                seconds: reader.u32()?,
                nanos: reader.u32()?,
            },
            two_hundred_ms_start: Timestamp {
                seconds: reader.u32()?,
                nanos: reader.u32()?,
            },
            one_cycle_samples: reader.u16()?,
            two_hundred_ms_samples: reader.u16()?,
        })
    }

    /// Up to `count` stored RMS samples of `window` starting at sample `start`.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::InvalidRequest`] for a `start` past the window's
    /// capacity and propagates store errors.
    pub fn read_rms_samples(
        &self,
        window: RmsWindow,
        start: u16,
        count: u16,
    ) -> EventResult<Vec<RmsSample>> {
        let rms = self.map.rms();
        let (base, capacity) = match window {
            RmsWindow::OneCycle => (rms.one_cycle_base, rms.one_cycle_capacity),
            RmsWindow::TwoHundredMs => (rms.two_hundred_base, rms.two_hundred_capacity),
        };
        if start >= capacity {
            return Err(EventError::invalid_request(format!(
                "{} sample {start} past capacity {capacity}",
                window.as_str()
            )));
        }
        let info = self.extended_capture_info()?;
        let stored = match window {
            RmsWindow::OneCycle => info.one_cycle_samples,
            RmsWindow::TwoHundredMs => info.two_hundred_ms_samples,
        }
        .min(capacity);
        let available = stored.saturating_sub(start).min(count);
        let len = usize::from(RmsSample::LEN);
        let mut bytes = vec![0u8; usize::from(available).saturating_mul(len)];
        if available > 0 {
            let offset = u32::from(start).saturating_mul(u32::from(RmsSample::LEN));
            self.store.read(base.saturating_add(offset), &mut bytes)?;
        }
        Ok(bytes
            .chunks_exact(len)
            .map(RmsSample::read_from)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Raw bytes of the records aged `first..=last`, split at the wrap.
    fn read_window(
        &self,
        log: &IndexedLog,
        view: &LogView,
        first: u16,
        last: u16,
    ) -> EventResult<Vec<u8>> {
        let record = usize::from(log.geometry().record_size());
        let total = last.saturating_sub(first).saturating_add(1);
        let Some(start) = view.index_at(first) else {
            return Ok(Vec::new());
        };
        let before_wrap = total.min(view.capacity.saturating_sub(start));
        let after_wrap = total.saturating_sub(before_wrap);

        let mut bytes = vec![0u8; usize::from(total).saturating_mul(record)];
        let (head, tail) = bytes.split_at_mut(usize::from(before_wrap).saturating_mul(record));
        log.read_contiguous(&self.store, start, before_wrap, head)?;
        log.read_contiguous(&self.store, 0, after_wrap, tail)?;
        Ok(bytes)
    }

    fn eid_at_age(&self, log: &IndexedLog, view: &LogView, age: u16) -> EventResult<u32> {
        match view.index_at(age) {
            Some(index) => Ok(log.read_eid(&self.store, index)?),
            None => Ok(0),
        }
    }
}
