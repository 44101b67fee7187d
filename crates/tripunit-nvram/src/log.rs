//! Fixed-capacity circular record logs.
//!
//! A log is a run of `capacity` equally sized slots starting at a base address,
//! plus a [`LogCursor`] kept in a [`PersistentRegister`]. Appends write the slot at
//! `next_index` and then persist the advanced cursor. A slot written without its
//! cursor update is never counted, so a power loss can lose the newest record but
//! cannot corrupt the index.
//!
//! ```text
//!  capacity 5, seven appends (EIDs 10..=16)
//!
//!   index:   0    1    2    3    4
//!          [15] [16] [12] [13] [14]
//!                ^    ^
//!            latest   next == earliest
//! ```

use crate::error::{NvError, NvResult};
use crate::register::{Complemented, CopySource, PersistentRegister};
use crate::store::PersistentStore;

/// Size of the EID field every record carries.
pub const EID_LEN: u16 = 4;

/// Placement and shape of one circular log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogGeometry {
    base: u32,
    record_size: u16,
    capacity: u16,
    eid_offset: u16,
}

impl LogGeometry {
    /// Describe a log of `capacity` records of `record_size` bytes at `base`.
    ///
    /// The EID is expected at byte offset 0; see [`LogGeometry::with_eid_offset`].
    ///
    /// # Errors
    ///
    /// Returns [`NvError::InvalidGeometry`] if the capacity is below two, the record
    /// cannot hold an EID, or the log would run past the 32-bit address space.
    pub fn new(base: u32, record_size: u16, capacity: u16) -> NvResult<Self> {
        if capacity < 2 {
            return Err(NvError::invalid_geometry(format!(
                "capacity {capacity} is below the minimum of 2"
            )));
        }
        if record_size < EID_LEN {
            return Err(NvError::invalid_geometry(format!(
                "record size {record_size} cannot hold an EID"
            )));
        }
        let len = u32::from(record_size).saturating_mul(u32::from(capacity));
        if base.checked_add(len).is_none() {
            return Err(NvError::invalid_geometry(format!(
                "log at {base:#x} of {len} bytes overflows the address space"
            )));
        }
        Ok(Self {
            base,
            record_size,
            capacity,
            eid_offset: 0,
        })
    }

    /// Place the EID field at `offset` within each record.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::InvalidGeometry`] if the field would run past the record.
    pub fn with_eid_offset(mut self, offset: u16) -> NvResult<Self> {
        if offset.saturating_add(EID_LEN) > self.record_size {
            return Err(NvError::invalid_geometry(format!(
                "EID offset {offset} does not fit record size {}",
                self.record_size
            )));
        }
        self.eid_offset = offset;
        Ok(self)
    }

    /// First byte of slot 0.
    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Bytes per slot.
    #[must_use]
    pub fn record_size(&self) -> u16 {
        self.record_size
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Offset of the EID within each record.
    #[must_use]
    pub fn eid_offset(&self) -> u16 {
        self.eid_offset
    }

    /// Total bytes covered by the slots.
    #[must_use]
    pub fn byte_len(&self) -> u32 {
        u32::from(self.record_size).saturating_mul(u32::from(self.capacity))
    }

    /// One past the last byte of the log.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.base.saturating_add(self.byte_len())
    }

    /// Whether two logs share any byte.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.base < other.end() && other.base < self.end()
    }

    /// Address of slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::IndexOutOfRange`] if `index >= capacity`.
    pub fn slot_address(&self, index: u16) -> NvResult<u32> {
        if index >= self.capacity {
            return Err(NvError::IndexOutOfRange {
                index,
                capacity: self.capacity,
            });
        }
        Ok(self
            .base
            .saturating_add(u32::from(index).saturating_mul(u32::from(self.record_size))))
    }
}

/// Persisted position of a log: where the next record goes and how many are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogCursor {
    /// Slot the next append writes.
    pub next_index: u16,
    /// Records held, saturating at the capacity.
    pub num_events: u16,
}

impl LogCursor {
    /// A log with nothing in it.
    pub const EMPTY: Self = Self {
        next_index: 0,
        num_events: 0,
    };

    /// Whether this cursor is consistent with a log of `capacity` slots.
    #[must_use]
    pub fn fits(&self, capacity: u16) -> bool {
        self.next_index < capacity && self.num_events <= capacity
    }

    /// Cursor after one more append to a log of `capacity` slots.
    #[must_use]
    pub fn advanced(&self, capacity: u16) -> Self {
        let next = self.next_index.saturating_add(1);
        Self {
            next_index: if next >= capacity { 0 } else { next },
            num_events: self.num_events.saturating_add(1).min(capacity),
        }
    }
}

impl Complemented for LogCursor {
    fn to_word(self) -> u32 {
        u32::from(self.next_index) | (u32::from(self.num_events) << 16)
    }

    fn from_word(word: u32) -> Self {
        Self {
            next_index: (word & 0xFFFF) as u16,
            num_events: (word >> 16) as u16,
        }
    }
}

/// A circular log bound to its geometry and cursor register.
#[derive(Debug, Clone)]
pub struct IndexedLog {
    geometry: LogGeometry,
    register: PersistentRegister<LogCursor>,
    cursor: LogCursor,
    opened_from: CopySource,
}

impl IndexedLog {
    /// Load the cursor from `store` and bind it to `geometry`.
    ///
    /// A cursor that fails both complement checks, or that passes them but does
    /// not fit the geometry, is replaced by [`LogCursor::EMPTY`] and the log
    /// reports [`CopySource::Defaulted`] from [`IndexedLog::opened_from`].
    ///
    /// # Errors
    ///
    /// Propagates store read errors.
    pub fn open<S: PersistentStore + ?Sized>(
        geometry: LogGeometry,
        register: PersistentRegister<LogCursor>,
        store: &S,
    ) -> NvResult<Self> {
        let loaded = register.load(store)?;
        let (cursor, opened_from) = if loaded.value.fits(geometry.capacity) {
            (loaded.value, loaded.source)
        } else {
            tracing::warn!(
                base = geometry.base,
                next_index = loaded.value.next_index,
                num_events = loaded.value.num_events,
                capacity = geometry.capacity,
                "log cursor does not fit its geometry, resetting"
            );
            (LogCursor::EMPTY, CopySource::Defaulted)
        };
        Ok(Self {
            geometry,
            register,
            cursor,
            opened_from,
        })
    }

    /// Geometry of this log.
    #[must_use]
    pub fn geometry(&self) -> &LogGeometry {
        &self.geometry
    }

    /// Current cursor.
    #[must_use]
    pub fn cursor(&self) -> LogCursor {
        self.cursor
    }

    /// Which register copy supplied the cursor at open.
    #[must_use]
    pub fn opened_from(&self) -> CopySource {
        self.opened_from
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> u16 {
        self.geometry.capacity
    }

    /// Slot the next append writes.
    #[must_use]
    pub fn next_index(&self) -> u16 {
        self.cursor.next_index
    }

    /// Records currently held.
    #[must_use]
    pub fn num_events(&self) -> u16 {
        self.cursor.num_events
    }

    /// Whether the log holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.num_events == 0
    }

    /// Whether the log has filled and the next append overwrites the oldest record.
    #[must_use]
    pub fn is_rolled_over(&self) -> bool {
        self.cursor.num_events >= self.geometry.capacity
    }

    /// Slot of the oldest record: 0 before rollover, `next_index` after.
    #[must_use]
    pub fn earliest_index(&self) -> u16 {
        if self.is_rolled_over() {
            self.cursor.next_index
        } else {
            0
        }
    }

    /// Slot of the newest record, `None` while empty.
    #[must_use]
    pub fn latest_index(&self) -> Option<u16> {
        if self.is_empty() {
            return None;
        }
        Some(self.wrap_back(self.cursor.next_index, 1))
    }

    /// Slot holding the `offset`-th oldest record.
    #[must_use]
    pub fn index_from_earliest(&self, offset: u16) -> Option<u16> {
        (offset < self.cursor.num_events).then(|| self.wrap_forward(self.earliest_index(), offset))
    }

    /// Slot holding the `offset`-th newest record (0 is the latest).
    #[must_use]
    pub fn index_from_latest(&self, offset: u16) -> Option<u16> {
        (offset < self.cursor.num_events)
            .then(|| self.wrap_back(self.cursor.next_index, offset.saturating_add(1)))
    }

    /// Position of slot `index` counted from the oldest record.
    #[must_use]
    pub fn age_of(&self, index: u16) -> Option<u16> {
        if index >= self.geometry.capacity {
            return None;
        }
        let capacity = u32::from(self.geometry.capacity);
        let age = (u32::from(index) + capacity - u32::from(self.earliest_index())) % capacity;
        let age = u16::try_from(age).ok()?;
        (age < self.cursor.num_events).then_some(age)
    }

    /// Write `record` into the next slot and persist the advanced cursor.
    ///
    /// A record shorter than the slot has the remainder of the slot zeroed.
    /// Returns the slot written.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::RecordTooLarge`] for an oversized record and propagates
    /// store errors. On error the in-memory cursor is left unchanged.
    pub fn append<S: PersistentStore + ?Sized>(
        &mut self,
        store: &mut S,
        record: &[u8],
    ) -> NvResult<u16> {
        let record_size = usize::from(self.geometry.record_size);
        if record.len() > record_size {
            return Err(NvError::RecordTooLarge {
                len: record.len(),
                record_size: self.geometry.record_size,
            });
        }
        let slot = self.cursor.next_index;
        let address = self.geometry.slot_address(slot)?;
        store.write(address, record)?;
        if record.len() < record_size {
            let tail = u32::try_from(record.len()).unwrap_or(u32::MAX);
            store.clean(address.saturating_add(tail), record_size - record.len())?;
        }
        let advanced = self.cursor.advanced(self.geometry.capacity);
        self.register.store(store, advanced)?;
        self.cursor = advanced;
        tracing::trace!(
            base = self.geometry.base,
            slot,
            num_events = advanced.num_events,
            "record appended"
        );
        Ok(slot)
    }

    /// Read the first `buf.len()` bytes of slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::IndexOutOfRange`] or [`NvError::RecordTooLarge`] for a bad
    /// request and propagates store errors.
    pub fn read_by_index<S: PersistentStore + ?Sized>(
        &self,
        store: &S,
        index: u16,
        buf: &mut [u8],
    ) -> NvResult<()> {
        if buf.len() > usize::from(self.geometry.record_size) {
            return Err(NvError::RecordTooLarge {
                len: buf.len(),
                record_size: self.geometry.record_size,
            });
        }
        store.read(self.geometry.slot_address(index)?, buf)
    }

    /// Read `count` whole records starting at slot `start` into `buf`.
    ///
    /// The window must not cross the end of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`NvError::WrapBoundary`] for a window past the last slot,
    /// [`NvError::RecordTooLarge`] if `buf` is not exactly `count` records long,
    /// and propagates store errors.
    pub fn read_contiguous<S: PersistentStore + ?Sized>(
        &self,
        store: &S,
        start: u16,
        count: u16,
        buf: &mut [u8],
    ) -> NvResult<()> {
        let capacity = self.geometry.capacity;
        if u32::from(start) + u32::from(count) > u32::from(capacity) {
            return Err(NvError::WrapBoundary {
                start,
                count,
                capacity,
            });
        }
        let expected = usize::from(count).saturating_mul(usize::from(self.geometry.record_size));
        if buf.len() != expected {
            return Err(NvError::RecordTooLarge {
                len: buf.len(),
                record_size: self.geometry.record_size,
            });
        }
        if count == 0 {
            return Ok(());
        }
        store.read(self.geometry.slot_address(start)?, buf)
    }

    /// EID stored in slot `index` (0 for a never-written slot).
    ///
    /// # Errors
    ///
    /// Returns [`NvError::IndexOutOfRange`] and propagates store errors.
    pub fn read_eid<S: PersistentStore + ?Sized>(&self, store: &S, index: u16) -> NvResult<u32> {
        let address = self
            .geometry
            .slot_address(index)?
            .saturating_add(u32::from(self.geometry.eid_offset));
        let mut raw = [0u8; 4];
        store.read(address, &mut raw)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Zero every slot and reset the cursor.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn clear<S: PersistentStore + ?Sized>(&mut self, store: &mut S) -> NvResult<()> {
        let len = usize::try_from(self.geometry.byte_len()).unwrap_or(usize::MAX);
        store.clean(self.geometry.base, len)?;
        self.reset_cursor(store)
    }

    /// Reset the cursor to empty without touching the slots.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn reset_cursor<S: PersistentStore + ?Sized>(&mut self, store: &mut S) -> NvResult<()> {
        self.register.store(store, LogCursor::EMPTY)?;
        self.cursor = LogCursor::EMPTY;
        self.opened_from = CopySource::Primary;
        Ok(())
    }

    fn wrap_forward(&self, index: u16, by: u16) -> u16 {
        let capacity = u32::from(self.geometry.capacity);
        let wrapped = (u32::from(index) + u32::from(by)) % capacity;
        u16::try_from(wrapped).unwrap_or(0)
    }

    fn wrap_back(&self, index: u16, by: u16) -> u16 {
        let capacity = u32::from(self.geometry.capacity);
        let by = u32::from(by) % capacity;
        let wrapped = (u32::from(index) + capacity - by) % capacity;
        u16::try_from(wrapped).unwrap_or(0)
    }
}
