//! EID allocation and event admission.
//!
//! Events detected in interrupt context are published into a lock-free staging
//! queue through an [`InterruptProducer`]. The foreground [`EidSequencer`] moves
//! them into the pending queue, in publish order, before admitting its own
//! event, so EIDs follow detection order across both sources.
//!
//! # RT Safety
//!
//! [`InterruptProducer::stage`] is a single bounded `ArrayQueue::push` plus a
//! relaxed counter increment. The pending queue is a fixed-capacity
//! `heapless::Deque`; admission never allocates.

use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use heapless::Deque;
use tripunit_nvram::{CopySource, PersistentRegister, PersistentStore, RegisterLoad};

use crate::codes::EventCode;
use crate::eid::Eid;
use crate::error::EventResult;
use crate::stats::EventCounters;
use crate::time::Timestamp;

/// Pending queue slots.
pub const PENDING_CAPACITY: usize = 16;

/// Interrupt staging queue slots.
pub const STAGING_CAPACITY: usize = 8;

/// An event published from interrupt context, not yet given an EID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedEvent {
    /// Event code.
    pub code: EventCode,
    /// Detection time.
    pub timestamp: Timestamp,
}

/// An admitted event waiting for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    /// Event code.
    pub code: EventCode,
    /// Detection time.
    pub timestamp: Timestamp,
    /// Assigned identifier.
    pub eid: Eid,
}

/// Interrupt-side handle onto the staging queue.
///
/// Cloning shares the queue. Only one clone should publish at a time: the
/// queue is drained in publish order and EIDs follow that order.
#[derive(Debug, Clone)]
pub struct InterruptProducer {
    queue: Arc<ArrayQueue<StagedEvent>>,
    counters: Arc<EventCounters>,
}

impl InterruptProducer {
    /// Publish an event.
    ///
    /// Returns `false` and counts a staging overflow when the queue is full.
    #[inline]
    pub fn stage(&self, code: EventCode, timestamp: Timestamp) -> bool {
        if self.queue.push(StagedEvent { code, timestamp }).is_err() {
            self.counters.inc_staging_overflow();
            return false;
        }
        self.counters.inc_staged();
        true
    }

    /// Events published and not yet drained.
    #[must_use]
    pub fn staged(&self) -> usize {
        self.queue.len()
    }
}

/// EID allocator and pending queue.
#[derive(Debug)]
pub struct EidSequencer {
    master: PersistentRegister<u32>,
    next: Eid,
    pending: Deque<PendingEvent, PENDING_CAPACITY>,
    staging: Arc<ArrayQueue<StagedEvent>>,
    counters: Arc<EventCounters>,
}

impl EidSequencer {
    /// Load the master EID.
    ///
    /// Returns the sequencer and whether the stored value had to be replaced
    /// (both copies damaged, or a stored 0). The sequencer then starts at 1.
    pub(crate) fn open<S: PersistentStore + ?Sized>(
        master: PersistentRegister<u32>,
        store: &S,
        counters: Arc<EventCounters>,
    ) -> EventResult<(Self, bool)> {
        let RegisterLoad { value, source } = master.load(store)?;
        let restored = Eid::new(value).filter(|_| source != CopySource::Defaulted);
        let defaulted = restored.is_none();
        if defaulted {
            tracing::warn!(stored = value, ?source, "master EID unusable, restarting at 1");
        }
        Ok((
            Self {
                master,
                next: restored.unwrap_or(Eid::FIRST),
                pending: Deque::new(),
                staging: Arc::new(ArrayQueue::new(STAGING_CAPACITY)),
                counters,
            },
            defaulted,
        ))
    }

    /// A producer handle for interrupt context.
    #[must_use]
    pub fn producer(&self) -> InterruptProducer {
        InterruptProducer {
            queue: Arc::clone(&self.staging),
            counters: Arc::clone(&self.counters),
        }
    }

    /// EID the next admitted event will get.
    #[must_use]
    pub fn next_eid(&self) -> Eid {
        self.next
    }

    /// Events waiting for dispatch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether new admissions are being dropped.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pending.is_full()
    }

    /// Admit `code` detected at `timestamp`.
    ///
    /// Staged interrupt events are moved into the pending queue first. A code
    /// that is not admissible only drains the staging queue. Returns `None` when
    /// nothing was admitted for `code`, including when the queue is full.
    pub(crate) fn admit(&mut self, code: EventCode, timestamp: Timestamp) -> Option<Eid> {
        self.drain_staging();
        if !code.is_admissible() {
            return None;
        }
        if self.pending.is_full() {
            self.counters.inc_dropped();
            tracing::warn!(%code, "pending event queue full, dropping event");
            return None;
        }
        self.enqueue(code, timestamp)
    }

    /// Oldest event not yet dispatched.
    pub(crate) fn front(&self) -> Option<&PendingEvent> {
        self.pending.front()
    }

    /// Remove the oldest event once it has been dispatched.
    pub(crate) fn finish(&mut self) -> Option<PendingEvent> {
        self.pending.pop_front()
    }

    /// Persist the master EID after a record carrying `eid` was written.
    pub(crate) fn commit<S: PersistentStore + ?Sized>(
        &self,
        store: &mut S,
        eid: Eid,
    ) -> EventResult<()> {
        self.master.store(store, eid.next().get())?;
        Ok(())
    }

    /// Drop every queued event and restart at EID 1.
    pub(crate) fn reset<S: PersistentStore + ?Sized>(&mut self, store: &mut S) -> EventResult<()> {
        self.pending.clear();
        while self.staging.pop().is_some() {}
        self.master.store(store, Eid::FIRST.get())?;
        self.next = Eid::FIRST;
        Ok(())
    }

    fn drain_staging(&mut self) {
        while !self.pending.is_full() {
            let Some(staged) = self.staging.pop() else {
                break;
            };
            if staged.code.is_admissible() {
                self.enqueue(staged.code, staged.timestamp);
            }
        }
    }

    fn enqueue(&mut self, code: EventCode, timestamp: Timestamp) -> Option<Eid> {
        let eid = self.next;
        self.pending
            .push_back(PendingEvent {
                code,
                timestamp,
                eid,
            })
            .ok()?;
        self.next = eid.next();
        self.counters.inc_admitted();
        tracing::trace!(%code, eid = eid.get(), "event admitted");
        Some(eid)
    }
}
