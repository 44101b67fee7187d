//! Rollover-aware EID lookup.
//!
//! EIDs increase with every append, so a log that has never rolled over is
//! sorted from slot 0 to its latest slot. After rollover the buffer splits into
//! two sorted arms around slot 0:
//!
//! ```text
//!   [ 0 ..= latest ]        EIDs >= EID(0)
//!   [ next ..= cap-1 ]      EIDs <  EID(0)
//! ```
//!
//! Comparing the target with the EID in slot 0 picks the arm, then an ordinary
//! binary search runs inside it.

use crate::error::NvResult;
use crate::log::IndexedLog;
use crate::store::PersistentStore;

/// Find the slot holding `target`.
///
/// Returns `Ok(None)` when the log is empty, `target` is 0, or no slot holds it.
/// Costs `O(log capacity)` store reads.
///
/// # Errors
///
/// Propagates store read errors.
pub fn find_eid<S: PersistentStore + ?Sized>(
    log: &IndexedLog,
    store: &S,
    target: u32,
) -> NvResult<Option<u16>> {
    if target == 0 {
        return Ok(None);
    }
    let first = log.read_eid(store, 0)?;
    if first == 0 {
        return Ok(None);
    }
    let capacity = log.capacity();
    let (low, high) = if target < first {
        if !log.is_rolled_over() {
            return Ok(None);
        }
        (log.next_index(), capacity.saturating_sub(1))
    } else {
        match log.latest_index() {
            Some(latest) => (0, latest),
            None => return Ok(None),
        }
    };
    search_arm(log, store, target, low, high)
}

fn search_arm<S: PersistentStore + ?Sized>(
    log: &IndexedLog,
    store: &S,
    target: u32,
    low: u16,
    high: u16,
) -> NvResult<Option<u16>> {
    // Bounds held as u32 so `high` can step below `low` without wrapping.
    let mut low = u32::from(low);
    let mut high = u32::from(high) + 1;
    while low < high {
        let mid = low + (high - low) / 2;
        let index = u16::try_from(mid).unwrap_or(u16::MAX);
        let eid = log.read_eid(store, index)?;
        match eid.cmp(&target) {
            core::cmp::Ordering::Equal => return Ok(Some(index)),
            core::cmp::Ordering::Less => low = mid + 1,
            core::cmp::Ordering::Greater => high = mid,
        }
    }
    Ok(None)
}
