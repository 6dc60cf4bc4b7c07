//! Donation ledger
//!
//! Per-thread record of who is donating priority to it and through which
//! lock. The ledger is a fixed inline array: nesting deeper than
//! [`MAX_DONATIONS`] locks is not supported, and running out of slots halts
//! instead of growing.

use static_assertions::const_assert;

use super::thread::ThreadId;
use crate::scheduler::core::error::{violation, Invariant};
use crate::sync::LockId;

/// Simultaneous donation records per thread (also the maximum nesting depth)
pub const MAX_DONATIONS: usize = 8;

const_assert!(MAX_DONATIONS > 0);

/// `donor` waits on `lock`, which the ledger owner holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationRecord {
    pub donor: ThreadId,
    pub lock: LockId,
}

/// Donors whose records one `retrieve` dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedDonors {
    donors: [Option<ThreadId>; MAX_DONATIONS],
}

impl RemovedDonors {
    fn push(&mut self, donor: ThreadId) {
        if let Some(slot) = self.donors.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(donor);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.donors.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.donors[0].is_none()
    }
}

/// Fixed-capacity set of active donations
#[derive(Debug, Clone, Default)]
pub struct DonationLedger {
    slots: [Option<DonationRecord>; MAX_DONATIONS],
}

impl DonationLedger {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_DONATIONS],
        }
    }

    /// Store a record in the first free slot.
    ///
    /// No priority check: every active donation is kept, whether or not it
    /// currently raises the owner's effective priority.
    pub fn accept(&mut self, owner: ThreadId, record: DonationRecord) {
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(record),
            None => violation(Invariant::DonationCapacity {
                thread: owner,
                capacity: MAX_DONATIONS,
            }),
        }
    }

    /// Drop every record keyed by `lock`, returning whose they were
    pub fn retrieve(&mut self, lock: LockId) -> RemovedDonors {
        self.clear_where(|record| record.lock == lock)
    }

    /// Drop every record from `donor`, returning how many went away
    pub fn withdraw(&mut self, donor: ThreadId) -> usize {
        self.clear_where(|record| record.donor == donor).len()
    }

    fn clear_where(&mut self, mut matches: impl FnMut(&DonationRecord) -> bool) -> RemovedDonors {
        let mut removed = RemovedDonors::default();
        for slot in self.slots.iter_mut() {
            if let Some(record) = slot.filter(|record| matches(record)) {
                removed.push(record.donor);
                *slot = None;
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &DonationRecord> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
