//! Thread registry and the donation graph
//!
//! Threads refer to each other by [`ThreadId`] only: a donor and a holder do
//! not own one another. The registry resolves those identifiers and walks the
//! donation chain to compute effective priorities.

use alloc::collections::BTreeMap;

use super::donation::{DonationRecord, MAX_DONATIONS};
use super::thread::{LockWait, Priority, Thread, ThreadId};
use crate::scheduler::core::error::{violation, Invariant};
use crate::sched_assert;
use crate::sync::LockId;

/// All live threads, indexed by ID
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: BTreeMap<ThreadId, Thread>,
}

impl ThreadRegistry {
    pub const fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, thread: Thread) {
        let id = thread.id();
        sched_assert!(!self.threads.contains_key(&id), Invariant::DuplicateThread { thread: id });
        self.threads.insert(id, thread);
    }

    pub fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        self.threads.remove(&id)
    }

    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(&id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.get_mut(&id)
    }

    /// Lookup that halts on an unknown ID
    pub fn expect(&self, id: ThreadId) -> &Thread {
        match self.threads.get(&id) {
            Some(thread) => thread,
            None => violation(Invariant::UnknownThread { thread: id }),
        }
    }

    /// Mutable lookup that halts on an unknown ID
    pub fn expect_mut(&mut self, id: ThreadId) -> &mut Thread {
        match self.threads.get_mut(&id) {
            Some(thread) => thread,
            None => violation(Invariant::UnknownThread { thread: id }),
        }
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.threads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Threads in ID order
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.threads.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thread> {
        self.threads.values_mut()
    }

    /// `max(base priority, effective priority of every donor)`
    pub fn effective_priority(&self, id: ThreadId) -> Priority {
        self.effective_priority_at(id, 0)
    }

    fn effective_priority_at(&self, id: ThreadId, depth: usize) -> Priority {
        // Chains are acyclic and no deeper than the ledger bound; anything
        // longer is a loop.
        sched_assert!(depth <= MAX_DONATIONS, Invariant::DonationCycle { thread: id, lock: None });

        let thread = self.expect(id);
        thread
            .donations()
            .iter()
            .map(|record| self.effective_priority_at(record.donor, depth + 1))
            .fold(thread.base_priority(), Priority::max)
    }

    /// `donor` starts waiting on `lock`, held by `holder`.
    ///
    /// Records the donation in the holder's ledger and points the donor's
    /// `waiting_on` at the holder.
    pub fn accept_donation(&mut self, holder: ThreadId, donor: ThreadId, lock: LockId) {
        sched_assert!(holder != donor, Invariant::SelfDonation { thread: donor, lock });
        sched_assert!(self.contains(donor), Invariant::UnknownThread { thread: donor });
        if let Some(wait) = self.expect(donor).waiting_on() {
            violation(Invariant::AlreadyWaiting { thread: donor, lock: wait.lock });
        }
        self.assert_no_cycle(holder, donor, lock);

        self.expect_mut(holder)
            .donations_mut()
            .accept(holder, DonationRecord { donor, lock });
        self.expect_mut(donor).set_waiting_on(Some(LockWait { lock, holder }));

        log::trace!("[SCHED] thread {} donates to {} via {}", donor, holder, lock);
    }

    /// `holder` released `lock`: forget every donation made through it.
    ///
    /// The former donors stop waiting on `holder`.
    pub fn retrieve_donation(&mut self, holder: ThreadId, lock: LockId) -> usize {
        let removed = self.expect_mut(holder).donations_mut().retrieve(lock);
        let released = Some(LockWait { lock, holder });
        for donor in removed.iter() {
            if let Some(thread) = self.get_mut(donor) {
                if thread.waiting_on() == released {
                    thread.set_waiting_on(None);
                }
            }
        }

        if !removed.is_empty() {
            log::trace!(
                "[SCHED] thread {} retrieved {} donation(s) via {}",
                holder,
                removed.len(),
                lock
            );
        }
        removed.len()
    }

    /// `donor` stopped waiting without getting the lock
    pub fn withdraw_donation(&mut self, holder: ThreadId, donor: ThreadId) -> usize {
        let removed = self.expect_mut(holder).donations_mut().withdraw(donor);
        self.expect_mut(donor).set_waiting_on(None);
        removed
    }

    /// Halt if `holder` already (transitively) waits on `donor`
    fn assert_no_cycle(&self, holder: ThreadId, donor: ThreadId, lock: LockId) {
        let mut cursor = holder;
        for _ in 0..=MAX_DONATIONS {
            match self.expect(cursor).waiting_on() {
                Some(wait) if wait.holder == donor => {
                    violation(Invariant::DonationCycle { thread: holder, lock: Some(lock) })
                }
                Some(wait) => cursor = wait.holder,
                None => return,
            }
        }
        violation(Invariant::DonationCycle { thread: holder, lock: Some(lock) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::{alloc_thread_id, PRI_DEFAULT};

    fn spawn(registry: &mut ThreadRegistry, priority: Priority) -> ThreadId {
        let id = alloc_thread_id();
        registry.insert(Thread::new(id, "t", priority));
        id
    }

    fn lock() -> LockId {
        LockId::alloc()
    }

    #[test]
    fn test_no_donations_is_base_priority() {
        let mut registry = ThreadRegistry::new();
        let t = spawn(&mut registry, 17);
        assert_eq!(registry.effective_priority(t), 17);
    }

    #[test]
    fn test_donation_raises_then_retrieval_restores() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, 10);
        let donor = spawn(&mut registry, 20);
        let l = lock();

        registry.accept_donation(holder, donor, l);
        assert_eq!(registry.effective_priority(holder), 20);
        assert_eq!(registry.expect(donor).waiting_on(), Some(LockWait { lock: l, holder }));

        assert_eq!(registry.retrieve_donation(holder, l), 1);
        assert_eq!(registry.effective_priority(holder), 10);
    }

    #[test]
    fn test_retrieval_ends_the_wait() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, 10);
        let donor = spawn(&mut registry, 20);
        let l = lock();

        registry.accept_donation(holder, donor, l);
        registry.retrieve_donation(holder, l);
        assert!(registry.expect(donor).waiting_on().is_none());

        // donor now owns the lock; the former holder may wait on it
        registry.accept_donation(donor, holder, l);
        assert_eq!(registry.effective_priority(donor), 20);
        assert_eq!(registry.expect(holder).waiting_on(), Some(LockWait { lock: l, holder: donor }));
    }

    #[test]
    #[should_panic(expected = "already waits on")]
    fn test_donor_waits_on_one_lock_at_a_time() {
        let mut registry = ThreadRegistry::new();
        let first = spawn(&mut registry, 10);
        let second = spawn(&mut registry, 10);
        let donor = spawn(&mut registry, 20);

        registry.accept_donation(first, donor, lock());
        registry.accept_donation(second, donor, lock());
    }

    #[test]
    fn test_lower_donor_is_kept_but_does_not_lower() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, 40);
        let donor = spawn(&mut registry, 5);
        registry.accept_donation(holder, donor, lock());
        assert_eq!(registry.effective_priority(holder), 40);
        assert_eq!(registry.expect(holder).donations().len(), 1);
    }

    #[test]
    fn test_chained_donation() {
        let mut registry = ThreadRegistry::new();
        let h = spawn(&mut registry, 10);
        let d2 = spawn(&mut registry, 20);
        let d1 = spawn(&mut registry, 30);
        let (l1, l2) = (lock(), lock());

        registry.accept_donation(h, d2, l2);
        registry.accept_donation(d2, d1, l1);

        assert_eq!(registry.effective_priority(h), 30);
        assert_eq!(registry.effective_priority(d2), 30);

        // The inner link going away drops the whole chain's boost
        registry.retrieve_donation(d2, l1);
        assert_eq!(registry.effective_priority(h), 20);
    }

    #[test]
    fn test_multiple_locks_release_one() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, PRI_DEFAULT);
        let a = spawn(&mut registry, 40);
        let b = spawn(&mut registry, 50);
        let (la, lb) = (lock(), lock());

        registry.accept_donation(holder, a, la);
        registry.accept_donation(holder, b, lb);
        assert_eq!(registry.effective_priority(holder), 50);

        registry.retrieve_donation(holder, lb);
        assert_eq!(registry.effective_priority(holder), 40);
    }

    #[test]
    fn test_withdraw_clears_wait() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, 1);
        let donor = spawn(&mut registry, 60);
        registry.accept_donation(holder, donor, lock());

        assert_eq!(registry.withdraw_donation(holder, donor), 1);
        assert_eq!(registry.effective_priority(holder), 1);
        assert!(registry.expect(donor).waiting_on().is_none());
    }

    #[test]
    fn test_eight_level_chain_is_supported() {
        let mut registry = ThreadRegistry::new();
        let mut holder = spawn(&mut registry, 0);
        let bottom = holder;
        for level in 1..=MAX_DONATIONS as Priority {
            let donor = spawn(&mut registry, level);
            registry.accept_donation(holder, donor, lock());
            holder = donor;
        }
        assert_eq!(registry.effective_priority(bottom), MAX_DONATIONS as Priority);
    }

    #[test]
    #[should_panic(expected = "exceeded donation capacity")]
    fn test_ninth_simultaneous_donation_is_fatal() {
        let mut registry = ThreadRegistry::new();
        let holder = spawn(&mut registry, 1);
        for _ in 0..=MAX_DONATIONS {
            let donor = spawn(&mut registry, 2);
            registry.accept_donation(holder, donor, lock());
        }
    }

    #[test]
    #[should_panic(expected = "donation cycle")]
    fn test_cycle_is_fatal() {
        let mut registry = ThreadRegistry::new();
        let a = spawn(&mut registry, 1);
        let b = spawn(&mut registry, 2);
        registry.accept_donation(a, b, lock());
        // a now waits on something b holds: b -> a -> b
        registry.accept_donation(b, a, lock());
    }

    #[test]
    #[should_panic(expected = "donating to itself")]
    fn test_self_donation_is_fatal() {
        let mut registry = ThreadRegistry::new();
        let a = spawn(&mut registry, 1);
        registry.accept_donation(a, a, lock());
    }

    #[test]
    #[should_panic(expected = "unknown thread")]
    fn test_unknown_holder_is_fatal() {
        let registry = ThreadRegistry::new();
        registry.effective_priority(9_999_999);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_insert_is_fatal() {
        let mut registry = ThreadRegistry::new();
        registry.insert(Thread::new(42, "a", 1));
        registry.insert(Thread::new(42, "b", 1));
    }
}
