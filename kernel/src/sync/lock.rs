//! Lock - kernel lock with priority donation
//!
//! A waiter donates its priority to the holder for as long as it waits. On
//! release the lock goes straight to the highest-priority waiter, and the
//! remaining waiters donate to the new holder instead.

use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::sched_assert;
use crate::scheduler::core::error::Invariant;
use crate::scheduler::core::Scheduler;
use crate::scheduler::thread::ThreadId;

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Lock identifier, unique for the lifetime of the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockId(u64);

impl LockId {
    /// Allocate a new unique lock ID
    pub fn alloc() -> Self {
        Self(NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock#{}", self.0)
    }
}

/// Result of `Lock::acquire`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now holds the lock
    Acquired,
    /// The caller blocked behind `holder`; it owns the lock once unblocked
    Blocked { holder: ThreadId },
}

/// Sleeping lock owned by at most one thread
#[derive(Debug)]
pub struct Lock {
    id: LockId,
    holder: Option<ThreadId>,
    waiters: Vec<ThreadId>,
}

impl Lock {
    pub fn new() -> Self {
        Self {
            id: LockId::alloc(),
            holder: None,
            waiters: Vec::new(),
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    pub fn holder(&self) -> Option<ThreadId> {
        self.holder
    }

    /// Blocked threads, in arrival order
    pub fn waiters(&self) -> &[ThreadId] {
        &self.waiters
    }

    /// Take the lock for the running thread, or donate to the holder and block
    pub fn acquire(&mut self, sched: &mut Scheduler) -> AcquireOutcome {
        let me = sched.current();
        let holder = match self.holder {
            None => {
                self.holder = Some(me);
                return AcquireOutcome::Acquired;
            }
            Some(holder) => holder,
        };
        sched_assert!(holder != me, Invariant::LockRecursion { lock: self.id, thread: me });

        sched.accept_donation(holder, me, self.id);
        self.waiters.push(me);
        sched.block_current();
        AcquireOutcome::Blocked { holder }
    }

    /// Release the lock held by the running thread.
    ///
    /// Returns the waiter that received it, if any.
    pub fn release(&mut self, sched: &mut Scheduler) -> Option<ThreadId> {
        let me = sched.current();
        sched_assert!(self.holder == Some(me), Invariant::LockNotHeld { lock: self.id, thread: me });

        if self.waiters.is_empty() {
            self.holder = None;
            return None;
        }

        // First waiter with the highest effective priority
        let mut best = 0;
        let mut best_priority = sched.effective_priority(self.waiters[0]);
        for (index, &waiter) in self.waiters.iter().enumerate().skip(1) {
            let priority = sched.effective_priority(waiter);
            if priority > best_priority {
                best = index;
                best_priority = priority;
            }
        }
        let next = self.waiters.remove(best);

        sched.withdraw_donation(me, next);
        sched.retrieve_donation(me, self.id);
        for &waiter in &self.waiters {
            sched.accept_donation(next, waiter, self.id);
        }

        self.holder = Some(next);
        log::trace!("[LOCK] {} handed from {} to {}", self.id, me, next);

        sched.unblock(next);
        sched.preempt_if_needed();
        Some(next)
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedConfig;
    use crate::scheduler::core::SchedulingStrategy;
    use crate::scheduler::thread::ThreadState;

    fn scheduler() -> Scheduler {
        Scheduler::new(SchedConfig::new().with_strategy(SchedulingStrategy::Priority))
    }

    #[test]
    fn test_lock_ids_are_unique() {
        assert_ne!(LockId::alloc(), LockId::alloc());
        assert_eq!(alloc::format!("{}", LockId::from_raw(9)), "lock#9");
    }

    #[test]
    fn test_uncontended() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        let main = sched.current();

        assert_eq!(lock.acquire(&mut sched), AcquireOutcome::Acquired);
        assert_eq!(lock.holder(), Some(main));
        assert_eq!(lock.release(&mut sched), None);
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn test_contended_donates_and_hands_over() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        let main = sched.current();
        lock.acquire(&mut sched);

        // High-priority thread preempts main, then blocks on the lock
        let high = sched.spawn("high", 50);
        assert_eq!(sched.current(), high);
        assert_eq!(lock.acquire(&mut sched), AcquireOutcome::Blocked { holder: main });

        assert_eq!(sched.current(), main);
        assert_eq!(sched.get_priority(), 50);

        // Release: donation gone, lock handed to `high`, which preempts
        assert_eq!(lock.release(&mut sched), Some(high));
        assert_eq!(lock.holder(), Some(high));
        assert_eq!(sched.current(), high);
        assert_eq!(sched.effective_priority(main), 31);
        assert_eq!(sched.thread(high).and_then(|t| t.waiting_on()), None);
    }

    #[test]
    fn test_hand_over_repoints_remaining_waiters() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        let main = sched.current();
        lock.acquire(&mut sched);

        let mid = sched.spawn("mid", 40);
        lock.acquire(&mut sched);
        let high = sched.spawn("high", 50);
        lock.acquire(&mut sched);
        assert_eq!(sched.current(), main);
        assert_eq!(lock.waiters(), &[mid, high]);

        assert_eq!(lock.release(&mut sched), Some(high));
        assert_eq!(lock.waiters(), &[mid]);
        // `mid` now waits on `high`
        let wait = sched.thread(mid).and_then(|t| t.waiting_on());
        assert_eq!(wait.map(|w| w.holder), Some(high));
        assert_eq!(sched.effective_priority(high), 50);
        assert_eq!(sched.current(), high);

        assert_eq!(lock.release(&mut sched), Some(mid));
        assert_eq!(sched.thread(mid).map(|t| t.state()), Some(ThreadState::Ready));
        assert_eq!(sched.current(), high);
    }

    #[test]
    fn test_woken_sleeper_stays_blocked_on_lock() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        let main = sched.current();
        let holder = sched.spawn("holder", 20);

        sched.sleep_current(10);
        assert_eq!(sched.current(), holder);
        lock.acquire(&mut sched);

        // holder wakes main before its deadline; main then blocks on the lock
        sched.unblock(main);
        assert!(sched.preempt_if_needed());
        assert_eq!(lock.acquire(&mut sched), AcquireOutcome::Blocked { holder });

        for _ in 0..12 {
            sched.tick();
        }
        assert_eq!(sched.thread(main).map(|t| t.state()), Some(ThreadState::Blocked));
        assert_eq!(sched.current(), holder);
        assert_eq!(sched.get_priority(), 31);

        assert_eq!(lock.release(&mut sched), Some(main));
        assert_eq!(sched.current(), main);
        assert_eq!(lock.holder(), Some(main));
    }

    #[test]
    #[should_panic(expected = "without holding it")]
    fn test_release_unheld_is_fatal() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        lock.release(&mut sched);
    }

    #[test]
    #[should_panic(expected = "re-acquired")]
    fn test_recursive_acquire_is_fatal() {
        let mut sched = scheduler();
        let mut lock = Lock::new();
        lock.acquire(&mut sched);
        lock.acquire(&mut sched);
    }
}
