//! Thread Control Block
//!
//! Only the scheduling-relevant slice of a thread lives here: identity,
//! state, priorities, the donation ledger, MLFQS metrics and sleep
//! bookkeeping. Stacks, address spaces and file tables belong to other
//! subsystems.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};

use static_assertions::const_assert;

use super::donation::DonationLedger;
use super::state::{validate_transition, ThreadState};
use crate::scheduler::core::error::Invariant;
use crate::scheduler::fixed_point::FixedPoint;
use crate::sched_assert;
use crate::sync::LockId;

/// Thread ID type
pub type ThreadId = u64;

/// Priority value, higher runs first
pub type Priority = i32;

/// Lowest priority
pub const PRI_MIN: Priority = 0;
/// Default priority
pub const PRI_DEFAULT: Priority = 31;
/// Highest priority
pub const PRI_MAX: Priority = 63;

/// Nice range (MLFQS)
pub const NICE_MIN: i32 = -20;
pub const NICE_DEFAULT: i32 = 0;
pub const NICE_MAX: i32 = 20;

const_assert!(PRI_MIN < PRI_DEFAULT && PRI_DEFAULT < PRI_MAX);
const_assert!(NICE_MIN <= NICE_DEFAULT && NICE_DEFAULT <= NICE_MAX);

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a new unique thread ID
pub fn alloc_thread_id() -> ThreadId {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Halt unless `priority` is within `[PRI_MIN, PRI_MAX]`
pub fn check_priority(priority: Priority) {
    sched_assert!(
        (PRI_MIN..=PRI_MAX).contains(&priority),
        Invariant::PriorityOutOfRange { value: priority }
    );
}

/// Halt unless `nice` is within `[NICE_MIN, NICE_MAX]`
pub fn check_nice(nice: i32) {
    sched_assert!(
        (NICE_MIN..=NICE_MAX).contains(&nice),
        Invariant::NiceOutOfRange { value: nice }
    );
}

/// The lock a blocked thread waits on, and who holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWait {
    pub lock: LockId,
    pub holder: ThreadId,
}

/// Thread Control Block (TCB)
#[derive(Debug)]
pub struct Thread {
    /// Unique thread ID
    id: ThreadId,

    /// Thread name (for debugging)
    name: Box<str>,

    /// Current state
    state: ThreadState,

    /// Priority set at creation or by `set_priority`
    base_priority: Priority,

    /// Threads currently donating to this one
    donations: DonationLedger,

    /// Lock this thread is blocked on
    waiting_on: Option<LockWait>,

    /// MLFQS niceness
    nice: i32,

    /// MLFQS decayed CPU usage
    recent_cpu: FixedPoint,

    /// Wake-up tick, `None` when not sleeping
    sleep_until: Option<u64>,
}

impl Thread {
    /// Create a READY thread
    pub fn new(id: ThreadId, name: &str, priority: Priority) -> Self {
        check_priority(priority);
        Self {
            id,
            name: name.into(),
            state: ThreadState::Ready,
            base_priority: priority,
            donations: DonationLedger::new(),
            waiting_on: None,
            nice: NICE_DEFAULT,
            recent_cpu: FixedPoint::ZERO,
            sleep_until: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Move to `to`, halting on a transition the state machine forbids
    pub fn set_state(&mut self, to: ThreadState) {
        sched_assert!(
            validate_transition(self.state, to),
            Invariant::InvalidTransition { thread: self.id, from: self.state, to }
        );
        self.state = to;
    }

    pub fn base_priority(&self) -> Priority {
        self.base_priority
    }

    /// Takes effect on the next effective-priority evaluation
    pub fn set_base_priority(&mut self, priority: Priority) {
        check_priority(priority);
        self.base_priority = priority;
    }

    pub fn donations(&self) -> &DonationLedger {
        &self.donations
    }

    pub(crate) fn donations_mut(&mut self) -> &mut DonationLedger {
        &mut self.donations
    }

    pub fn waiting_on(&self) -> Option<LockWait> {
        self.waiting_on
    }

    pub(crate) fn set_waiting_on(&mut self, wait: Option<LockWait>) {
        self.waiting_on = wait;
    }

    pub fn nice(&self) -> i32 {
        self.nice
    }

    pub fn set_nice(&mut self, nice: i32) {
        check_nice(nice);
        self.nice = nice;
    }

    pub fn recent_cpu(&self) -> FixedPoint {
        self.recent_cpu
    }

    pub fn set_recent_cpu(&mut self, recent_cpu: FixedPoint) {
        self.recent_cpu = recent_cpu;
    }

    pub fn sleep_until(&self) -> Option<u64> {
        self.sleep_until
    }

    pub(crate) fn set_sleep_until(&mut self, tick: Option<u64>) {
        self.sleep_until = tick;
    }
}
