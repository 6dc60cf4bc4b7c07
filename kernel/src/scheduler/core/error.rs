//! Scheduler invariant violations
//!
//! Nothing in the scheduling core fails recoverably. Every condition below
//! means some other part of the kernel broke a contract (lock ordering,
//! arithmetic range, queue discipline), so it is reported with context and
//! the offending path halts.

use core::fmt;

use crate::scheduler::thread::{Priority, ThreadId, ThreadState};
use crate::sync::LockId;

/// Broken scheduler invariants, with diagnostic context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    // ═══════════════════════════════════════════════════════════════
    // Fixed-point arithmetic
    // ═══════════════════════════════════════════════════════════════

    /// Result left the 32-bit signed range
    FixedPointOverflow { op: &'static str },

    /// Fixed-point division by zero
    DivideByZero { op: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Selection
    // ═══════════════════════════════════════════════════════════════

    /// `select_next` called with nothing ready
    EmptyReadyQueue,

    /// Raw strategy value does not name a strategy
    UnknownStrategy { raw: u32 },

    /// Global scheduler used before `init`
    NotInitialized,

    // ═══════════════════════════════════════════════════════════════
    // Priority donation
    // ═══════════════════════════════════════════════════════════════

    /// Ledger already holds its maximum number of records
    DonationCapacity { thread: ThreadId, capacity: usize },

    /// Donation chain loops back on itself
    DonationCycle { thread: ThreadId, lock: Option<LockId> },

    /// Thread tried to donate to itself
    SelfDonation { thread: ThreadId, lock: LockId },

    // ═══════════════════════════════════════════════════════════════
    // Thread lifecycle
    // ═══════════════════════════════════════════════════════════════

    /// Transition not allowed by the state machine
    InvalidTransition { thread: ThreadId, from: ThreadState, to: ThreadState },

    /// Identifier not present in the registry
    UnknownThread { thread: ThreadId },

    /// Identifier registered twice
    DuplicateThread { thread: ThreadId },

    /// Priority outside `[PRI_MIN, PRI_MAX]`
    PriorityOutOfRange { value: Priority },

    /// Nice outside `[NICE_MIN, NICE_MAX]`
    NiceOutOfRange { value: i32 },

    /// Idle thread asked to block, exit or queue
    IdleMisuse { operation: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Locks
    // ═══════════════════════════════════════════════════════════════

    /// Release by a thread that is not the holder
    LockNotHeld { lock: LockId, thread: ThreadId },

    /// Holder tried to acquire the same lock again
    LockRecursion { lock: LockId, thread: ThreadId },

    /// Donor is already blocked on another lock
    AlreadyWaiting { thread: ThreadId, lock: LockId },
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedPointOverflow { op } => write!(f, "fixed-point overflow in {}", op),
            Self::DivideByZero { op } => write!(f, "fixed-point division by zero in {}", op),
            Self::EmptyReadyQueue => write!(f, "select_next on an empty ready queue"),
            Self::UnknownStrategy { raw } => write!(f, "unknown scheduling strategy {}", raw),
            Self::NotInitialized => write!(f, "scheduler used before init"),
            Self::DonationCapacity { thread, capacity } => {
                write!(f, "thread {} exceeded donation capacity ({})", thread, capacity)
            }
            Self::DonationCycle { thread, lock: Some(lock) } => {
                write!(f, "donation cycle at thread {} via {}", thread, lock)
            }
            Self::DonationCycle { thread, lock: None } => {
                write!(f, "donation cycle at thread {}", thread)
            }
            Self::SelfDonation { thread, lock } => {
                write!(f, "thread {} donating to itself via {}", thread, lock)
            }
            Self::InvalidTransition { thread, from, to } => {
                write!(f, "thread {}: invalid transition {} -> {}", thread, from, to)
            }
            Self::UnknownThread { thread } => write!(f, "unknown thread {}", thread),
            Self::DuplicateThread { thread } => write!(f, "thread {} registered twice", thread),
            Self::PriorityOutOfRange { value } => write!(f, "priority {} out of range", value),
            Self::NiceOutOfRange { value } => write!(f, "nice {} out of range", value),
            Self::IdleMisuse { operation } => write!(f, "idle thread cannot {}", operation),
            Self::LockNotHeld { lock, thread } => {
                write!(f, "thread {} released {} without holding it", thread, lock)
            }
            Self::LockRecursion { lock, thread } => {
                write!(f, "thread {} re-acquired {}", thread, lock)
            }
            Self::AlreadyWaiting { thread, lock } => {
                write!(f, "thread {} already waits on {}", thread, lock)
            }
        }
    }
}

impl Invariant {
    /// Where to look when this fires
    pub fn hint(&self) -> &'static str {
        match self {
            Self::FixedPointOverflow { .. } | Self::DivideByZero { .. } => {
                "Check metric inputs (nice, load average, tick rate)"
            }
            Self::EmptyReadyQueue => "Callers must fall back to the idle thread",
            Self::DonationCapacity { .. } | Self::DonationCycle { .. } => {
                "Review lock ordering, nesting is bounded and acyclic"
            }
            Self::InvalidTransition { .. } | Self::IdleMisuse { .. } => {
                "Check thread lifecycle management"
            }
            Self::LockNotHeld { .. }
            | Self::LockRecursion { .. }
            | Self::SelfDonation { .. }
            | Self::AlreadyWaiting { .. } => {
                "Check lock acquire/release pairing"
            }
            _ => "Check scheduler configuration",
        }
    }
}

/// Report a broken invariant and halt the current path
#[cold]
#[track_caller]
pub fn violation(invariant: Invariant) -> ! {
    log::error!("[SCHED] invariant violated: {} (hint: {})", invariant, invariant.hint());
    panic!("[SCHED CRITICAL] Invariant violated: {}", invariant);
}

/// Scheduler assertion: halt with context when `$cond` does not hold
#[macro_export]
macro_rules! sched_assert {
    ($cond:expr, $invariant:expr) => {
        if !$cond {
            $crate::scheduler::core::error::violation($invariant);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let msg = alloc::format!("{}", Invariant::DonationCapacity { thread: 7, capacity: 8 });
        assert_eq!(msg, "thread 7 exceeded donation capacity (8)");

        let msg = alloc::format!(
            "{}",
            Invariant::InvalidTransition { thread: 3, from: ThreadState::Blocked, to: ThreadState::Running }
        );
        assert_eq!(msg, "thread 3: invalid transition Blocked -> Running");
    }

    #[test]
    fn test_hint_groups() {
        assert_eq!(
            Invariant::DonationCycle { thread: 1, lock: None }.hint(),
            Invariant::DonationCapacity { thread: 1, capacity: 8 }.hint()
        );
        assert_eq!(Invariant::NotInitialized.hint(), "Check scheduler configuration");
    }

    #[test]
    #[should_panic(expected = "[SCHED CRITICAL] Invariant violated: select_next on an empty ready queue")]
    fn test_sched_assert_panics() {
        crate::sched_assert!(1 + 1 == 3, Invariant::EmptyReadyQueue);
    }

    #[test]
    fn test_sched_assert_passes() {
        crate::sched_assert!(true, Invariant::EmptyReadyQueue);
    }
}
