//! Scheduler subsystem
//!
//! Strategy-selectable next-thread choice, priority donation and fixed-point
//! MLFQS metrics for a single core.

pub mod core;
pub mod fixed_point;
pub mod thread;

use spin::{Mutex, Once};

use self::core::{violation, Invariant};
use crate::config::SchedConfig;
use crate::logger;

// Re-exports
pub use self::core::{select_next, ReadyQueue, Scheduler, SchedulerStats, SchedulingStrategy};
pub use fixed_point::FixedPoint;
pub use thread::{Priority, Thread, ThreadId, ThreadRegistry, ThreadState};

/// Global scheduler instance
pub static SCHEDULER: Once<Mutex<Scheduler>> = Once::new();

/// Initialize the scheduler. Later calls are ignored.
pub fn init(config: SchedConfig) {
    let mut fresh = false;
    SCHEDULER.call_once(|| {
        fresh = true;
        Mutex::new(Scheduler::new(config))
    });

    if fresh {
        logger::info("✓ Scheduler initialized");
    } else {
        logger::warn("[SCHED] init called twice, keeping the first configuration");
    }
}

/// Run `f` with exclusive access to the global scheduler
pub fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    match SCHEDULER.get() {
        Some(scheduler) => f(&mut scheduler.lock()),
        None => violation(Invariant::NotInitialized),
    }
}

/// Convenient function to get scheduler statistics
pub fn get_stats() -> SchedulerStats {
    with_scheduler(|sched| sched.stats())
}
