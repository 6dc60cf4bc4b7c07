//! Statistics - Scheduler activity counters
//!
//! Tracks ticks (idle vs. kernel), context switches and spawns.

use core::fmt;

/// Scheduler counters, updated under the scheduler lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Timer ticks spent in the idle thread
    pub idle_ticks: u64,

    /// Timer ticks spent in any other thread
    pub kernel_ticks: u64,

    /// Context switches (the next thread differed from the previous one)
    pub total_switches: u64,

    /// Threads created after boot
    pub total_spawns: u64,
}

impl SchedulerStats {
    pub const fn new() -> Self {
        Self {
            idle_ticks: 0,
            kernel_ticks: 0,
            total_switches: 0,
            total_spawns: 0,
        }
    }

    /// Record one timer tick
    pub fn record_tick(&mut self, idle: bool) {
        if idle {
            self.idle_ticks += 1;
        } else {
            self.kernel_ticks += 1;
        }
    }

    /// Record context switch
    pub fn record_switch(&mut self) {
        self.total_switches += 1;
    }

    /// Record thread creation
    pub fn record_spawn(&mut self) {
        self.total_spawns += 1;
    }

    pub fn total_ticks(&self) -> u64 {
        self.idle_ticks + self.kernel_ticks
    }
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} idle ticks, {} kernel ticks, {} switches, {} spawns",
            self.idle_ticks, self.kernel_ticks, self.total_switches, self.total_spawns
        )
    }
}
