//! Scheduler Core - single-core thread scheduler
//!
//! Owns every thread of the core: registry, ready queue, idle fallback,
//! tick accounting, sleepers and the advanced (MLFQS) metrics.
//!
//! # Features
//! - Boot-time strategy (naive / priority / advanced)
//! - Priority donation through the thread registry
//! - Idle thread fallback, never enqueued
//! - Sleep with tick-based wake-up
//! - Statistics tracking
//!
//! No register state lives here: switching means updating `current`, and
//! the architecture layer restores the matching context afterwards.

use alloc::format;
use alloc::vec::Vec;

use super::error::Invariant;
use super::mlfqs::{self, PRIORITY_RECALC_TICKS};
use super::policy::SchedulingStrategy;
use super::runqueue::ReadyQueue;
use super::selector::select_next;
use super::statistics::SchedulerStats;
use crate::config::SchedConfig;
use crate::logger;
use crate::sched_assert;
use crate::scheduler::fixed_point::FixedPoint;
use crate::scheduler::thread::{
    alloc_thread_id, check_priority, Priority, Thread, ThreadId, ThreadRegistry, ThreadState,
    PRI_DEFAULT, PRI_MIN,
};
use crate::sync::LockId;

/// Scheduler state, protected by the global `SCHEDULER` lock
pub struct Scheduler {
    config: SchedConfig,
    threads: ThreadRegistry,
    ready: ReadyQueue,

    /// The RUNNING thread (possibly idle)
    current: ThreadId,
    idle: ThreadId,

    /// Timer ticks since boot
    ticks: u64,
    /// Ticks consumed by `current` since it was scheduled
    slice_ticks: u32,

    load_avg: FixedPoint,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Turn the boot context into the RUNNING "main" thread and create idle
    pub fn new(config: SchedConfig) -> Self {
        let mut threads = ThreadRegistry::new();

        let main = alloc_thread_id();
        let mut boot = Thread::new(main, "main", PRI_DEFAULT);
        boot.set_state(ThreadState::Running);
        threads.insert(boot);

        let idle = alloc_thread_id();
        threads.insert(Thread::new(idle, "idle", PRI_MIN));

        logger::info(&format!(
            "[SCHED] {} strategy, {} Hz timer, {}-tick slice (main TID {}, idle TID {})",
            config.strategy(),
            config.timer_freq(),
            config.time_slice(),
            main,
            idle
        ));

        Self {
            config,
            threads,
            ready: ReadyQueue::new(),
            current: main,
            idle,
            ticks: 0,
            slice_ticks: 0,
            load_avg: FixedPoint::ZERO,
            stats: SchedulerStats::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════

    /// Strategy chosen at boot, fixed for the scheduler's lifetime
    pub fn strategy(&self) -> SchedulingStrategy {
        self.config.strategy()
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn current(&self) -> ThreadId {
        self.current
    }

    pub fn idle_thread(&self) -> ThreadId {
        self.idle
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    pub fn threads(&self) -> &ThreadRegistry {
        &self.threads
    }

    /// Registered and not exiting
    pub fn is_alive(&self, id: ThreadId) -> bool {
        self.threads
            .get(id)
            .map_or(false, |thread| thread.state() != ThreadState::Dying)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// READY threads in queue order
    pub fn ready_threads(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ready.iter()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    // ═══════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════

    /// Create a READY thread. Yields if it outranks the caller.
    pub fn spawn(&mut self, name: &str, priority: Priority) -> ThreadId {
        check_priority(priority);

        let id = alloc_thread_id();
        let parent = self.threads.expect(self.current);
        let mut thread = Thread::new(id, name, priority);
        thread.set_nice(parent.nice());
        thread.set_recent_cpu(parent.recent_cpu());
        if self.strategy().computes_priority() {
            thread.set_base_priority(mlfqs::derive_priority(thread.recent_cpu(), thread.nice()));
        }

        logger::debug(&format!(
            "[SPAWN] '{}' -> TID {} (priority {})",
            name,
            id,
            thread.base_priority()
        ));

        self.threads.insert(thread);
        self.enqueue(id);
        self.stats.record_spawn();
        self.preempt_if_needed();
        id
    }

    /// Pick the next thread and make it RUNNING.
    ///
    /// A still-RUNNING caller goes back to the ready queue first. A DYING
    /// predecessor is reaped once switched away from.
    pub fn schedule(&mut self) {
        let prev = self.current;
        if self.threads.expect(prev).state() == ThreadState::Running {
            self.requeue(prev);
        }

        let next = if self.ready.is_empty() {
            self.idle
        } else {
            select_next(self.strategy(), &mut self.ready, &self.threads)
        };

        self.threads.expect_mut(next).set_state(ThreadState::Running);
        self.current = next;
        self.slice_ticks = 0;

        if next == prev {
            return;
        }

        self.stats.record_switch();
        log::trace!("[SCHED] switch {} -> {}", prev, next);

        if self.threads.expect(prev).state() == ThreadState::Dying {
            self.threads.remove(prev);
            logger::debug(&format!("[EXIT] thread {} reaped", prev));
        }
    }

    /// Give up the CPU; the caller stays READY
    pub fn yield_now(&mut self) {
        self.schedule();
    }

    /// RUNNING -> BLOCKED, then switch
    pub fn block_current(&mut self) {
        self.assert_not_idle("block");
        let id = self.current;
        self.threads.expect_mut(id).set_state(ThreadState::Blocked);
        log::trace!("[BLOCK] thread {} blocked", id);
        self.schedule();
    }

    /// BLOCKED -> READY, enqueued at the back. Does not preempt.
    ///
    /// Cancels any pending sleep deadline, whoever does the waking.
    pub fn unblock(&mut self, id: ThreadId) {
        let thread = self.threads.expect_mut(id);
        let from = thread.state();
        sched_assert!(
            from == ThreadState::Blocked,
            Invariant::InvalidTransition { thread: id, from, to: ThreadState::Ready }
        );
        thread.set_sleep_until(None);
        thread.set_state(ThreadState::Ready);
        self.enqueue(id);
        log::trace!("[UNBLOCK] thread {} ready", id);
    }

    /// RUNNING -> DYING, then switch (the thread is reaped on the way out)
    pub fn exit_current(&mut self) {
        self.assert_not_idle("exit");
        let id = self.current;
        self.threads.expect_mut(id).set_state(ThreadState::Dying);
        logger::debug(&format!("[EXIT] thread {} exiting", id));
        self.schedule();
    }

    /// A READY thread should take over the CPU now
    pub fn should_preempt(&self) -> bool {
        let best = match self.ready.iter().map(|id| self.threads.effective_priority(id)).max() {
            Some(priority) => priority,
            None => return false,
        };
        if self.current == self.idle {
            return true;
        }
        self.strategy().is_preemptive() && best > self.threads.effective_priority(self.current)
    }

    /// Yield if `should_preempt`; returns whether it did
    pub fn preempt_if_needed(&mut self) -> bool {
        if self.should_preempt() {
            self.yield_now();
            true
        } else {
            false
        }
    }

    fn enqueue(&mut self, id: ThreadId) {
        debug_assert!(self.threads.expect(id).state().is_schedulable());
        debug_assert!(id != self.idle);
        self.ready.push_back(id);
    }

    /// RUNNING -> READY; idle is never queued
    fn requeue(&mut self, id: ThreadId) {
        self.threads.expect_mut(id).set_state(ThreadState::Ready);
        if id != self.idle {
            self.enqueue(id);
        }
    }

    fn assert_not_idle(&self, operation: &'static str) {
        sched_assert!(self.current != self.idle, Invariant::IdleMisuse { operation });
    }

    // ═══════════════════════════════════════════════════════════════
    // Priority, nice and metrics
    // ═══════════════════════════════════════════════════════════════

    /// Set the running thread's base priority. Ignored when priorities are
    /// computed (advanced strategy).
    pub fn set_priority(&mut self, priority: Priority) {
        check_priority(priority);
        self.assert_not_idle("change priority");
        if self.strategy().computes_priority() {
            log::debug!("[SCHED] set_priority({}) ignored, priorities are computed", priority);
            return;
        }

        let id = self.current;
        self.threads.expect_mut(id).set_base_priority(priority);
        self.preempt_if_needed();
    }

    /// Effective priority of the running thread
    pub fn get_priority(&self) -> Priority {
        self.threads.effective_priority(self.current)
    }

    pub fn set_nice(&mut self, nice: i32) {
        self.assert_not_idle("change nice");
        let id = self.current;
        let computes = self.strategy().computes_priority();

        let thread = self.threads.expect_mut(id);
        thread.set_nice(nice);
        if computes {
            let priority = mlfqs::derive_priority(thread.recent_cpu(), nice);
            thread.set_base_priority(priority);
        }
        self.preempt_if_needed();
    }

    pub fn get_nice(&self) -> i32 {
        self.threads.expect(self.current).nice()
    }

    /// 100 times the running thread's `recent_cpu`, rounded
    pub fn get_recent_cpu(&self) -> i32 {
        mlfqs::hundredths(self.threads.expect(self.current).recent_cpu())
    }

    /// 100 times the system load average, rounded
    pub fn get_load_avg(&self) -> i32 {
        mlfqs::hundredths(self.load_avg)
    }

    pub fn load_avg(&self) -> FixedPoint {
        self.load_avg
    }

    // ═══════════════════════════════════════════════════════════════
    // Time
    // ═══════════════════════════════════════════════════════════════

    /// Block the running thread for at least `ticks` timer ticks
    pub fn sleep_current(&mut self, ticks: u64) {
        if ticks == 0 {
            return;
        }
        self.assert_not_idle("sleep");

        let id = self.current;
        let wake_at = self.ticks + ticks;
        self.threads.expect_mut(id).set_sleep_until(Some(wake_at));
        log::trace!("[SLEEP] thread {} until tick {}", id, wake_at);
        self.block_current();
    }

    /// Timer interrupt. Returns `true` when the caller should reschedule
    /// (time slice used up, or a READY thread outranks the running one).
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        let on_idle = self.current == self.idle;
        self.stats.record_tick(on_idle);

        if self.strategy().computes_priority() {
            self.update_metrics(on_idle);
        }
        self.wake_sleepers();

        self.slice_ticks += 1;
        self.slice_ticks >= self.config.time_slice() || self.should_preempt()
    }

    fn wake_sleepers(&mut self) {
        let now = self.ticks;
        let due: Vec<ThreadId> = self
            .threads
            .iter()
            .filter(|thread| thread.state() == ThreadState::Blocked)
            .filter(|thread| thread.sleep_until().map_or(false, |at| at <= now))
            .map(Thread::id)
            .collect();

        for id in due {
            self.unblock(id);
        }
    }

    fn update_metrics(&mut self, on_idle: bool) {
        let idle = self.idle;

        if !on_idle {
            let current = self.current;
            let running = self.threads.expect_mut(current);
            running.set_recent_cpu(running.recent_cpu() + 1);
        }

        if self.ticks % u64::from(self.config.timer_freq()) == 0 {
            // READY threads plus the running one, idle excluded
            let ready_threads = self
                .threads
                .iter()
                .filter(|thread| thread.id() != idle && thread.state().is_active())
                .count();
            self.load_avg = mlfqs::update_load_avg(self.load_avg, ready_threads);

            let load = self.load_avg;
            for thread in self.threads.iter_mut().filter(|thread| thread.id() != idle) {
                let decayed = mlfqs::decay_recent_cpu(thread.recent_cpu(), load, thread.nice());
                thread.set_recent_cpu(decayed);
            }
        }

        if self.ticks % PRIORITY_RECALC_TICKS == 0 {
            for thread in self.threads.iter_mut().filter(|thread| thread.id() != idle) {
                let priority = mlfqs::derive_priority(thread.recent_cpu(), thread.nice());
                thread.set_base_priority(priority);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // Donation
    // ═══════════════════════════════════════════════════════════════

    pub fn accept_donation(&mut self, holder: ThreadId, donor: ThreadId, lock: LockId) {
        self.threads.accept_donation(holder, donor, lock);
    }

    pub fn retrieve_donation(&mut self, holder: ThreadId, lock: LockId) -> usize {
        self.threads.retrieve_donation(holder, lock)
    }

    pub fn withdraw_donation(&mut self, holder: ThreadId, donor: ThreadId) -> usize {
        self.threads.withdraw_donation(holder, donor)
    }

    pub fn effective_priority(&self, id: ThreadId) -> Priority {
        self.threads.effective_priority(id)
    }

    /// Print statistics
    pub fn log_stats(&self) {
        logger::info("=== Scheduler Statistics ===");
        logger::info(&format!("Strategy:       {}", self.strategy()));
        logger::info(&format!(
            "Threads:        {} ({} ready)",
            self.threads.len(),
            self.ready.len()
        ));
        logger::info(&format!(
            "Ticks:          {} idle, {} kernel",
            self.stats.idle_ticks, self.stats.kernel_ticks
        ));
        logger::info(&format!("Total switches: {}", self.stats.total_switches));
        logger::info(&format!("Total spawns:   {}", self.stats.total_spawns));
        logger::info(&format!("Load average:   {}", self.load_avg));
    }
}
