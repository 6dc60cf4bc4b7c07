//! Next-thread selection
//!
//! Called at every preemption point with the current ready set. The caller
//! falls back to the idle thread itself, so an empty queue here is a bug.

use super::error::{violation, Invariant};
use super::policy::SchedulingStrategy;
use super::runqueue::ReadyQueue;
use crate::sched_assert;
use crate::scheduler::thread::{Priority, ThreadId, ThreadRegistry, PRI_MIN};

/// Remove and return the thread that runs next
pub fn select_next(
    strategy: SchedulingStrategy,
    ready: &mut ReadyQueue,
    registry: &ThreadRegistry,
) -> ThreadId {
    sched_assert!(!ready.is_empty(), Invariant::EmptyReadyQueue);

    let picked = match strategy {
        SchedulingStrategy::Priority => select_highest(ready, registry),
        // Advanced only rewrites base priorities; it picks like Naive.
        SchedulingStrategy::Naive | SchedulingStrategy::Advanced => ready.pop_front(),
    };

    match picked {
        Some(id) => id,
        None => violation(Invariant::EmptyReadyQueue),
    }
}

/// First thread in queue order with the highest effective priority
fn select_highest(ready: &mut ReadyQueue, registry: &ThreadRegistry) -> Option<ThreadId> {
    let mut best = None;
    let mut best_priority: Priority = PRI_MIN - 1;

    for (index, id) in ready.iter().enumerate() {
        let priority = registry.effective_priority(id);
        // Strictly greater: the earliest of equals keeps the slot
        if priority > best_priority {
            best_priority = priority;
            best = Some(index);
        }
    }

    ready.remove_at(best?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::core::mlfqs::derive_priority;
    use crate::scheduler::fixed_point::FixedPoint;
    use crate::scheduler::thread::{alloc_thread_id, Thread};
    use crate::sync::LockId;
    use alloc::vec::Vec;

    fn registry_with(priorities: &[Priority]) -> (ThreadRegistry, Vec<ThreadId>) {
        let mut registry = ThreadRegistry::new();
        let ids = priorities
            .iter()
            .map(|&priority| {
                let id = alloc_thread_id();
                registry.insert(Thread::new(id, "t", priority));
                id
            })
            .collect();
        (registry, ids)
    }

    #[test]
    fn test_naive_is_fifo() {
        let (registry, ids) = registry_with(&[1, 50, 20]);
        let mut ready: ReadyQueue = ids.iter().copied().collect();

        for &expected in &ids {
            assert_eq!(select_next(SchedulingStrategy::Naive, &mut ready, &registry), expected);
        }
        assert!(ready.is_empty());
    }

    #[test]
    fn test_priority_ties_favor_queue_order() {
        let (registry, ids) = registry_with(&[5, 9, 9]);
        let mut ready: ReadyQueue = ids.iter().copied().collect();

        assert_eq!(select_next(SchedulingStrategy::Priority, &mut ready, &registry), ids[1]);
        assert_eq!(ready.iter().collect::<Vec<_>>(), [ids[0], ids[2]]);
        assert_eq!(select_next(SchedulingStrategy::Priority, &mut ready, &registry), ids[2]);
    }

    #[test]
    fn test_priority_uses_effective_priority() {
        let (mut registry, ids) = registry_with(&[10, 30, 40]);
        // ids[2] waits on a lock held by ids[0], lifting it to 40
        registry.accept_donation(ids[0], ids[2], LockId::alloc());
        let mut ready: ReadyQueue = [ids[0], ids[1]].into_iter().collect();

        assert_eq!(select_next(SchedulingStrategy::Priority, &mut ready, &registry), ids[0]);
    }

    #[test]
    fn test_priority_min_is_selectable() {
        let (registry, ids) = registry_with(&[PRI_MIN]);
        let mut ready: ReadyQueue = ids.iter().copied().collect();
        assert_eq!(select_next(SchedulingStrategy::Priority, &mut ready, &registry), ids[0]);
    }

    #[test]
    fn test_advanced_falls_through_to_fifo() {
        let (mut registry, ids) = registry_with(&[31, 31, 31]);
        for (&id, nice) in ids.iter().zip([0, -5, 0]) {
            let thread = registry.expect_mut(id);
            thread.set_nice(nice);
            thread.set_recent_cpu(FixedPoint::from_int(40));
            thread.set_base_priority(derive_priority(thread.recent_cpu(), nice));
        }
        assert!(registry.effective_priority(ids[1]) > registry.effective_priority(ids[0]));
        let mut ready: ReadyQueue = ids.iter().copied().collect();

        // ids[1] has the highest derived priority, but the queue front still wins.
        assert_eq!(select_next(SchedulingStrategy::Advanced, &mut ready, &registry), ids[0]);
        assert_eq!(select_next(SchedulingStrategy::Advanced, &mut ready, &registry), ids[1]);
        assert_eq!(select_next(SchedulingStrategy::Advanced, &mut ready, &registry), ids[2]);
    }

    #[test]
    #[should_panic(expected = "select_next on an empty ready queue")]
    fn test_empty_queue_is_fatal() {
        let registry = ThreadRegistry::new();
        let mut ready = ReadyQueue::new();
        select_next(SchedulingStrategy::Priority, &mut ready, &registry);
    }
}
