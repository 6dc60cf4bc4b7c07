//! Ready queue
//!
//! Arrival-ordered list of READY thread IDs. Preempted threads go back at
//! the tail, so popping the front is round robin.

use alloc::collections::VecDeque;

use crate::scheduler::thread::ThreadId;

#[derive(Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<ThreadId>,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn push_back(&mut self, id: ThreadId) {
        self.queue.push_back(id);
    }

    pub fn pop_front(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    /// Remove the entry at `index` (queue order)
    pub fn remove_at(&mut self, index: usize) -> Option<ThreadId> {
        self.queue.remove(index)
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.queue.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl FromIterator<ThreadId> for ReadyQueue {
    fn from_iter<I: IntoIterator<Item = ThreadId>>(iter: I) -> Self {
        Self {
            queue: iter.into_iter().collect(),
        }
    }
}
