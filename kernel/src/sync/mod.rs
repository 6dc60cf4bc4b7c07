//! Synchronization primitives built on the scheduler

pub mod lock;

pub use lock::{AcquireOutcome, Lock, LockId};
