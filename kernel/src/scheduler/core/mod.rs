//! Scheduler core module
//!
//! - `policy` / `selector` / `runqueue`: which READY thread runs next
//! - `mlfqs`: advanced-strategy metric formulas
//! - `scheduler`: the scheduler state machine itself
//! - `error`: fatal invariant reporting

pub mod error;
pub mod mlfqs;
pub mod policy;
pub mod runqueue;
pub mod scheduler;
pub mod selector;
pub mod statistics;

pub use error::{violation, Invariant};
pub use policy::SchedulingStrategy;
pub use runqueue::ReadyQueue;
pub use scheduler::Scheduler;
pub use selector::select_next;
pub use statistics::SchedulerStats;
