//! Thread module

pub mod donation;
pub mod registry;
pub mod state;
pub mod thread;

pub use donation::{DonationLedger, DonationRecord, RemovedDonors, MAX_DONATIONS};
pub use registry::ThreadRegistry;
pub use state::{validate_transition, ThreadState};
pub use thread::{
    alloc_thread_id, check_nice, check_priority, LockWait, Priority, Thread, ThreadId, NICE_DEFAULT,
    NICE_MAX, NICE_MIN, PRI_DEFAULT, PRI_MAX, PRI_MIN,
};
