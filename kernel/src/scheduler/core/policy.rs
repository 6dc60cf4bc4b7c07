//! Scheduling Strategies
//!
//! One strategy is chosen at boot and stays fixed:
//! - NAIVE: plain FIFO / round robin
//! - PRIORITY: highest effective priority first, ties in queue order
//! - ADVANCED: MLFQS metrics drive the base priorities; selection itself
//!   still pops the queue front, like NAIVE

use core::fmt;

use super::error::{violation, Invariant};

/// Strategy identifiers (raw values match the boot ABI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SchedulingStrategy {
    /// Effective-priority selection with donation
    Priority = 0,
    /// MLFQS metrics, FIFO selection
    Advanced = 1,
    /// FIFO / round robin
    Naive = 2,
}

impl SchedulingStrategy {
    /// Create from raw value
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Priority),
            1 => Some(Self::Advanced),
            2 => Some(Self::Naive),
            _ => None,
        }
    }

    /// Create from raw value, halting on an unmatched one
    pub fn from_raw_checked(value: u32) -> Self {
        match Self::from_raw(value) {
            Some(strategy) => strategy,
            None => violation(Invariant::UnknownStrategy { raw: value }),
        }
    }

    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Parse a boot option name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "naive" | "rr" => Some(Self::Naive),
            "priority" => Some(Self::Priority),
            "advanced" | "mlfqs" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::Priority => "priority",
            Self::Advanced => "advanced",
        }
    }

    /// Does a higher-priority ready thread preempt the running one?
    pub fn is_preemptive(self) -> bool {
        matches!(self, Self::Priority | Self::Advanced)
    }

    /// Are base priorities computed from MLFQS metrics?
    pub fn computes_priority(self) -> bool {
        matches!(self, Self::Advanced)
    }
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        Self::Priority
    }
}

impl fmt::Display for SchedulingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
