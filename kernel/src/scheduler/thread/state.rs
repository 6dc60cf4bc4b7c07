//! State - Thread state machine
//!
//! Manages thread lifecycle and state transitions

use core::fmt;

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ThreadState {
    /// Thread is currently running
    Running = 0,

    /// Thread is ready to run
    Ready = 1,

    /// Thread is blocked (lock, semaphore, sleep)
    Blocked = 2,

    /// Thread has exited and is about to be reaped
    Dying = 3,
}

impl ThreadState {
    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if state is active
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Ready)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Ready => write!(f, "Ready"),
            Self::Blocked => write!(f, "Blocked"),
            Self::Dying => write!(f, "Dying"),
        }
    }
}

/// Validate state transition
pub fn validate_transition(from: ThreadState, to: ThreadState) -> bool {
    use ThreadState::*;

    match (from, to) {
        // Ready -> Running
        (Ready, Running) => true,

        // Running -> Ready (preemption, yield)
        (Running, Ready) => true,

        // Running -> Blocked (lock, semaphore, sleep)
        (Running, Blocked) => true,

        // Running -> Dying
        (Running, Dying) => true,

        // Blocked -> Ready
        (Blocked, Ready) => true,

        // Dying is terminal, everything else is a bug
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ThreadState::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(validate_transition(Ready, Running));
        assert!(validate_transition(Running, Ready));
        assert!(validate_transition(Running, Blocked));
        assert!(validate_transition(Blocked, Ready));
        assert!(validate_transition(Running, Dying));
    }

    #[test]
    fn test_dying_is_terminal() {
        for to in [Running, Ready, Blocked, Dying] {
            assert!(!validate_transition(Dying, to));
        }
    }

    #[test]
    fn test_blocked_cannot_run_directly() {
        assert!(!validate_transition(Blocked, Running));
        assert!(!validate_transition(Ready, Blocked));
    }

    #[test]
    fn test_schedulable() {
        assert!(Ready.is_schedulable());
        assert!(!Running.is_schedulable());
        assert!(Running.is_active());
        assert!(!Blocked.is_active());
    }
}
