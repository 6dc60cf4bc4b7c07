//! Scheduler boot configuration
//!
//! Built once at boot, usually from the kernel command line, then handed to
//! `scheduler::init`. Nothing here changes after the scheduler exists.

use alloc::string::{String, ToString};
use core::fmt;

use static_assertions::const_assert;

use crate::scheduler::core::policy::SchedulingStrategy;

/// Default timer interrupts per second
pub const TIMER_FREQ: u32 = 100;

/// Accepted timer frequency range
pub const TIMER_FREQ_MIN: u32 = 19;
pub const TIMER_FREQ_MAX: u32 = 1000;

/// Default ticks per time slice
pub const TIME_SLICE: u32 = 4;

const_assert!(TIMER_FREQ >= TIMER_FREQ_MIN && TIMER_FREQ <= TIMER_FREQ_MAX);
const_assert!(TIME_SLICE > 0);

/// Bad boot option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Strategy name nobody knows
    UnknownStrategy(String),

    /// Value present but unparsable or out of range
    InvalidValue { key: &'static str, value: String },

    /// Option given without its value
    MissingValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownStrategy(name) => write!(f, "unknown scheduling strategy '{}'", name),
            Self::InvalidValue { key, value } => write!(f, "invalid value '{}' for {}", value, key),
            Self::MissingValue(key) => write!(f, "missing value for {}", key),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Next-thread selection strategy
    strategy: SchedulingStrategy,

    /// Timer interrupts per second (MLFQS "once per second" period)
    timer_freq: u32,

    /// Ticks before the running thread must yield
    time_slice: u32,
}

impl SchedConfig {
    /// Create default configuration
    pub const fn new() -> Self {
        Self {
            strategy: SchedulingStrategy::Priority,
            timer_freq: TIMER_FREQ,
            time_slice: TIME_SLICE,
        }
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Select the scheduling strategy
    pub fn set_strategy(&mut self, strategy: SchedulingStrategy) {
        self.strategy = strategy;
        log::info!("Scheduling strategy set to: {}", strategy);
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Set the timer frequency (Hz)
    pub fn set_timer_freq(&mut self, hz: u32) -> Result<(), ConfigError> {
        if !(TIMER_FREQ_MIN..=TIMER_FREQ_MAX).contains(&hz) {
            return Err(ConfigError::InvalidValue { key: "timer_freq", value: hz.to_string() });
        }
        self.timer_freq = hz;
        log::info!("Timer frequency set to: {} Hz", hz);
        Ok(())
    }

    pub fn timer_freq(&self) -> u32 {
        self.timer_freq
    }

    /// Set the time slice (ticks)
    pub fn set_time_slice(&mut self, ticks: u32) -> Result<(), ConfigError> {
        if ticks == 0 {
            return Err(ConfigError::InvalidValue { key: "time_slice", value: ticks.to_string() });
        }
        self.time_slice = ticks;
        log::info!("Time slice set to: {} ticks", ticks);
        Ok(())
    }

    pub fn time_slice(&self) -> u32 {
        self.time_slice
    }

    /// Load configuration from kernel parameters
    ///
    /// Example: `-o mlfqs timer_freq=250 time_slice=8`, or `sched=naive`.
    /// Unrelated parameters are skipped.
    pub fn from_cmdline(cmdline: &str) -> Result<Self, ConfigError> {
        log::debug!("Loading scheduler config from command line");

        let mut config = Self::new();
        let mut words = cmdline.split_whitespace();

        while let Some(word) = words.next() {
            if word == "-o" {
                let option = words.next().ok_or(ConfigError::MissingValue("-o"))?;
                config.set_strategy(parse_strategy(option)?);
                continue;
            }

            let (key, value) = match word.split_once('=') {
                Some(pair) => pair,
                None => continue,
            };
            match key {
                "sched" => config.set_strategy(parse_strategy(value)?),
                "timer_freq" => config.set_timer_freq(parse_number("timer_freq", value)?)?,
                "time_slice" => config.set_time_slice(parse_number("time_slice", value)?)?,
                _ => {}
            }
        }

        Ok(config)
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_strategy(name: &str) -> Result<SchedulingStrategy, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::MissingValue("sched"));
    }
    SchedulingStrategy::from_name(name).ok_or_else(|| ConfigError::UnknownStrategy(name.into()))
}

fn parse_number(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingValue(key));
    }
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value: value.into() })
}
