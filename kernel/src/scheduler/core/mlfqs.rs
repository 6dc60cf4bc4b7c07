//! Advanced scheduler metrics (MLFQS)
//!
//! Pure formulas over `FixedPoint`; the scheduler decides when to apply them.
//!
//! - `load_avg   = 59/60 * load_avg + 1/60 * ready_threads`   (once per second)
//! - `recent_cpu = (2*load_avg)/(2*load_avg + 1) * recent_cpu + nice`   (once per second)
//! - `priority   = PRI_MAX - recent_cpu/4 - 2*nice`   (every 4th tick)

use crate::scheduler::fixed_point::FixedPoint;
use crate::scheduler::thread::{Priority, PRI_MAX, PRI_MIN};

/// Ticks between two priority recomputations
pub const PRIORITY_RECALC_TICKS: u64 = 4;

/// Exponentially weighted moving average of the ready thread count
pub fn update_load_avg(load_avg: FixedPoint, ready_threads: usize) -> FixedPoint {
    let ready = ready_threads.min(i32::MAX as usize) as i32;
    let decay = FixedPoint::from_int(59) / 60;
    let weight = FixedPoint::ONE / 60;
    decay * load_avg + weight * ready
}

/// Decay `recent_cpu` so it forgets roughly 90% of its history over a few seconds
/// at a load of one
pub fn decay_recent_cpu(recent_cpu: FixedPoint, load_avg: FixedPoint, nice: i32) -> FixedPoint {
    let twice_load = load_avg * 2;
    let coefficient = twice_load / (twice_load + 1);
    coefficient * recent_cpu + nice
}

/// Priority derived from CPU usage and niceness, clamped to the valid range
pub fn derive_priority(recent_cpu: FixedPoint, nice: i32) -> Priority {
    let priority = (FixedPoint::from_int(PRI_MAX) - recent_cpu / 4 - nice * 2).to_int_truncate();
    priority.clamp(PRI_MIN, PRI_MAX)
}

/// User-facing view: 100 times the value, rounded to nearest
pub fn hundredths(value: FixedPoint) -> i32 {
    value.mul_int_round(100)
}
