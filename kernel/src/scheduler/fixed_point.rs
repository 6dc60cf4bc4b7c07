//! Fixed-point arithmetic (17.14)
//!
//! Signed 32-bit fractional numbers used by the advanced scheduler to compute
//! `recent_cpu` and the load average without touching the FPU.
//!
//! The raw integer is read as `value / 2^14`. Every operation goes through a
//! 64-bit intermediate and is checked on the way back: a result outside the
//! `i32` range is a kernel bug and halts through [`violation`], it never wraps.
//!
//! | operation       | expression                 |
//! |-----------------|----------------------------|
//! | add / subtract  | `a + b`, `a - b`           |
//! | add/sub integer | `a + n`, `a - n`           |
//! | multiply        | `a * b` (`a*b / 2^q`)      |
//! | multiply int    | `a * n`                    |
//! | divide          | `a / b` (`a*2^q / b`)      |
//! | divide int      | `a / n` (raw division)     |

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

use static_assertions::const_assert_eq;

use crate::scheduler::core::error::{violation, Invariant};

/// Integer bits (sign excluded)
pub const FIXED_POINT_P: u32 = 17;

/// Fractional bits
pub const FIXED_POINT_Q: u32 = 32 - FIXED_POINT_P - 1;

/// Scale factor `2^q`
const F: i64 = 1 << FIXED_POINT_Q;

const_assert_eq!(FIXED_POINT_Q, 14);

/// 17.14 signed fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint(i32);

/// Narrow a 64-bit intermediate back to the 32-bit representation
#[inline]
fn narrow(value: i64, op: &'static str) -> FixedPoint {
    match i32::try_from(value) {
        Ok(raw) => FixedPoint(raw),
        Err(_) => violation(Invariant::FixedPointOverflow { op }),
    }
}

impl FixedPoint {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(F as i32);

    /// Wrap an already-scaled raw value
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Underlying scaled integer
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// `n * 2^q`
    pub fn from_int(n: i32) -> Self {
        narrow(n as i64 * F, "from_int")
    }

    /// Integer part, truncated toward zero
    pub fn to_int_truncate(self) -> i32 {
        (self.0 as i64 / F) as i32
    }

    /// Nearest integer, ties away from zero
    pub fn to_int_round(self) -> i32 {
        round_unscaled(self.0 as i64) as i32
    }

    /// `self * n` rounded to the nearest integer, ties away from zero.
    ///
    /// The product stays in 64 bits, so only the integer result has to fit.
    pub fn mul_int_round(self, n: i32) -> i32 {
        match i32::try_from(round_unscaled(self.0 as i64 * n as i64)) {
            Ok(value) => value,
            Err(_) => violation(Invariant::FixedPointOverflow { op: "multiply_int_round" }),
        }
    }
}

/// Drop the `2^q` scale of a raw value, rounding half away from zero
#[inline]
fn round_unscaled(scaled: i64) -> i64 {
    if scaled >= 0 {
        (scaled + F / 2) / F
    } else {
        (scaled - F / 2) / F
    }
}

impl Add for FixedPoint {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        narrow(self.0 as i64 + rhs.0 as i64, "add")
    }
}

impl Sub for FixedPoint {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        narrow(self.0 as i64 - rhs.0 as i64, "subtract")
    }
}

impl Add<i32> for FixedPoint {
    type Output = Self;

    fn add(self, n: i32) -> Self {
        narrow(self.0 as i64 + n as i64 * F, "add_int")
    }
}

impl Sub<i32> for FixedPoint {
    type Output = Self;

    fn sub(self, n: i32) -> Self {
        narrow(self.0 as i64 - n as i64 * F, "subtract_int")
    }
}

impl Mul for FixedPoint {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        narrow(self.0 as i64 * rhs.0 as i64 / F, "multiply")
    }
}

impl Mul<i32> for FixedPoint {
    type Output = Self;

    fn mul(self, n: i32) -> Self {
        narrow(self.0 as i64 * n as i64, "multiply_int")
    }
}

impl Div for FixedPoint {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        if rhs.0 == 0 {
            violation(Invariant::DivideByZero { op: "divide" });
        }
        narrow(self.0 as i64 * F / rhs.0 as i64, "divide")
    }
}

impl Div<i32> for FixedPoint {
    type Output = Self;

    /// Divides the scaled value; `n` is not promoted.
    fn div(self, n: i32) -> Self {
        if n == 0 {
            violation(Invariant::DivideByZero { op: "divide_int" });
        }
        narrow(self.0 as i64 / n as i64, "divide_int")
    }
}

impl Neg for FixedPoint {
    type Output = Self;

    fn neg(self) -> Self {
        narrow(-(self.0 as i64), "negate")
    }
}

impl fmt::Display for FixedPoint {
    /// Two decimals, rounded half away from zero (status reports)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hundredths = round_unscaled(self.0 as i64 * 100);
        let sign = if hundredths < 0 { "-" } else { "" };
        let magnitude = hundredths.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}
