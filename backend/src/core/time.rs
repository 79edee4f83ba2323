//! Simulation time
//!
//! Time is continuous (one unit = one day in the farm models) and totally
//! ordered. Two sentinels exist: [`SimTime::INFINITY`] means "nothing
//! scheduled" and [`SimTime::NEG_INFINITY`] means "never happened".
//!
//! Equality between clock values derived from sums and differences is tested
//! with [`SimTime::approx_eq`], never with `==`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// Absolute tolerance used when comparing two clock values.
pub const TIME_EPSILON: f64 = 1e-6;

/// A point in simulation time, or a duration between two such points.
///
/// # Example
/// ```
/// use agrisim_core::SimTime;
///
/// let start = SimTime::new(10.0);
/// let end = start + SimTime::new(5.0);
/// assert!(end.approx_eq(SimTime::new(15.0)));
/// assert!(SimTime::INFINITY > end);
/// assert_eq!(end - start, SimTime::new(5.0));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    /// "No event scheduled"
    pub const INFINITY: SimTime = SimTime(f64::INFINITY);

    /// "Never happened"
    pub const NEG_INFINITY: SimTime = SimTime(f64::NEG_INFINITY);

    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a time value
    ///
    /// # Panics
    /// Panics if `value` is NaN
    pub fn new(value: f64) -> Self {
        assert!(!value.is_nan(), "simulation time must not be NaN");
        Self(value)
    }

    /// Raw value in time units
    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// True for the `INFINITY` sentinel only
    pub fn is_infinity(self) -> bool {
        self.0 == f64::INFINITY
    }

    /// True for the `NEG_INFINITY` sentinel only
    pub fn is_neg_infinity(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }

    /// Tolerant equality (see [`TIME_EPSILON`])
    ///
    /// Sentinels are only equal to themselves.
    pub fn approx_eq(self, other: SimTime) -> bool {
        if !self.is_finite() || !other.is_finite() {
            return self.0 == other.0;
        }
        (self.0 - other.0).abs() <= TIME_EPSILON
    }

    /// `self <= other` within tolerance
    pub fn approx_le(self, other: SimTime) -> bool {
        self < other || self.approx_eq(other)
    }

    /// Remaining duration from `now` until `self`, clamped at zero
    ///
    /// Returns `INFINITY` when `self` is `INFINITY`. Used to turn an absolute
    /// next-event time into a time advance.
    ///
    /// # Example
    /// ```
    /// use agrisim_core::SimTime;
    ///
    /// assert_eq!(SimTime::new(15.0).remaining_from(SimTime::new(10.0)), SimTime::new(5.0));
    /// assert_eq!(SimTime::new(9.9999999).remaining_from(SimTime::new(10.0)), SimTime::ZERO);
    /// assert!(SimTime::INFINITY.remaining_from(SimTime::new(10.0)).is_infinity());
    /// ```
    pub fn remaining_from(self, now: SimTime) -> SimTime {
        if self.is_infinity() {
            return SimTime::INFINITY;
        }
        SimTime((self.0 - now.0).max(0.0))
    }

    pub fn min(self, other: SimTime) -> SimTime {
        if self <= other {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: SimTime) -> SimTime {
        if self >= other {
            self
        } else {
            other
        }
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ZERO
    }
}

impl From<f64> for SimTime {
    fn from(value: f64) -> Self {
        SimTime::new(value)
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime::new(self.0 + rhs.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: f64) -> SimTime {
        SimTime::new(self.0 + rhs)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime::new(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinity() {
            write!(f, "+inf")
        } else if self.is_neg_infinity() {
            write!(f, "-inf")
        } else {
            write!(f, "{:.3}", self.0)
        }
    }
}
