//! Forecast / smoothing helper
//!
//! A [`ForecastSeries`] holds `prediction_size + 2` values:
//!
//! ```text
//! [0] value one step ago
//! [1] value now
//! [2..] predicted future steps
//! ```
//!
//! Every observation shifts the two observed slots and regenerates all the
//! predictions from scratch: slot `i` is drawn from a normal distribution
//! centred on the mean of slots `[0, i)`, with a standard deviation equal to
//! `|x[i-2] - x[i-1]|` (1.0 when that difference is exactly zero).

use crate::rng::RngManager;
use serde::{Deserialize, Serialize};

/// Index of the most recent observation
pub const CURRENT: usize = 1;

/// Index of the previous observation
pub const PREVIOUS: usize = 0;

/// Rain/ETP extrapolation buffer
///
/// # Example
/// ```
/// use agrisim_core::forecast::ForecastSeries;
/// use agrisim_core::RngManager;
///
/// let mut rng = RngManager::new(42);
/// let mut rain = ForecastSeries::new(5);
///
/// rain.observe(3.0, &mut rng);
/// rain.observe(1.0, &mut rng);
///
/// assert_eq!(rain.previous(), 3.0);
/// assert_eq!(rain.current(), 1.0);
/// assert_eq!(rain.values().len(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    values: Vec<f64>,
    observed: bool,
}

impl ForecastSeries {
    /// # Panics
    /// Panics if `prediction_size` is zero
    pub fn new(prediction_size: usize) -> Self {
        assert!(prediction_size > 0, "prediction size must be positive");
        Self {
            values: vec![0.0; prediction_size + 2],
            observed: false,
        }
    }

    /// Record a new observation and regenerate the predictions
    ///
    /// The very first observation fills both observed slots.
    pub fn observe(&mut self, value: f64, rng: &mut RngManager) {
        self.values[PREVIOUS] = if self.observed {
            self.values[CURRENT]
        } else {
            value
        };
        self.values[CURRENT] = value;
        self.observed = true;

        self.regenerate(rng);
    }

    fn regenerate(&mut self, rng: &mut RngManager) {
        for i in 2..self.values.len() {
            let mean = self.values[..i].iter().sum::<f64>() / i as f64;
            let diff = (self.values[i - 2] - self.values[i - 1]).abs();
            let std_dev = if diff == 0.0 { 1.0 } else { diff };

            self.values[i] = rng.normal(mean, std_dev);
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `index` (0 = previous, 1 = now, 2.. = predictions)
    pub fn at(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn current(&self) -> f64 {
        self.values[CURRENT]
    }

    pub fn previous(&self) -> f64 {
        self.values[PREVIOUS]
    }

    pub fn predictions(&self) -> &[f64] {
        &self.values[2..]
    }

    pub fn is_observed(&self) -> bool {
        self.observed
    }
}
