//! xorshift64* random number generator
//!
//! Same seed → same sequence. Forecast buffers and crop maturity dates depend
//! on this, so two runs of one scenario with one seed are identical.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use agrisim_core::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let day = rng.range(1, 15); // [1, 15)
/// let noise = rng.normal(0.0, 1.0);
/// assert!((1..15).contains(&day));
/// assert!(noise.is_finite());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Create a new generator; a zero seed is replaced by 1
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Next raw 64-bit value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform integer in `[min, max)`
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let span = (max - min) as u64;
        min + (self.next() % span) as i64
    }

    /// Current state, usable as a seed to resume the same sequence
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Uniform f64 in `[0.0, 1.0)`
    pub fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Sample `N(mean, std_dev²)` with the Box-Muller transform
    ///
    /// A zero `std_dev` returns `mean` exactly.
    ///
    /// # Panics
    /// Panics if `std_dev` is negative or not finite
    pub fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        assert!(
            std_dev.is_finite() && std_dev >= 0.0,
            "std_dev must be finite and non-negative"
        );

        // 1 - u keeps the logarithm argument in (0, 1]
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}
