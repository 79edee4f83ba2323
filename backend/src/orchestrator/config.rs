//! Scenario configuration
//!
//! A scenario is loaded from JSON and fully describes one farm run.
//!
//! ```json
//! {
//!   "seed": 42,
//!   "horizon": 200,
//!   "meteo": {"records": [{"rain": 2.0, "etp": 1.1}]},
//!   "farmer": {
//!     "plots": [{"name": "p0", "area": 12.0}],
//!     "plan": {"activities": [{"name": "Seed_WW_p0"}]}
//!   }
//! }
//! ```

use crate::dynamics::{FarmerConfig, MeteoConfig};
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Seed of every random draw in the run
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub start: f64,

    /// Last simulated instant (inclusive)
    #[serde(default = "default_horizon")]
    pub horizon: f64,

    /// Transitions allowed at a single instant before the run is aborted
    #[serde(default = "default_max_steps_per_instant")]
    pub max_steps_per_instant: usize,

    pub meteo: MeteoConfig,

    #[serde(default)]
    pub farmer: FarmerConfig,
}

fn default_horizon() -> f64 {
    365.0
}

fn default_max_steps_per_instant() -> usize {
    10_000
}

impl ScenarioConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigurationError::Invalid(format!("scenario: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.start.is_finite() {
            return Err(ConfigurationError::Invalid(
                "start must be finite".to_string(),
            ));
        }
        if !self.horizon.is_finite() || self.horizon < self.start {
            return Err(ConfigurationError::Invalid(format!(
                "horizon {} must be finite and not before start {}",
                self.horizon, self.start
            )));
        }
        if self.max_steps_per_instant == 0 {
            return Err(ConfigurationError::Invalid(
                "max_steps_per_instant must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
