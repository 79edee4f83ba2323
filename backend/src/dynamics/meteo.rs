//! Weather model
//!
//! Replays an in-memory daily series: one `{rain, etp}` event on `out` at
//! the start time and then every `step`, wrapping around at the end.

use super::AtomicModel;
use crate::core::SimTime;
use crate::error::{ConfigurationError, ModelingError, SimulationError};
use crate::models::{ports, ExternalEvent, WeatherObservation};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One day of weather data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Free-form label (usually the date); not interpreted
    #[serde(default)]
    pub date: Option<String>,
    pub rain: f64,
    pub etp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteoConfig {
    #[serde(default = "default_step")]
    pub step: f64,
    pub records: Vec<WeatherRecord>,
}

fn default_step() -> f64 {
    1.0
}

#[derive(Debug, Clone)]
pub struct MeteoModel {
    records: Vec<WeatherRecord>,
    step: f64,
    cursor: usize,
    next: SimTime,
    last: SimTime,
}

impl MeteoModel {
    pub fn new(config: &MeteoConfig) -> Result<Self, ConfigurationError> {
        if config.records.is_empty() {
            return Err(ConfigurationError::Invalid(
                "meteo: weather series is empty".to_string(),
            ));
        }
        if !config.step.is_finite() || config.step <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "meteo: step must be positive, got {}",
                config.step
            )));
        }
        if let Some(bad) = config
            .records
            .iter()
            .position(|r| !r.rain.is_finite() || !r.etp.is_finite())
        {
            return Err(ConfigurationError::Invalid(format!(
                "meteo: record {} is not finite",
                bad
            )));
        }

        Ok(Self {
            records: config.records.clone(),
            step: config.step,
            cursor: 0,
            next: SimTime::ZERO,
            last: SimTime::ZERO,
        })
    }

    fn current(&self) -> &WeatherRecord {
        &self.records[self.cursor]
    }
}

impl AtomicModel for MeteoModel {
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError> {
        self.cursor = 0;
        self.next = now;
        self.last = now;
        Ok(self.time_advance())
    }

    fn time_advance(&self) -> SimTime {
        self.next.remaining_from(self.last)
    }

    fn output(&self, _now: SimTime) -> Vec<ExternalEvent> {
        let record = self.current();
        vec![WeatherObservation {
            rain: record.rain,
            etp: record.etp,
        }
        .to_event(ports::OUT)]
    }

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        trace!(day = self.cursor, %now, "weather sent");
        self.cursor = (self.cursor + 1) % self.records.len();
        self.next = now + self.step;
        self.last = now;
        Ok(())
    }

    fn external_transition(
        &mut self,
        _now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        match events.first() {
            Some(event) => Err(ModelingError::UnexpectedPort {
                model: "meteo".to_string(),
                port: event.port.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn observation(&self, port: &str) -> Option<String> {
        match port {
            "rain" => Some(self.current().rain.to_string()),
            "etp" => Some(self.current().etp.to_string()),
            _ => None,
        }
    }
}
