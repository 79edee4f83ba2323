//! Soil water reserve model
//!
//! Waits until both rain and ETP of the day are known, then updates the
//! usable reserve
//!
//! ```text
//! ru = max(0, min(cap, ru + rain - (ru / cap) * etp))
//! ```
//!
//! and reports `{ru}` on `out` in the same instant.

use super::AtomicModel;
use crate::core::SimTime;
use crate::error::{ConfigurationError, ModelingError, SimulationError};
use crate::models::{ports, ExternalEvent};
use tracing::trace;

/// Reserve capacity used when none is configured (mm)
pub const DEFAULT_CAPACITY: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SoilPhase {
    Wait,
    Send,
}

#[derive(Debug, Clone)]
pub struct SoilModel {
    capacity: f64,
    initial_ru: f64,
    ru: f64,
    rain: Option<f64>,
    etp: Option<f64>,
    phase: SoilPhase,
}

impl SoilModel {
    pub fn new(capacity: f64, initial_ru: f64) -> Result<Self, ConfigurationError> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "soil: capacity must be positive, got {}",
                capacity
            )));
        }
        if !(0.0..=capacity).contains(&initial_ru) {
            return Err(ConfigurationError::Invalid(format!(
                "soil: initial reserve {} outside [0, {}]",
                initial_ru, capacity
            )));
        }

        Ok(Self {
            capacity,
            initial_ru,
            ru: initial_ru,
            rain: None,
            etp: None,
            phase: SoilPhase::Wait,
        })
    }

    pub fn ru(&self) -> f64 {
        self.ru
    }

    fn update(&mut self, rain: f64, etp: f64) {
        let cap = self.capacity;
        self.ru = (self.ru + rain - (self.ru / cap) * etp).min(cap).max(0.0);
    }
}

impl Default for SoilModel {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            initial_ru: DEFAULT_CAPACITY,
            ru: DEFAULT_CAPACITY,
            rain: None,
            etp: None,
            phase: SoilPhase::Wait,
        }
    }
}

impl AtomicModel for SoilModel {
    fn init(&mut self, _now: SimTime) -> Result<SimTime, SimulationError> {
        self.ru = self.initial_ru;
        self.rain = None;
        self.etp = None;
        self.phase = SoilPhase::Wait;
        Ok(self.time_advance())
    }

    fn time_advance(&self) -> SimTime {
        match self.phase {
            SoilPhase::Wait => SimTime::INFINITY,
            SoilPhase::Send => SimTime::ZERO,
        }
    }

    fn output(&self, _now: SimTime) -> Vec<ExternalEvent> {
        match self.phase {
            SoilPhase::Send => vec![ExternalEvent::new(ports::OUT).with("ru", self.ru)],
            SoilPhase::Wait => Vec::new(),
        }
    }

    fn internal_transition(&mut self, _now: SimTime) -> Result<(), SimulationError> {
        self.phase = SoilPhase::Wait;
        Ok(())
    }

    fn external_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        for event in events {
            if !event.on_port(ports::IN) {
                return Err(ModelingError::UnexpectedPort {
                    model: "soil".to_string(),
                    port: event.port.clone(),
                }
                .into());
            }
            if event.has("rain") {
                self.rain = Some(event.get_f64("rain")?);
            }
            if event.has("etp") {
                self.etp = Some(event.get_f64("etp")?);
            }
        }

        if let (Some(rain), Some(etp)) = (self.rain, self.etp) {
            self.update(rain, etp);
            self.rain = None;
            self.etp = None;
            self.phase = SoilPhase::Send;
            trace!(ru = self.ru, %now, "soil reserve updated");
        }
        Ok(())
    }

    fn observation(&self, port: &str) -> Option<String> {
        match port {
            "ru" => Some(self.ru.to_string()),
            _ => None,
        }
    }
}
