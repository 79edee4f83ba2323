//! Crop model of one plot
//!
//! ```text
//! Wait ──sow──▶ Sown ──growth──▶ Harvestable ──harvest × passes──▶ Harvested ──rest──▶ Wait
//! ```
//!
//! Reaching maturity emits `{harvestable: true}` on `out`; going back to
//! Wait emits `{harvestable: false}`. Orders that do not apply to the
//! current phase are ignored.

use super::AtomicModel;
use crate::core::SimTime;
use crate::error::{ConfigurationError, ModelingError, SimulationError};
use crate::models::{ports, ExternalEvent, Order, ResourceOrder};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropConfig {
    /// Days from sowing to maturity
    #[serde(default = "default_growth_duration")]
    pub growth_duration: f64,

    /// Up to this many extra days, drawn uniformly in `[1, jitter]`
    #[serde(default)]
    pub growth_jitter: u32,

    /// Harvest orders needed before the plot is cleared
    #[serde(default = "default_harvest_passes")]
    pub harvest_passes: u32,

    /// Days between the last harvest pass and the next possible sowing
    #[serde(default = "default_rest_duration")]
    pub rest_duration: f64,
}

fn default_growth_duration() -> f64 {
    120.0
}

fn default_harvest_passes() -> u32 {
    1
}

fn default_rest_duration() -> f64 {
    1.0
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            growth_duration: default_growth_duration(),
            growth_jitter: 0,
            harvest_passes: default_harvest_passes(),
            rest_duration: default_rest_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPhase {
    Wait,
    Sown,
    Harvestable,
    Harvested,
}

impl CropPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            CropPhase::Wait => "wait",
            CropPhase::Sown => "sown",
            CropPhase::Harvestable => "harvestable",
            CropPhase::Harvested => "harvested",
        }
    }
}

impl fmt::Display for CropPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CropModel {
    config: CropConfig,
    rng: RngManager,
    phase: CropPhase,
    passes_left: u32,
    next: SimTime,
    last: SimTime,
}

impl CropModel {
    pub fn new(config: CropConfig, rng: RngManager) -> Result<Self, ConfigurationError> {
        if !config.growth_duration.is_finite() || config.growth_duration < 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "crop: growth duration must be non-negative, got {}",
                config.growth_duration
            )));
        }
        if !config.rest_duration.is_finite() || config.rest_duration < 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "crop: rest duration must be non-negative, got {}",
                config.rest_duration
            )));
        }
        if config.harvest_passes == 0 {
            return Err(ConfigurationError::Invalid(
                "crop: at least one harvest pass is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            rng,
            phase: CropPhase::Wait,
            passes_left: 0,
            next: SimTime::INFINITY,
            last: SimTime::ZERO,
        })
    }

    pub fn phase(&self) -> CropPhase {
        self.phase
    }

    fn growth_duration(&mut self) -> f64 {
        let jitter = if self.config.growth_jitter > 0 {
            self.rng.range(1, self.config.growth_jitter as i64 + 1) as f64
        } else {
            0.0
        };
        self.config.growth_duration + jitter
    }

    fn apply(&mut self, now: SimTime, order: &ResourceOrder) {
        match (self.phase, &order.order) {
            (CropPhase::Wait, Order::Sow) => {
                let duration = self.growth_duration();
                self.next = now + duration;
                self.passes_left = self.config.harvest_passes;
                self.phase = CropPhase::Sown;
                info!(activity = %order.activity, %now, duration, "crop sown");
            }
            (CropPhase::Harvestable, Order::Harvest) => {
                self.passes_left = self.passes_left.saturating_sub(1);
                if self.passes_left == 0 {
                    self.next = now + self.config.rest_duration;
                    self.phase = CropPhase::Harvested;
                    info!(activity = %order.activity, %now, "crop harvested");
                }
            }
            (phase, order_kind) => {
                debug!(%phase, order = %order_kind, %now, "order ignored by crop");
            }
        }
    }
}

impl AtomicModel for CropModel {
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError> {
        self.phase = CropPhase::Wait;
        self.passes_left = 0;
        self.next = SimTime::INFINITY;
        self.last = now;
        Ok(self.time_advance())
    }

    fn time_advance(&self) -> SimTime {
        match self.phase {
            CropPhase::Wait | CropPhase::Harvestable => SimTime::INFINITY,
            CropPhase::Sown | CropPhase::Harvested => self.next.remaining_from(self.last),
        }
    }

    fn output(&self, _now: SimTime) -> Vec<ExternalEvent> {
        match self.phase {
            CropPhase::Sown => vec![ExternalEvent::new(ports::OUT).with("harvestable", true)],
            CropPhase::Harvested => {
                vec![ExternalEvent::new(ports::OUT).with("harvestable", false)]
            }
            _ => Vec::new(),
        }
    }

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.phase = match self.phase {
            CropPhase::Sown => CropPhase::Harvestable,
            CropPhase::Harvested => CropPhase::Wait,
            phase => phase,
        };
        self.next = SimTime::INFINITY;
        self.last = now;
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
                    model: "crop".to_string(),
                    port: event.port.clone(),
                }
                .into());
            }
            let order = ResourceOrder::from_event(event)?;
            self.apply(now, &order);
        }
        self.last = now;
        Ok(())
    }

    fn observation(&self, port: &str) -> Option<String> {
        match port {
            "phase" => Some(self.phase.to_string()),
            _ => None,
        }
    }
}
