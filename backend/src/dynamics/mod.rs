//! Atomic models
//!
//! Every simulated unit implements [`AtomicModel`]. Time is always passed in
//! explicitly; a model remembers the instant of its last transition so that
//! [`AtomicModel::time_advance`] can stay pure.
//!
//! # Protocol
//!
//! ```text
//! init(t0)                      → time until first internal event
//! time_advance()                → ≥ 0, INFINITY when dormant
//! output(now)                   → events, computed BEFORE the transition
//! internal_transition(now)      → scheduled change
//! external_transition(now, evs) → inputs, in arrival order
//! confluent_transition(now, evs) = internal, then external
//! ```
//!
//! The set of model kinds is closed: [`Model`] is the tagged variant the
//! coordinator stores.

pub mod crop;
pub mod farmer;
pub mod meteo;
pub mod operations;
pub mod soil;

pub use crop::{CropConfig, CropModel, CropPhase};
pub use farmer::{DurationConfig, FarmerConfig, FarmerModel, FarmerPhase, PlotConfig};
pub use meteo::{MeteoConfig, MeteoModel, WeatherRecord};
pub use operations::OperationsModel;
pub use soil::SoilModel;

use crate::core::SimTime;
use crate::error::SimulationError;
use crate::models::ExternalEvent;

/// Contract every simulated unit presents to the coordinator
pub trait AtomicModel {
    /// Set up at `now`; returns the first time advance
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError>;

    /// Duration until the next internal event, from the last transition
    fn time_advance(&self) -> SimTime;

    /// Events emitted at `now`, just before the internal transition
    ///
    /// Calling this twice without a transition in between yields the same
    /// events.
    fn output(&self, now: SimTime) -> Vec<ExternalEvent>;

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError>;

    fn external_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError>;

    fn confluent_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        self.internal_transition(now)?;
        self.external_transition(now, events)
    }

    /// Current value of an observation port, `None` for unknown ports
    fn observation(&self, port: &str) -> Option<String> {
        let _ = port;
        None
    }
}

/// Closed set of model kinds
#[derive(Debug, Clone)]
pub enum Model {
    Farmer(FarmerModel),
    Operations(OperationsModel),
    Meteo(MeteoModel),
    Soil(SoilModel),
    Crop(CropModel),
}

impl Model {
    pub fn kind(&self) -> &'static str {
        match self {
            Model::Farmer(_) => "farmer",
            Model::Operations(_) => "operations",
            Model::Meteo(_) => "meteo",
            Model::Soil(_) => "soil",
            Model::Crop(_) => "crop",
        }
    }

    pub fn as_farmer(&self) -> Option<&FarmerModel> {
        match self {
            Model::Farmer(farmer) => Some(farmer),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn AtomicModel {
        match self {
            Model::Farmer(m) => m,
            Model::Operations(m) => m,
            Model::Meteo(m) => m,
            Model::Soil(m) => m,
            Model::Crop(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AtomicModel {
        match self {
            Model::Farmer(m) => m,
            Model::Operations(m) => m,
            Model::Meteo(m) => m,
            Model::Soil(m) => m,
            Model::Crop(m) => m,
        }
    }
}

impl AtomicModel for Model {
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError> {
        self.inner_mut().init(now)
    }

    fn time_advance(&self) -> SimTime {
        self.inner().time_advance()
    }

    fn output(&self, now: SimTime) -> Vec<ExternalEvent> {
        self.inner().output(now)
    }

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.inner_mut().internal_transition(now)
    }

    fn external_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        self.inner_mut().external_transition(now, events)
    }

    fn confluent_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        self.inner_mut().confluent_transition(now, events)
    }

    fn observation(&self, port: &str) -> Option<String> {
        self.inner().observation(port)
    }
}

impl From<FarmerModel> for Model {
    fn from(model: FarmerModel) -> Self {
        Model::Farmer(model)
    }
}

impl From<OperationsModel> for Model {
    fn from(model: OperationsModel) -> Self {
        Model::Operations(model)
    }
}

impl From<MeteoModel> for Model {
    fn from(model: MeteoModel) -> Self {
        Model::Meteo(model)
    }
}

impl From<SoilModel> for Model {
    fn from(model: SoilModel) -> Self {
        Model::Soil(model)
    }
}

impl From<CropModel> for Model {
    fn from(model: CropModel) -> Self {
        Model::Crop(model)
    }
}
