//! Simulation engine
//!
//! A minimal flat coordinator for atomic models. It stores models by name,
//! routes output events along couplings and drives the DEVS root loop:
//!
//! ```text
//! For each step:
//! 1. t = min over models of (last transition + time advance)
//! 2. Stop if t is INFINITY or past the horizon
//! 3. Collect output(t) of every imminent model, in declaration order
//! 4. Route each event along its couplings into the targets' inboxes
//! 5. Imminent with input → confluent; imminent alone → internal;
//!    input alone → external
//! 6. Reschedule every model that transitioned
//! ```
//!
//! All events for instant `t` are delivered before the clock moves past `t`.
//! A model that keeps the clock at the same instant for more than
//! `max_steps_per_instant` steps aborts the run with
//! [`SimulationError::Livelock`].
//!
//! # Example
//!
//! ```rust
//! use agrisim_core::orchestrator::{ScenarioConfig, Simulation};
//!
//! let config = ScenarioConfig::from_json(r#"{
//!     "seed": 7,
//!     "horizon": 30,
//!     "meteo": {"records": [{"rain": 0.0, "etp": 2.0}]},
//!     "farmer": {
//!         "plots": [{"name": "p0"}],
//!         "plan": {"activities": [{"name": "Seed_WW_p0"}]}
//!     }
//! }"#).unwrap();
//!
//! let mut simulation = Simulation::farm(&config).unwrap();
//! simulation.run().unwrap();
//!
//! let farmer = simulation.farmer().unwrap();
//! let seed = farmer.knowledge_base().activity("Seed_WW_p0").unwrap();
//! assert_eq!(seed.state().as_str(), "done");
//! ```

use super::config::ScenarioConfig;
use super::log::{EventLog, RoutedEvent};
use crate::core::SimTime;
use crate::dynamics::{
    AtomicModel, CropModel, FarmerModel, MeteoModel, Model, OperationsModel, SoilModel,
};
use crate::error::{ConfigurationError, SimulationError};
use crate::models::{ports, ExternalEvent};
use crate::rng::RngManager;
use std::collections::HashMap;
use tracing::{debug, info, trace};

// ============================================================================
// Configuration Types
// ============================================================================

/// Clock bounds of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub start: SimTime,
    /// Last instant processed (inclusive)
    pub horizon: SimTime,
    pub max_steps_per_instant: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: SimTime::ZERO,
            horizon: SimTime::INFINITY,
            max_steps_per_instant: 10_000,
        }
    }
}

/// `(source, port) → (target, port)`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Coupling {
    source: usize,
    source_port: String,
    target: usize,
    target_port: String,
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    model: Model,
    next: SimTime,
}

// ============================================================================
// Results
// ============================================================================

/// What happened in one root step
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub time: SimTime,
    /// Models whose internal event fired, in declaration order
    pub imminent: Vec<String>,
    /// Events delivered to input ports
    pub delivered: usize,
}

/// Totals of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub end_time: SimTime,
    pub delivered: usize,
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    couplings: Vec<Coupling>,
    initialized: bool,
    now: SimTime,
    /// Instant of the current step run and how many steps it took so far
    instant: SimTime,
    steps_at_instant: usize,
    log: EventLog,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            index: HashMap::new(),
            couplings: Vec::new(),
            initialized: false,
            now: config.start,
            instant: SimTime::NEG_INFINITY,
            steps_at_instant: 0,
            log: EventLog::new(),
        }
    }

    /// Wire the farm topology described by a scenario
    ///
    /// ```text
    /// meteo:out ─▶ farmer:meteo, <plot>.soil:in
    /// farmer:os ─▶ os:in
    /// os:out    ─▶ farmer:ack
    /// os:<plot> ─▶ <plot>.crop:in
    /// <plot>.crop:out, <plot>.soil:out ─▶ farmer:<plot>
    /// ```
    ///
    /// The scenario seed feeds one generator from which the farmer and each
    /// crop draw their own seeds, in that order.
    pub fn farm(scenario: &ScenarioConfig) -> Result<Self, SimulationError> {
        scenario.validate()?;

        let mut simulation = Self::new(SimulationConfig {
            start: SimTime::new(scenario.start),
            horizon: SimTime::new(scenario.horizon),
            max_steps_per_instant: scenario.max_steps_per_instant,
        });

        let mut seeds = RngManager::new(scenario.seed);
        let plots = &scenario.farmer.plots;

        simulation.add_model("meteo", MeteoModel::new(&scenario.meteo)?)?;
        simulation.add_model(
            "farmer",
            FarmerModel::new(&scenario.farmer, RngManager::new(seeds.next()))?,
        )?;
        simulation.add_model(
            "os",
            OperationsModel::with_resources(plots.iter().map(|p| p.name.clone())),
        )?;

        simulation.connect("meteo", ports::OUT, "farmer", ports::METEO)?;
        simulation.connect("farmer", ports::OS, "os", ports::IN)?;
        simulation.connect("os", ports::OUT, "farmer", ports::ACK)?;

        for plot in plots {
            let soil = format!("{}.soil", plot.name);
            let crop = format!("{}.crop", plot.name);

            simulation.add_model(&soil, SoilModel::new(plot.soil_capacity, plot.initial_ru)?)?;
            simulation.add_model(
                &crop,
                CropModel::new(plot.crop.clone(), RngManager::new(seeds.next()))?,
            )?;

            simulation.connect("meteo", ports::OUT, &soil, ports::IN)?;
            simulation.connect("os", &plot.name, &crop, ports::IN)?;
            simulation.connect(&crop, ports::OUT, "farmer", &plot.name)?;
            simulation.connect(&soil, ports::OUT, "farmer", &plot.name)?;
        }

        info!(
            seed = scenario.seed,
            plots = plots.len(),
            horizon = scenario.horizon,
            "farm simulation created"
        );
        Ok(simulation)
    }

    /// Register a model; declaration order breaks ties between models
    pub fn add_model(
        &mut self,
        name: impl Into<String>,
        model: impl Into<Model>,
    ) -> Result<(), SimulationError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ConfigurationError::Duplicate(format!("model {}", name)).into());
        }
        self.index.insert(name.clone(), self.slots.len());
        self.slots.push(Slot {
            name,
            model: model.into(),
            next: SimTime::INFINITY,
        });
        self.initialized = false;
        Ok(())
    }

    pub fn connect(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Result<(), SimulationError> {
        let coupling = Coupling {
            source: self.slot_index(source)?,
            source_port: source_port.to_string(),
            target: self.slot_index(target)?,
            target_port: target_port.to_string(),
        };
        if !self.couplings.contains(&coupling) {
            self.couplings.push(coupling);
        }
        Ok(())
    }

    /// Initialise every model at the start time
    pub fn init(&mut self) -> Result<(), SimulationError> {
        let start = self.config.start;
        for slot in &mut self.slots {
            let ta = slot.model.init(start)?;
            slot.next = start + ta;
            trace!(model = %slot.name, next = %slot.next, "model initialised");
        }
        self.now = start;
        self.instant = SimTime::NEG_INFINITY;
        self.steps_at_instant = 0;
        self.initialized = true;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Time of the next step, `INFINITY` when every model is dormant
    pub fn next_time(&self) -> SimTime {
        self.slots
            .iter()
            .map(|s| s.next)
            .fold(SimTime::INFINITY, SimTime::min)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.index.get(name).map(|&i| &self.slots[i].model)
    }

    /// First farmer model, if any
    pub fn farmer(&self) -> Option<&FarmerModel> {
        self.slots.iter().find_map(|s| s.model.as_farmer())
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Value of an observation port
    pub fn observe(&self, model: &str, port: &str) -> Result<String, SimulationError> {
        let slot = &self.slots[self.slot_index(model)?];
        slot.model
            .observation(port)
            .ok_or_else(|| SimulationError::UnknownPort {
                model: model.to_string(),
                port: port.to_string(),
            })
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    // ========================================================================
    // Root loop
    // ========================================================================

    /// Run one root step; `None` once nothing is left before the horizon
    pub fn step(&mut self) -> Result<Option<StepReport>, SimulationError> {
        if !self.initialized {
            self.init()?;
        }

        let t = self.next_time();
        if t.is_infinity() || !t.approx_le(self.config.horizon) {
            return Ok(None);
        }

        let imminent: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].next.approx_eq(t))
            .collect();
        self.check_livelock(t, &imminent)?;

        // Outputs are computed before any transition
        let mut inboxes: Vec<Vec<ExternalEvent>> = vec![Vec::new(); self.slots.len()];
        let mut delivered = 0;
        for &i in &imminent {
            for event in self.slots[i].model.output(t) {
                delivered += self.route(t, i, &event, &mut inboxes);
            }
        }

        for (i, inbox) in inboxes.into_iter().enumerate() {
            let is_imminent = imminent.contains(&i);
            let slot = &mut self.slots[i];
            match (is_imminent, inbox.is_empty()) {
                (true, true) => slot.model.internal_transition(t)?,
                (true, false) => slot.model.confluent_transition(t, &inbox)?,
                (false, false) => slot.model.external_transition(t, &inbox)?,
                (false, true) => continue,
            }
            slot.next = t + slot.model.time_advance();
        }

        self.now = t;
        Ok(Some(StepReport {
            time: t,
            imminent: imminent
                .iter()
                .map(|&i| self.slots[i].name.clone())
                .collect(),
            delivered,
        }))
    }

    /// Step until the horizon or until every model is dormant
    pub fn run(&mut self) -> Result<RunSummary, SimulationError> {
        let mut steps = 0;
        let mut delivered = 0;
        while let Some(report) = self.step()? {
            steps += 1;
            delivered += report.delivered;
        }

        info!(steps, delivered, end = %self.now, "simulation finished");
        Ok(RunSummary {
            steps,
            end_time: self.now,
            delivered,
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn slot_index(&self, name: &str) -> Result<usize, SimulationError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimulationError::UnknownModel(name.to_string()))
    }

    fn route(
        &mut self,
        t: SimTime,
        source: usize,
        event: &ExternalEvent,
        inboxes: &mut [Vec<ExternalEvent>],
    ) -> usize {
        let mut count = 0;
        for coupling in &self.couplings {
            if coupling.source != source || !event.on_port(&coupling.source_port) {
                continue;
            }
            let delivered = ExternalEvent {
                port: coupling.target_port.clone(),
                attributes: event.attributes.clone(),
            };
            self.log.log(RoutedEvent {
                time: t,
                source: self.slots[source].name.clone(),
                target: self.slots[coupling.target].name.clone(),
                event: delivered.clone(),
            });
            inboxes[coupling.target].push(delivered);
            count += 1;
        }

        if count == 0 {
            debug!(model = %self.slots[source].name, port = %event.port, "output on unconnected port dropped");
        }
        count
    }

    fn check_livelock(&mut self, t: SimTime, imminent: &[usize]) -> Result<(), SimulationError> {
        if t.approx_eq(self.instant) {
            self.steps_at_instant += 1;
        } else {
            self.instant = t;
            self.steps_at_instant = 1;
        }

        if self.steps_at_instant > self.config.max_steps_per_instant {
            let model = imminent
                .first()
                .map(|&i| self.slots[i].name.clone())
                .unwrap_or_default();
            return Err(SimulationError::Livelock {
                model,
                limit: self.config.max_steps_per_instant,
                time: t,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{MeteoConfig, WeatherRecord};

    fn meteo() -> MeteoModel {
        MeteoModel::new(&MeteoConfig {
            step: 1.0,
            records: vec![WeatherRecord {
                date: None,
                rain: 1.0,
                etp: 0.5,
            }],
        })
        .unwrap()
    }

    #[test]
    fn test_duplicate_model_rejected() {
        let mut simulation = Simulation::new(SimulationConfig::default());
        simulation.add_model("meteo", meteo()).unwrap();
        assert!(matches!(
            simulation.add_model("meteo", meteo()),
            Err(SimulationError::Configuration(ConfigurationError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_connect_unknown_model() {
        let mut simulation = Simulation::new(SimulationConfig::default());
        simulation.add_model("meteo", meteo()).unwrap();
        assert_eq!(
            simulation.connect("meteo", "out", "soil", "in"),
            Err(SimulationError::UnknownModel("soil".to_string()))
        );
    }

    #[test]
    fn test_horizon_is_inclusive() {
        let mut simulation = Simulation::new(SimulationConfig {
            horizon: SimTime::new(3.0),
            ..SimulationConfig::default()
        });
        simulation.add_model("meteo", meteo()).unwrap();

        let summary = simulation.run().unwrap();
        assert_eq!(summary.steps, 4);
        assert_eq!(summary.end_time, SimTime::new(3.0));
    }

    #[test]
    fn test_unknown_observation_port() {
        let mut simulation = Simulation::new(SimulationConfig::default());
        simulation.add_model("meteo", meteo()).unwrap();
        simulation.init().unwrap();

        assert_eq!(simulation.observe("meteo", "rain").unwrap(), "1");
        assert!(matches!(
            simulation.observe("meteo", "wind"),
            Err(SimulationError::UnknownPort { .. })
        ));
    }
}
