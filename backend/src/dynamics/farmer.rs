//! Farmer: the decision-making agent
//!
//! The farmer owns a [`KnowledgeBase`] and cycles through four phases:
//!
//! ```text
//!             external events
//!                   │
//!                   ▼
//! Init ──▶ Process ◀── UpdateFact
//!            │  ▲
//!            ▼  │
//!           Output
//! ```
//!
//! Every phase except Process lasts zero time. Process waits until the next
//! rule check time, or leaves immediately when something changed. In Output
//! the farmer emits one resource command per recorded transition on `os`,
//! then clears the lists and re-processes.
//!
//! # Inputs
//!
//! | port     | payload                                   |
//! |----------|-------------------------------------------|
//! | `ack`    | `{activity, order: "done"\|"fail"}`        |
//! | `meteo`  | `{rain, etp}`                             |
//! | `<plot>` | optional `{ru}` and/or `{harvestable}`    |
//! | other    | `{value}` or `{init}`, stored as a fact   |

use super::crop::CropConfig;
use super::soil::DEFAULT_CAPACITY;
use super::AtomicModel;
use crate::core::SimTime;
use crate::decision::{
    names, DecisionPlan, FactValue, KnowledgeBase, PredicateRegistry,
};
use crate::error::{ConfigurationError, ModelingError, SimulationError, StateError};
use crate::forecast::ForecastSeries;
use crate::models::{
    ports, Ack, AckOrder, ActivityState, ExternalEvent, Order, ResourceCommand, ResourceReport,
    WeatherObservation,
};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// Configuration
// ============================================================================

/// One plot (land unit) of the farm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Also the plot's port name and the last token of its activity names
    pub name: String,

    /// Worked area, in the unit the operation speeds use
    #[serde(default = "default_area")]
    pub area: f64,

    /// Soil reserve at the start of the run (mm)
    #[serde(default = "default_soil")]
    pub initial_ru: f64,

    #[serde(default = "default_soil")]
    pub soil_capacity: f64,

    #[serde(default)]
    pub crop: CropConfig,
}

fn default_area() -> f64 {
    1.0
}

fn default_soil() -> f64 {
    DEFAULT_CAPACITY
}

impl PlotConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            area: default_area(),
            initial_ru: default_soil(),
            soil_capacity: default_soil(),
            crop: CropConfig::default(),
        }
    }
}

/// How long an order keeps a resource busy
///
/// `area / speed` when the operation has a configured speed, `default`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationConfig {
    #[serde(default = "default_duration")]
    pub default: f64,

    /// Operation token (`Seed`, `Harvest`...) → area per time unit
    #[serde(default)]
    pub speeds: HashMap<String, f64>,
}

fn default_duration() -> f64 {
    1.0
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            default: default_duration(),
            speeds: HashMap::new(),
        }
    }
}

impl DurationConfig {
    /// Estimated duration of `operation` on a plot of `area`
    ///
    /// # Example
    /// ```
    /// use agrisim_core::dynamics::DurationConfig;
    ///
    /// let mut durations = DurationConfig::default();
    /// durations.speeds.insert("Seed".to_string(), 4.0);
    ///
    /// assert_eq!(durations.estimate("Seed", Some(10.0)), 2.5);
    /// assert_eq!(durations.estimate("Harvest", Some(10.0)), 1.0);
    /// assert_eq!(durations.estimate("Seed", None), 1.0);
    /// ```
    pub fn estimate(&self, operation: &str, area: Option<f64>) -> f64 {
        match (area, self.speeds.get(operation)) {
            (Some(area), Some(&speed)) if speed > 0.0 => area / speed,
            _ => self.default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerConfig {
    /// Predicted steps in the rain/ETP forecast buffers
    #[serde(default = "default_prediction_size")]
    pub prediction_size: usize,

    /// Observed days kept for the history predicates
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub plots: Vec<PlotConfig>,

    #[serde(default)]
    pub durations: DurationConfig,

    #[serde(default)]
    pub plan: DecisionPlan,
}

fn default_prediction_size() -> usize {
    5
}

fn default_history_capacity() -> usize {
    366
}

impl Default for FarmerConfig {
    fn default() -> Self {
        Self {
            prediction_size: default_prediction_size(),
            history_capacity: default_history_capacity(),
            plots: Vec::new(),
            durations: DurationConfig::default(),
            plan: DecisionPlan::default(),
        }
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmerPhase {
    Init,
    Process,
    UpdateFact,
    Output,
}

impl FarmerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            FarmerPhase::Init => "init",
            FarmerPhase::Process => "process",
            FarmerPhase::UpdateFact => "update-fact",
            FarmerPhase::Output => "output",
        }
    }
}

impl fmt::Display for FarmerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct FarmerModel {
    kb: KnowledgeBase,
    /// Plot name → area
    plots: BTreeMap<String, f64>,
    initial_ru: BTreeMap<String, f64>,
    durations: DurationConfig,
    rng: RngManager,
    rain: ForecastSeries,
    etp: ForecastSeries,
    rain_history: VecDeque<f64>,
    etp_history: VecDeque<f64>,
    history_capacity: usize,
    phase: FarmerPhase,
    immediate: bool,
    next_check: SimTime,
    last: SimTime,
}

impl FarmerModel {
    pub fn new(config: &FarmerConfig, rng: RngManager) -> Result<Self, ConfigurationError> {
        Self::with_registry(config, rng, PredicateRegistry::farm())
    }

    /// Build with a custom predicate table
    pub fn with_registry(
        config: &FarmerConfig,
        rng: RngManager,
        predicates: PredicateRegistry,
    ) -> Result<Self, ConfigurationError> {
        if config.prediction_size == 0 {
            return Err(ConfigurationError::Invalid(
                "farmer: prediction size is too small".to_string(),
            ));
        }
        if config.history_capacity == 0 {
            return Err(ConfigurationError::Invalid(
                "farmer: history capacity must be positive".to_string(),
            ));
        }

        let mut plots = BTreeMap::new();
        let mut initial_ru = BTreeMap::new();
        for plot in &config.plots {
            if plots.insert(plot.name.clone(), plot.area).is_some() {
                return Err(ConfigurationError::Duplicate(format!("plot {}", plot.name)));
            }
            initial_ru.insert(plot.name.clone(), plot.initial_ru);
        }

        let kb = KnowledgeBase::from_plan(&config.plan, predicates)?;
        for activity in kb.activities() {
            if !plots.contains_key(&activity.key().plot) {
                return Err(ConfigurationError::Invalid(format!(
                    "farmer: activity {} works on unknown plot {}",
                    activity.name(),
                    activity.key().plot
                )));
            }
        }

        let mut farmer = Self {
            kb,
            plots,
            initial_ru,
            durations: config.durations.clone(),
            rng,
            rain: ForecastSeries::new(config.prediction_size),
            etp: ForecastSeries::new(config.prediction_size),
            rain_history: VecDeque::new(),
            etp_history: VecDeque::new(),
            history_capacity: config.history_capacity,
            phase: FarmerPhase::Init,
            immediate: false,
            next_check: SimTime::INFINITY,
            last: SimTime::ZERO,
        };
        farmer.seed_facts();
        Ok(farmer)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn phase(&self) -> FarmerPhase {
        self.phase
    }

    pub fn rain_forecast(&self) -> &ForecastSeries {
        &self.rain
    }

    pub fn etp_forecast(&self) -> &ForecastSeries {
        &self.etp
    }

    /// Facts every predicate may rely on before the first report arrives
    fn seed_facts(&mut self) {
        self.kb
            .apply_fact(names::RAIN_FORECAST, self.rain.values().to_vec());
        self.kb
            .apply_fact(names::ETP_FORECAST, self.etp.values().to_vec());
        self.kb.apply_fact(names::RAIN_HISTORY, Vec::<f64>::new());
        self.kb.apply_fact(names::ETP_HISTORY, Vec::<f64>::new());

        for (plot, ru) in &self.initial_ru {
            self.kb.apply_fact(names::ru(plot), *ru);
            self.kb.apply_fact(names::harvestable(plot), false);
        }
    }

    fn process(&mut self, now: SimTime) -> Result<(), SimulationError> {
        let result = self.kb.process_changes(now)?;
        self.immediate = result.has_immediate_change;
        self.next_check = result.next_check;
        Ok(())
    }

    fn command(&self, name: &str, terminal: bool) -> Option<ExternalEvent> {
        let activity = self.kb.activity(name)?;
        let key = activity.key();

        let (order, duration) = if terminal {
            (Order::Stop, 0.0)
        } else {
            let area = self.plots.get(&key.plot).copied();
            (
                Order::for_operation(&key.operation),
                self.durations.estimate(&key.operation, area),
            )
        };

        Some(
            ResourceCommand {
                resource: key.plot.clone(),
                order,
                activity: name.to_string(),
                duration,
            }
            .to_event(ports::OS),
        )
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    fn on_ack(&mut self, now: SimTime, event: &ExternalEvent) -> Result<(), SimulationError> {
        let ack = Ack::from_event(event)?;

        let state = self
            .kb
            .activity(&ack.activity)
            .map(|a| a.state())
            .ok_or_else(|| StateError::UnknownActivity(ack.activity.clone()))?;
        if state == ActivityState::FinishedByForce {
            warn!(activity = %ack.activity, order = ack.order.as_str(), %now, "ack after forced finish ignored");
            return Ok(());
        }

        match ack.order {
            AckOrder::Done => self.kb.set_activity_done(&ack.activity, now)?,
            AckOrder::Fail => self.kb.set_activity_failed(&ack.activity, now)?,
        }
        Ok(())
    }

    fn on_weather(&mut self, event: &ExternalEvent) -> Result<(), SimulationError> {
        let weather = WeatherObservation::from_event(event)?;

        self.rain.observe(weather.rain, &mut self.rng);
        self.etp.observe(weather.etp, &mut self.rng);

        self.rain_history.push_front(weather.rain);
        self.etp_history.push_front(weather.etp);
        self.rain_history.truncate(self.history_capacity);
        self.etp_history.truncate(self.history_capacity);

        self.kb.apply_fact(names::RAIN, weather.rain);
        self.kb.apply_fact(names::ETP, weather.etp);
        self.kb
            .apply_fact(names::RAIN_FORECAST, self.rain.values().to_vec());
        self.kb
            .apply_fact(names::ETP_FORECAST, self.etp.values().to_vec());
        self.kb.apply_fact(
            names::RAIN_HISTORY,
            self.rain_history.iter().copied().collect::<Vec<_>>(),
        );
        self.kb.apply_fact(
            names::ETP_HISTORY,
            self.etp_history.iter().copied().collect::<Vec<_>>(),
        );
        Ok(())
    }

    fn on_report(&mut self, plot: &str, event: &ExternalEvent) -> Result<(), SimulationError> {
        let report = ResourceReport::from_event(event)?;
        if let Some(ru) = report.ru {
            self.kb.apply_fact(names::ru(plot), ru);
        }
        if let Some(harvestable) = report.harvestable {
            self.kb.apply_fact(names::harvestable(plot), harvestable);
        }
        Ok(())
    }

    fn on_fact(&mut self, event: &ExternalEvent) -> Result<(), SimulationError> {
        let value = ["value", "init"]
            .iter()
            .find_map(|name| event.attributes.get(*name).filter(|v| !v.is_null()));

        let Some(value) = value else {
            return Err(ModelingError::NoValue(event.port.clone()).into());
        };

        let fact = fact_from_value(value).ok_or_else(|| ModelingError::InvalidAttribute {
            port: event.port.clone(),
            attribute: "value".to_string(),
            expected: "number, boolean or list of numbers".to_string(),
        })?;
        self.kb.apply_fact(event.port.clone(), fact);
        Ok(())
    }
}

/// `p` followed by digits: a plot id, whether configured or not
fn is_plot_port(port: &str) -> bool {
    port.strip_prefix('p')
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

fn fact_from_value(value: &Value) -> Option<FactValue> {
    match value {
        Value::Bool(flag) => Some(FactValue::Flag(*flag)),
        Value::Number(number) => number.as_f64().map(FactValue::Number),
        Value::Array(items) => items
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .map(FactValue::Series),
        _ => None,
    }
}

impl AtomicModel for FarmerModel {
    fn init(&mut self, now: SimTime) -> Result<SimTime, SimulationError> {
        self.phase = FarmerPhase::Init;
        self.last = now;
        info!(
            activities = self.kb.activities().len(),
            plots = self.plots.len(),
            %now,
            "farmer initialised"
        );
        Ok(self.time_advance())
    }

    fn time_advance(&self) -> SimTime {
        match self.phase {
            FarmerPhase::Init | FarmerPhase::UpdateFact | FarmerPhase::Output => SimTime::ZERO,
            FarmerPhase::Process => {
                if self.immediate || self.kb.has_latest() {
                    SimTime::ZERO
                } else {
                    self.next_check.remaining_from(self.last)
                }
            }
        }
    }

    fn output(&self, _now: SimTime) -> Vec<ExternalEvent> {
        if self.phase != FarmerPhase::Output {
            return Vec::new();
        }

        let latest = self.kb.latest();
        let started = latest.started.iter().map(|name| (name, false));
        let ended = latest
            .failed
            .iter()
            .chain(&latest.done)
            .chain(&latest.ended)
            .map(|name| (name, true));

        started
            .chain(ended)
            .filter_map(|(name, terminal)| self.command(name, terminal))
            .collect()
    }

    fn internal_transition(&mut self, now: SimTime) -> Result<(), SimulationError> {
        match self.phase {
            FarmerPhase::Output => {
                let latest = self.kb.take_latest();
                debug!(
                    started = latest.started.len(),
                    done = latest.done.len(),
                    failed = latest.failed.len(),
                    ended = latest.ended.len(),
                    %now,
                    "farmer orders sent"
                );
                self.process(now)?;
                self.phase = FarmerPhase::Process;
            }
            FarmerPhase::Init | FarmerPhase::UpdateFact => {
                self.process(now)?;
                self.phase = FarmerPhase::Process;
            }
            FarmerPhase::Process => {
                self.phase = FarmerPhase::Output;
            }
        }
        self.last = now;
        Ok(())
    }

    fn external_transition(
        &mut self,
        now: SimTime,
        events: &[ExternalEvent],
    ) -> Result<(), SimulationError> {
        for event in events {
            match event.port.as_str() {
                ports::ACK => self.on_ack(now, event)?,
                ports::METEO => self.on_weather(event)?,
                port if self.plots.contains_key(port) => self.on_report(port, event)?,
                port if is_plot_port(port) => {
                    return Err(StateError::UnknownResource(port.to_string()).into());
                }
                _ => self.on_fact(event)?,
            }
        }
        self.phase = FarmerPhase::UpdateFact;
        self.last = now;
        Ok(())
    }

    fn observation(&self, port: &str) -> Option<String> {
        if port == "phase" {
            return Some(self.phase.to_string());
        }
        self.kb.activity(port).map(|a| a.state().to_string())
    }
}
