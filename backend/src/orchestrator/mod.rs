//! Orchestrator - reference coordinator
//!
//! Drives a flat set of atomic models through the DEVS root loop. The farm
//! topology is wired by [`Simulation::farm`] from a [`ScenarioConfig`].
//!
//! See `engine.rs` for the loop itself.

pub mod config;
pub mod engine;
pub mod log;

pub use config::ScenarioConfig;
pub use engine::{RunSummary, Simulation, SimulationConfig, StepReport};
pub use log::{EventLog, RoutedEvent};
