//! Agrisim Core - farm decision simulation engine
//!
//! Discrete-event simulation of a farmer deciding when to start, fail or
//! complete field activities, with deterministic execution.
//!
//! # Architecture
//!
//! - **core**: Simulation time
//! - **models**: Domain types (Activity, events and their payloads)
//! - **decision**: Working memory, predicates, rules and the knowledge base
//! - **operations**: Completion queue of pending jobs
//! - **forecast**: Rain/ETP extrapolation buffers
//! - **dynamics**: Atomic models (farmer, operations, meteo, soil, crop)
//! - **orchestrator**: Reference coordinator and scenario configuration
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Time is passed explicitly; there is no ambient clock
//! 2. Activity states only move forward: Wait → Started → terminal
//! 3. All randomness is deterministic (seeded RNG, injected)
//! 4. Every error is fatal for the run and propagates to the caller

// Module declarations
pub mod core;
pub mod decision;
pub mod dynamics;
pub mod error;
pub mod forecast;
pub mod models;
pub mod operations;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use crate::core::{SimTime, TIME_EPSILON};
pub use decision::{KnowledgeBase, PredicateRegistry, ProcessResult};
pub use dynamics::{AtomicModel, Model};
pub use error::{ConfigurationError, ModelingError, SimulationError, StateError};
pub use models::{Activity, ActivityKey, ActivityState, ExternalEvent};
pub use operations::CompletionQueue;
pub use orchestrator::{ScenarioConfig, Simulation};
pub use rng::RngManager;
