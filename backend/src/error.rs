//! Error taxonomy
//!
//! Every error here is fatal for the current run: the step that raised it
//! propagates it to the caller and the simulation must stop. Nothing is
//! retried.
//!
//! - [`ConfigurationError`]: the scenario or decision plan is wrong
//! - [`StateError`]: two components disagree about the protocol
//! - [`ModelingError`]: an event payload does not match its port contract

use crate::core::SimTime;
use thiserror::Error;

/// Build-time / configuration mistakes
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Bad activity name: {name} ({reason})")]
    BadActivityName { name: String, reason: String },

    #[error("Unknown operator `{operator}` in predicate {predicate}")]
    UnknownOperator { predicate: String, operator: String },

    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("Missing parameter `{parameter}` for predicate {predicate}")]
    MissingParameter { predicate: String, parameter: String },

    #[error("Parameter `{parameter}` has the wrong type (expected {expected})")]
    InvalidParameter { parameter: String, expected: String },

    #[error("Missing fact: {0}")]
    MissingFact(String),

    #[error("Fact `{name}` has the wrong type (expected {expected})")]
    InvalidFact { name: String, expected: String },

    #[error("Invalid duration {duration} for activity {activity}")]
    InvalidDuration { activity: String, duration: f64 },

    #[error("Unknown rule `{rule}` referenced by activity {activity}")]
    UnknownRule { activity: String, rule: String },

    #[error("Unknown activity `{other}` referenced by precedence constraint of {activity}")]
    UnknownConstraintTarget { activity: String, other: String },

    #[error("Duplicate name: {0}")]
    Duplicate(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Protocol violations between components
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Activity {activity} is {state}, expected started")]
    ActivityNotStarted { activity: String, state: String },

    #[error("Activity {activity} cannot go from {from} to {to}")]
    InvalidTransition {
        activity: String,
        from: String,
        to: String,
    },

    #[error("Unknown activity: {0}")]
    UnknownActivity(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Job for activity {activity} was due at {due} but the queue reached {now}")]
    MissedCompletion {
        activity: String,
        due: SimTime,
        now: SimTime,
    },
}

/// Malformed events
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelingError {
    #[error("Event on port `{port}` has no attribute `{attribute}`")]
    MissingAttribute { port: String, attribute: String },

    #[error("Attribute `{attribute}` on port `{port}` is not a {expected}")]
    InvalidAttribute {
        port: String,
        attribute: String,
        expected: String,
    },

    #[error("Decision: unknown order `{0}`")]
    UnknownOrder(String),

    #[error("Model {model} has no input port `{port}`")]
    UnexpectedPort { model: String, port: String },

    #[error("Decision: no value in message on port `{0}`")]
    NoValue(String),
}

/// Umbrella error for model transitions and the coordinator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Modeling(#[from] ModelingError),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model {model} has no port `{port}`")]
    UnknownPort { model: String, port: String },

    #[error("Model {model} exceeded {limit} transitions at time {time}")]
    Livelock {
        model: String,
        limit: usize,
        time: SimTime,
    },
}
