//! Activity model
//!
//! An activity is a named unit of farm work (sowing a plot, harvesting it...).
//! Its lifecycle is strictly monotonic:
//!
//! ```text
//! Wait ──rule satisfied & constraints met──▶ Started ──ack(done)──▶ Done
//!   │                                           ├──ack(fail)──────▶ Failed
//!   └──latest start passed──▶ Failed            └──latest finish──▶ FinishedByForce
//! ```
//!
//! Activity names carry their context as `_`-separated tokens and are parsed
//! once, at construction, into an [`ActivityKey`].

use crate::core::SimTime;
use crate::error::{ConfigurationError, StateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Structured form of an activity name
///
/// Two schemes are accepted, selected by token count:
/// - `operation_crop_plot` (3 tokens)
/// - `operation_index_crop_year_plot` (5 tokens)
///
/// # Example
/// ```
/// use agrisim_core::models::ActivityKey;
///
/// let key = ActivityKey::parse("Seed_2_WW_2012_p3").unwrap();
/// assert_eq!(key.operation, "Seed");
/// assert_eq!(key.index, Some(2));
/// assert_eq!(key.crop, "WW");
/// assert_eq!(key.year, Some(2012));
/// assert_eq!(key.plot, "p3");
///
/// assert!(ActivityKey::parse("Seed_WW").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityKey {
    pub operation: String,
    pub crop: String,
    pub plot: String,
    pub index: Option<u32>,
    pub year: Option<i32>,
}

impl ActivityKey {
    pub fn parse(name: &str) -> Result<Self, ConfigurationError> {
        let bad = |reason: &str| ConfigurationError::BadActivityName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let tokens: Vec<&str> = name.split('_').collect();
        if tokens.iter().any(|t| t.is_empty()) {
            return Err(bad("empty token"));
        }

        match tokens.as_slice() {
            [operation, crop, plot] => Ok(Self {
                operation: operation.to_string(),
                crop: crop.to_string(),
                plot: plot.to_string(),
                index: None,
                year: None,
            }),
            [operation, index, crop, year, plot] => Ok(Self {
                operation: operation.to_string(),
                crop: crop.to_string(),
                plot: plot.to_string(),
                index: Some(index.parse().map_err(|_| bad("index is not an integer"))?),
                year: Some(year.parse().map_err(|_| bad("year is not an integer"))?),
            }),
            _ => Err(bad(&format!(
                "expected 3 or 5 tokens, found {}",
                tokens.len()
            ))),
        }
    }
}

/// Lifecycle state of an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityState {
    Wait,
    Started,
    Done,
    Failed,
    FinishedByForce,
}

impl ActivityState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActivityState::Done | ActivityState::Failed | ActivityState::FinishedByForce
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityState::Wait => "wait",
            ActivityState::Started => "started",
            ActivityState::Done => "done",
            ActivityState::Failed => "failed",
            ActivityState::FinishedByForce => "ff",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start-to-start ordering requirement
///
/// The owning activity may not start before `other.started_at + min_delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecedenceConstraint {
    pub other: String,
    #[serde(default)]
    pub min_delay: f64,
}

/// Optional absolute time bounds on an activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalWindow {
    /// Not started before this time
    #[serde(default)]
    pub earliest_start: Option<f64>,

    /// Still waiting after this time ⇒ Failed
    #[serde(default)]
    pub latest_start: Option<f64>,

    /// Still started after this time ⇒ FinishedByForce
    #[serde(default)]
    pub latest_finish: Option<f64>,
}

/// A named unit of work driven by the knowledge base
#[derive(Debug, Clone)]
pub struct Activity {
    name: String,
    key: ActivityKey,
    state: ActivityState,
    started_at: SimTime,
    done_at: SimTime,
    rules: BTreeSet<String>,
    constraints: Vec<PrecedenceConstraint>,
    window: TemporalWindow,
    /// Every state entered, with the time it was entered
    history: Vec<(ActivityState, SimTime)>,
}

impl Activity {
    /// Create a waiting activity, parsing its name
    ///
    /// # Example
    /// ```
    /// use agrisim_core::models::{Activity, ActivityState};
    ///
    /// let activity = Activity::new("Harvest_WW_p0").unwrap();
    /// assert_eq!(activity.state(), ActivityState::Wait);
    /// assert_eq!(activity.key().plot, "p0");
    /// assert!(activity.started_at().is_neg_infinity());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let key = ActivityKey::parse(&name)?;

        Ok(Self {
            name,
            key,
            state: ActivityState::Wait,
            started_at: SimTime::NEG_INFINITY,
            done_at: SimTime::NEG_INFINITY,
            rules: BTreeSet::new(),
            constraints: Vec::new(),
            window: TemporalWindow::default(),
            history: vec![(ActivityState::Wait, SimTime::NEG_INFINITY)],
        })
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rules.insert(rule.into());
        self
    }

    pub fn with_constraint(mut self, other: impl Into<String>, min_delay: f64) -> Self {
        self.constraints.push(PrecedenceConstraint {
            other: other.into(),
            min_delay,
        });
        self
    }

    pub fn with_window(mut self, window: TemporalWindow) -> Self {
        self.window = window;
        self
    }

    /// Reject window bounds and precedence delays that are not finite
    pub fn check_bounds(&self) -> Result<(), ConfigurationError> {
        let bounds = [
            ("earliest_start", self.window.earliest_start),
            ("latest_start", self.window.latest_start),
            ("latest_finish", self.window.latest_finish),
        ];
        for (bound, value) in bounds {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(ConfigurationError::Invalid(format!(
                    "{} of {} is {}, expected a finite time",
                    bound, self.name, value
                )));
            }
        }

        for constraint in &self.constraints {
            if !constraint.min_delay.is_finite() {
                return Err(ConfigurationError::Invalid(format!(
                    "precedence delay of {} on {} is not finite",
                    self.name, constraint.other
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &ActivityKey {
        &self.key
    }

    pub fn state(&self) -> ActivityState {
        self.state
    }

    pub fn started_at(&self) -> SimTime {
        self.started_at
    }

    pub fn done_at(&self) -> SimTime {
        self.done_at
    }

    pub fn rules(&self) -> &BTreeSet<String> {
        &self.rules
    }

    pub fn constraints(&self) -> &[PrecedenceConstraint] {
        &self.constraints
    }

    pub fn window(&self) -> &TemporalWindow {
        &self.window
    }

    pub fn history(&self) -> &[(ActivityState, SimTime)] {
        &self.history
    }

    pub fn earliest_start(&self) -> SimTime {
        self.window
            .earliest_start
            .map(SimTime::new)
            .unwrap_or(SimTime::NEG_INFINITY)
    }

    pub fn latest_start(&self) -> SimTime {
        self.window
            .latest_start
            .map(SimTime::new)
            .unwrap_or(SimTime::INFINITY)
    }

    pub fn latest_finish(&self) -> SimTime {
        self.window
            .latest_finish
            .map(SimTime::new)
            .unwrap_or(SimTime::INFINITY)
    }

    /// Wait → Started
    pub(crate) fn start(&mut self, now: SimTime) -> Result<(), StateError> {
        self.expect(ActivityState::Wait, ActivityState::Started)?;
        self.started_at = now;
        self.enter(ActivityState::Started, now);
        Ok(())
    }

    /// Started → Done | Failed | FinishedByForce
    pub(crate) fn finish(&mut self, outcome: ActivityState, now: SimTime) -> Result<(), StateError> {
        debug_assert!(outcome.is_terminal());
        self.expect(ActivityState::Started, outcome)?;
        self.done_at = now;
        self.enter(outcome, now);
        Ok(())
    }

    /// Wait → Failed, when the start window closed
    pub(crate) fn expire(&mut self, now: SimTime) -> Result<(), StateError> {
        self.expect(ActivityState::Wait, ActivityState::Failed)?;
        self.done_at = now;
        self.enter(ActivityState::Failed, now);
        Ok(())
    }

    fn expect(&self, from: ActivityState, to: ActivityState) -> Result<(), StateError> {
        if self.state == from {
            return Ok(());
        }
        if from == ActivityState::Started {
            return Err(StateError::ActivityNotStarted {
                activity: self.name.clone(),
                state: self.state.to_string(),
            });
        }
        Err(StateError::InvalidTransition {
            activity: self.name.clone(),
            from: self.state.to_string(),
            to: to.to_string(),
        })
    }

    fn enter(&mut self, state: ActivityState, now: SimTime) {
        self.state = state;
        self.history.push((state, now));
    }
}
