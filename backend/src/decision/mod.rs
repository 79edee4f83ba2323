//! Knowledge base: facts, rules and the activity lifecycle
//!
//! The knowledge base is the only owner of [`Activity`] values. Facts are
//! applied into working memory without side effects; activities only move
//! when [`KnowledgeBase::process_changes`] runs or when an acknowledgement
//! is reported with [`KnowledgeBase::set_activity_done`] /
//! [`KnowledgeBase::set_activity_failed`].
//!
//! # Processing an instant
//!
//! 1. Every Wait activity whose window is open, whose precedence constraints
//!    are met and for which any rule holds is started. This repeats until
//!    nothing else starts, so zero-delay chains start in the same instant, in
//!    declaration order.
//! 2. Wait activities past their latest start fail.
//! 3. Started activities past their latest finish are finished by force.
//!
//! Every transition is recorded in the [`LatestActivities`] lists until the
//! owner drains them.

pub mod facts;
pub mod plan;
pub mod predicates;
pub mod rules;

pub use facts::{names, FactValue, WorkingMemory};
pub use plan::{ActivityConfig, DecisionPlan};
pub use predicates::{PredicateContext, PredicateFn, PredicateRegistry};
pub use rules::{Comparison, PredicateCall, PredicateParams, Rule, EQUALITY_TOLERANCE};

use crate::core::SimTime;
use crate::error::{ConfigurationError, SimulationError, StateError};
use crate::models::{Activity, ActivityState};
use std::collections::HashMap;
use tracing::{debug, info};

/// Outcome of [`KnowledgeBase::process_changes`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessResult {
    /// At least one activity changed state at this instant
    pub has_immediate_change: bool,

    /// Next time a window bound or precedence opening can change the outcome
    pub next_check: SimTime,
}

/// Activity names that changed state since the last drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatestActivities {
    pub started: Vec<String>,
    pub done: Vec<String>,
    pub failed: Vec<String>,
    /// Finished by force
    pub ended: Vec<String>,
}

impl LatestActivities {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
            && self.done.is_empty()
            && self.failed.is_empty()
            && self.ended.is_empty()
    }
}

/// Facts, rules and activities of one decision maker
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    memory: WorkingMemory,
    activities: Vec<Activity>,
    index: HashMap<String, usize>,
    rules: HashMap<String, Rule>,
    predicates: PredicateRegistry,
    latest: LatestActivities,
}

impl KnowledgeBase {
    pub fn new(predicates: PredicateRegistry) -> Self {
        Self {
            memory: WorkingMemory::new(),
            activities: Vec::new(),
            index: HashMap::new(),
            rules: HashMap::new(),
            predicates,
            latest: LatestActivities::default(),
        }
    }

    /// Build and validate a knowledge base from a plan
    ///
    /// # Example
    /// ```
    /// use agrisim_core::decision::{DecisionPlan, KnowledgeBase, PredicateRegistry};
    ///
    /// let plan: DecisionPlan = serde_json::from_str(r#"{
    ///     "rules": [{"id": "always"}],
    ///     "activities": [{"name": "Seed_WW_p0", "rules": ["typo"]}]
    /// }"#).unwrap();
    ///
    /// assert!(KnowledgeBase::from_plan(&plan, PredicateRegistry::farm()).is_err());
    /// ```
    pub fn from_plan(
        plan: &DecisionPlan,
        predicates: PredicateRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut kb = Self::new(predicates);
        for rule in &plan.rules {
            kb.add_rule(rule.clone())?;
        }
        for config in &plan.activities {
            kb.add_activity(config.build()?)?;
        }
        kb.validate()?;
        Ok(kb)
    }

    pub fn add_rule(&mut self, rule: Rule) -> Result<(), ConfigurationError> {
        if self.rules.contains_key(&rule.id) {
            return Err(ConfigurationError::Duplicate(format!("rule {}", rule.id)));
        }
        self.rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    /// Append an activity; declaration order is the processing order
    pub fn add_activity(&mut self, activity: Activity) -> Result<(), ConfigurationError> {
        activity.check_bounds()?;
        if self.index.contains_key(activity.name()) {
            return Err(ConfigurationError::Duplicate(format!(
                "activity {}",
                activity.name()
            )));
        }
        self.index
            .insert(activity.name().to_string(), self.activities.len());
        self.activities.push(activity);
        Ok(())
    }

    /// Check every rule, predicate and constraint reference
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for rule in self.rules.values() {
            for call in &rule.predicates {
                if !self.predicates.contains(&call.predicate) {
                    return Err(ConfigurationError::UnknownPredicate(call.predicate.clone()));
                }
            }
        }

        for activity in &self.activities {
            for rule in activity.rules() {
                if !self.rules.contains_key(rule) {
                    return Err(ConfigurationError::UnknownRule {
                        activity: activity.name().to_string(),
                        rule: rule.clone(),
                    });
                }
            }
            for constraint in activity.constraints() {
                if !self.index.contains_key(&constraint.other) {
                    return Err(ConfigurationError::UnknownConstraintTarget {
                        activity: activity.name().to_string(),
                        other: constraint.other.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Facts
    // ========================================================================

    /// Upsert a fact; activities are not touched
    pub fn apply_fact(&mut self, name: impl Into<String>, value: impl Into<FactValue>) {
        let name = name.into();
        let value = value.into();
        debug!(fact = %name, ?value, "fact applied");
        self.memory.apply(name, value);
    }

    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Re-evaluate every activity at `now`
    pub fn process_changes(&mut self, now: SimTime) -> Result<ProcessResult, SimulationError> {
        let mut changed = false;

        loop {
            let mut progressed = false;
            for i in 0..self.activities.len() {
                if self.activities[i].state() != ActivityState::Wait {
                    continue;
                }
                if self.is_ready(i, now)? {
                    let activity = &mut self.activities[i];
                    activity.start(now)?;
                    info!(activity = activity.name(), %now, "activity started");
                    self.latest.started.push(activity.name().to_string());
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
            changed = true;
        }

        for activity in &mut self.activities {
            match activity.state() {
                ActivityState::Wait if activity.latest_start().approx_le(now) => {
                    activity.expire(now)?;
                    info!(activity = activity.name(), %now, "activity failed: start window closed");
                    self.latest.failed.push(activity.name().to_string());
                    changed = true;
                }
                ActivityState::Started if activity.latest_finish().approx_le(now) => {
                    activity.finish(ActivityState::FinishedByForce, now)?;
                    info!(activity = activity.name(), %now, "activity finished by force");
                    self.latest.ended.push(activity.name().to_string());
                    changed = true;
                }
                _ => {}
            }
        }

        Ok(ProcessResult {
            has_immediate_change: changed,
            next_check: self.next_check(now),
        })
    }

    /// Started → Done
    pub fn set_activity_done(&mut self, name: &str, now: SimTime) -> Result<(), StateError> {
        let activity = self.activity_mut(name)?;
        activity.finish(ActivityState::Done, now)?;
        info!(activity = name, %now, "activity done");
        self.latest.done.push(name.to_string());
        Ok(())
    }

    /// Started → Failed
    pub fn set_activity_failed(&mut self, name: &str, now: SimTime) -> Result<(), StateError> {
        let activity = self.activity_mut(name)?;
        activity.finish(ActivityState::Failed, now)?;
        info!(activity = name, %now, "activity failed");
        self.latest.failed.push(name.to_string());
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn activity(&self, name: &str) -> Option<&Activity> {
        self.index.get(name).map(|&i| &self.activities[i])
    }

    /// Activities in declaration order
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.get(id)
    }

    pub fn latest(&self) -> &LatestActivities {
        &self.latest
    }

    pub fn has_latest(&self) -> bool {
        !self.latest.is_empty()
    }

    /// Take the recorded transitions, leaving the lists empty
    pub fn take_latest(&mut self) -> LatestActivities {
        std::mem::take(&mut self.latest)
    }

    pub fn clear_latest(&mut self) {
        self.latest = LatestActivities::default();
    }

    /// Every activity is Done, Failed or FinishedByForce
    pub fn all_terminal(&self) -> bool {
        self.activities.iter().all(|a| a.state().is_terminal())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn activity_mut(&mut self, name: &str) -> Result<&mut Activity, StateError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| StateError::UnknownActivity(name.to_string()))?;
        Ok(&mut self.activities[i])
    }

    fn is_ready(&self, i: usize, now: SimTime) -> Result<bool, SimulationError> {
        let activity = &self.activities[i];

        if !activity.earliest_start().approx_le(now) || !now.approx_le(activity.latest_start()) {
            return Ok(false);
        }
        if !self.constraints_met(activity, now)? {
            return Ok(false);
        }
        if activity.rules().is_empty() {
            return Ok(true);
        }

        for id in activity.rules() {
            if self.rule_holds(activity, id, now)? {
                debug!(activity = activity.name(), rule = %id, %now, "rule satisfied");
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn constraints_met(&self, activity: &Activity, now: SimTime) -> Result<bool, StateError> {
        for constraint in activity.constraints() {
            let other = self
                .activity(&constraint.other)
                .ok_or_else(|| StateError::UnknownActivity(constraint.other.clone()))?;
            let started_at = other.started_at();
            if started_at.is_neg_infinity() || !(started_at + constraint.min_delay).approx_le(now)
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn rule_holds(
        &self,
        activity: &Activity,
        id: &str,
        now: SimTime,
    ) -> Result<bool, ConfigurationError> {
        let rule = self
            .rules
            .get(id)
            .ok_or_else(|| ConfigurationError::UnknownRule {
                activity: activity.name().to_string(),
                rule: id.to_string(),
            })?;

        for call in &rule.predicates {
            let context = PredicateContext {
                predicate: &call.predicate,
                activity,
                rule: id,
                params: &call.params,
                memory: &self.memory,
                now,
            };
            if !self.predicates.evaluate(&context)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn next_check(&self, now: SimTime) -> SimTime {
        let mut next = SimTime::INFINITY;
        let mut consider = |candidate: SimTime| {
            if candidate > now && !candidate.approx_eq(now) {
                next = next.min(candidate);
            }
        };

        for activity in &self.activities {
            match activity.state() {
                ActivityState::Wait => {
                    consider(activity.earliest_start());
                    consider(activity.latest_start());
                    for constraint in activity.constraints() {
                        if let Some(other) = self.activity(&constraint.other) {
                            if !other.started_at().is_neg_infinity() {
                                consider(other.started_at() + constraint.min_delay);
                            }
                        }
                    }
                }
                ActivityState::Started => consider(activity.latest_finish()),
                _ => {}
            }
        }

        next
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(PredicateRegistry::farm())
    }
}
