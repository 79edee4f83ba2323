//! Decision plan configuration
//!
//! A plan lists the rules and the activities of one decision maker. It is
//! plain data (JSON through serde) and is turned into a
//! [`KnowledgeBase`](super::KnowledgeBase) with `KnowledgeBase::from_plan`,
//! which validates every cross-reference up front.

use super::rules::Rule;
use crate::error::ConfigurationError;
use crate::models::{Activity, PrecedenceConstraint, TemporalWindow};
use serde::{Deserialize, Serialize};

/// Rules and activities of a decision maker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionPlan {
    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub activities: Vec<ActivityConfig>,
}

/// One activity of the plan
///
/// # Example
/// ```
/// use agrisim_core::decision::ActivityConfig;
///
/// let config: ActivityConfig = serde_json::from_str(r#"{
///     "name": "Harvest_WW_p0",
///     "rules": ["mature"],
///     "precedences": [{"other": "Seed_WW_p0", "min_delay": 30.0}],
///     "window": {"latest_start": 300.0}
/// }"#).unwrap();
///
/// let activity = config.build().unwrap();
/// assert_eq!(activity.constraints().len(), 1);
/// assert!(activity.rules().contains("mature"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    pub name: String,

    /// Any of these rules may start the activity; empty means unconditional
    #[serde(default)]
    pub rules: Vec<String>,

    #[serde(default)]
    pub precedences: Vec<PrecedenceConstraint>,

    #[serde(default)]
    pub window: TemporalWindow,
}

impl ActivityConfig {
    pub fn build(&self) -> Result<Activity, ConfigurationError> {
        let mut activity = Activity::new(self.name.clone())?.with_window(self.window);

        for rule in &self.rules {
            activity = activity.with_rule(rule.clone());
        }
        for constraint in &self.precedences {
            activity = activity.with_constraint(constraint.other.clone(), constraint.min_delay);
        }

        activity.check_bounds()?;
        Ok(activity)
    }
}
