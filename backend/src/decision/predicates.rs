//! Predicate table
//!
//! Predicates are plain functions looked up by name. Each receives the
//! activity being considered (its parsed [`ActivityKey`] gives the plot and
//! crop context), the rule id, the call's parameter bag and a read-only view
//! of working memory.
//!
//! The farm predicates read these parameters:
//!
//! | predicate      | parameters                                                      |
//! |----------------|-----------------------------------------------------------------|
//! | `harvestable`  | none                                                            |
//! | `penetrability`| `penetrability_operator`, `penetrability_threshold`             |
//! | `rain`         | `rain_operator`, `rain_threshold`, optional `rain_lookahead`    |
//! | `sum_rain`     | `sum_rain_operator`, `sum_rain_number`, `sum_rain_threshold`    |
//! | `sum_R-PET`    | `rain_day_number`, `p-etp_sum`                                  |
//! | `etp`          | `etp_param`                                                     |
//!
//! [`ActivityKey`]: crate::models::ActivityKey

use super::facts::{names, WorkingMemory};
use super::rules::PredicateParams;
use crate::core::SimTime;
use crate::error::ConfigurationError;
use crate::forecast::{CURRENT, PREVIOUS};
use crate::models::Activity;
use std::collections::HashMap;
use tracing::trace;

/// Everything a predicate may look at
pub struct PredicateContext<'a> {
    pub predicate: &'a str,
    pub activity: &'a Activity,
    pub rule: &'a str,
    pub params: &'a PredicateParams,
    pub memory: &'a WorkingMemory,
    pub now: SimTime,
}

impl PredicateContext<'_> {
    /// Plot the activity works on
    pub fn plot(&self) -> &str {
        &self.activity.key().plot
    }
}

pub type PredicateFn = fn(&PredicateContext<'_>) -> Result<bool, ConfigurationError>;

/// Name → predicate function
#[derive(Clone)]
pub struct PredicateRegistry {
    table: HashMap<String, PredicateFn>,
}

impl PredicateRegistry {
    /// Empty table
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Table with the farm predicates registered
    pub fn farm() -> Self {
        let mut registry = Self::empty();
        registry.register("harvestable", is_harvestable);
        registry.register("penetrability", is_penetrability_plot_valid);
        registry.register("rain", is_rain_quantity_valid);
        registry.register("sum_rain", is_rain_quantity_sum_valid);
        registry.register("sum_R-PET", is_petp_quantity_sum_valid);
        registry.register("etp", is_etp_quantity_valid);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, predicate: PredicateFn) {
        self.table.insert(name.into(), predicate);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Evaluate the named predicate
    pub fn evaluate(&self, context: &PredicateContext<'_>) -> Result<bool, ConfigurationError> {
        let predicate = self
            .table
            .get(context.predicate)
            .ok_or_else(|| ConfigurationError::UnknownPredicate(context.predicate.to_string()))?;

        let result = predicate(context)?;
        trace!(
            predicate = context.predicate,
            activity = context.activity.name(),
            rule = context.rule,
            result,
            "predicate evaluated"
        );
        Ok(result)
    }
}

impl Default for PredicateRegistry {
    fn default() -> Self {
        Self::farm()
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.table.keys().collect();
        keys.sort();
        f.debug_struct("PredicateRegistry")
            .field("predicates", &keys)
            .finish()
    }
}

// ============================================================================
// FARM PREDICATES
// ============================================================================

/// The plot's crop has reached maturity
pub fn is_harvestable(ctx: &PredicateContext<'_>) -> Result<bool, ConfigurationError> {
    ctx.memory.flag(&names::harvestable(ctx.plot()))
}

/// Soil reserve of the activity's plot compared to a threshold
pub fn is_penetrability_plot_valid(
    ctx: &PredicateContext<'_>,
) -> Result<bool, ConfigurationError> {
    let (op, threshold) = ctx.params.comparison(ctx.predicate, "penetrability")?;
    let ru = ctx.memory.number(&names::ru(ctx.plot()))?;
    Ok(op.apply(ru, threshold))
}

/// Rain forecast slot (default: current observation) compared to a threshold
pub fn is_rain_quantity_valid(ctx: &PredicateContext<'_>) -> Result<bool, ConfigurationError> {
    let (op, threshold) = ctx.params.comparison(ctx.predicate, "rain")?;
    let index = if ctx.params.contains("rain_lookahead") {
        ctx.params.get_count(ctx.predicate, "rain_lookahead")?
    } else {
        CURRENT
    };

    let forecast = ctx.memory.series(names::RAIN_FORECAST)?;
    let value = forecast
        .get(index)
        .copied()
        .ok_or_else(|| ConfigurationError::InvalidParameter {
            parameter: "rain_lookahead".to_string(),
            expected: format!("index below {}", forecast.len()),
        })?;

    Ok(op.apply(value, threshold))
}

/// Mean rain over the last `sum_rain_number` days compared to a threshold
///
/// For two days or less the two observed forecast slots are averaged.
/// Asking for more days than were recorded is an error.
pub fn is_rain_quantity_sum_valid(
    ctx: &PredicateContext<'_>,
) -> Result<bool, ConfigurationError> {
    let (op, threshold) = ctx.params.comparison(ctx.predicate, "sum_rain")?;
    let days = ctx.params.get_count(ctx.predicate, "sum_rain_number")?;

    let mean = if days <= 2 {
        let previous = forecast_slot(ctx.memory, names::RAIN_FORECAST, PREVIOUS)?;
        let current = forecast_slot(ctx.memory, names::RAIN_FORECAST, CURRENT)?;
        (previous + current) / 2.0
    } else {
        let history = recent(ctx.memory, names::RAIN_HISTORY, days)?;
        history.iter().sum::<f64>() / days as f64
    };

    Ok(op.apply(mean, threshold))
}

/// Mean of (rain − ETP) over the last `rain_day_number` days at most `p-etp_sum`
pub fn is_petp_quantity_sum_valid(
    ctx: &PredicateContext<'_>,
) -> Result<bool, ConfigurationError> {
    let days = ctx.params.get_count(ctx.predicate, "rain_day_number")?;
    let threshold = ctx.params.get_f64(ctx.predicate, "p-etp_sum")?;
    if days == 0 {
        return Err(ConfigurationError::InvalidParameter {
            parameter: "rain_day_number".to_string(),
            expected: "positive integer".to_string(),
        });
    }

    let rain = recent(ctx.memory, names::RAIN_HISTORY, days)?;
    let etp = recent(ctx.memory, names::ETP_HISTORY, days)?;

    let balance: f64 = rain
        .iter()
        .zip(etp)
        .map(|(r, e)| r - e)
        .sum();

    Ok(balance / days as f64 <= threshold)
}

/// Current ETP strictly above `etp_param`
pub fn is_etp_quantity_valid(ctx: &PredicateContext<'_>) -> Result<bool, ConfigurationError> {
    let threshold = ctx.params.get_f64(ctx.predicate, "etp_param")?;
    Ok(forecast_slot(ctx.memory, names::ETP_FORECAST, CURRENT)? > threshold)
}

/// The `days` most recent values of a history, newest first
fn recent<'a>(
    memory: &'a WorkingMemory,
    name: &str,
    days: usize,
) -> Result<&'a [f64], ConfigurationError> {
    let history = memory.series(name)?;
    history.get(..days).ok_or_else(|| {
        ConfigurationError::MissingFact(format!(
            "{}: {} days requested, {} recorded",
            name,
            days,
            history.len()
        ))
    })
}

fn forecast_slot(
    memory: &WorkingMemory,
    name: &str,
    index: usize,
) -> Result<f64, ConfigurationError> {
    memory
        .series(name)?
        .get(index)
        .copied()
        .ok_or_else(|| ConfigurationError::InvalidFact {
            name: name.to_string(),
            expected: format!("series with at least {} values", index + 1),
        })
}
