//! Working memory
//!
//! Facts are named most-recent-value cells. Applying a fact overwrites the
//! cell and nothing else; activities only react when the knowledge base next
//! processes changes.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fact names shared by the farmer and the farm predicates
pub mod names {
    /// Latest observed rain (mm)
    pub const RAIN: &str = "rain";
    /// Latest observed evapotranspiration (mm)
    pub const ETP: &str = "etp";
    /// Rain forecast buffer: previous, current, predictions
    pub const RAIN_FORECAST: &str = "rain.forecast";
    /// ETP forecast buffer
    pub const ETP_FORECAST: &str = "etp.forecast";
    /// Observed rain, most recent first
    pub const RAIN_HISTORY: &str = "rain.history";
    /// Observed ETP, most recent first
    pub const ETP_HISTORY: &str = "etp.history";

    /// Soil reserve of a plot
    pub fn ru(plot: &str) -> String {
        format!("ru.{}", plot)
    }

    /// Crop maturity flag of a plot
    pub fn harvestable(plot: &str) -> String {
        format!("harvestable.{}", plot)
    }
}

/// Value held by a fact cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Flag(bool),
    Number(f64),
    Series(Vec<f64>),
}

impl From<f64> for FactValue {
    fn from(value: f64) -> Self {
        FactValue::Number(value)
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Flag(value)
    }
}

impl From<Vec<f64>> for FactValue {
    fn from(value: Vec<f64>) -> Self {
        FactValue::Series(value)
    }
}

/// Facts known to the decision maker
///
/// # Example
/// ```
/// use agrisim_core::decision::WorkingMemory;
///
/// let mut memory = WorkingMemory::new();
/// memory.apply("ru.p0", 32.5);
/// memory.apply("ru.p0", 30.0);
///
/// assert_eq!(memory.number("ru.p0").unwrap(), 30.0);
/// assert!(memory.number("ru.p1").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    facts: HashMap<String, FactValue>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a fact
    pub fn apply(&mut self, name: impl Into<String>, value: impl Into<FactValue>) {
        self.facts.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FactValue> {
        self.facts.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.facts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn number(&self, name: &str) -> Result<f64, ConfigurationError> {
        match self.require(name)? {
            FactValue::Number(value) => Ok(*value),
            _ => Err(invalid(name, "number")),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, ConfigurationError> {
        match self.require(name)? {
            FactValue::Flag(value) => Ok(*value),
            _ => Err(invalid(name, "flag")),
        }
    }

    pub fn series(&self, name: &str) -> Result<&[f64], ConfigurationError> {
        match self.require(name)? {
            FactValue::Series(values) => Ok(values),
            _ => Err(invalid(name, "series")),
        }
    }

    fn require(&self, name: &str) -> Result<&FactValue, ConfigurationError> {
        self.facts
            .get(name)
            .ok_or_else(|| ConfigurationError::MissingFact(name.to_string()))
    }
}

fn invalid(name: &str, expected: &str) -> ConfigurationError {
    ConfigurationError::InvalidFact {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_type_is_reported() {
        let mut memory = WorkingMemory::new();
        memory.apply("harvestable.p0", true);

        assert_eq!(
            memory.number("harvestable.p0"),
            Err(ConfigurationError::InvalidFact {
                name: "harvestable.p0".to_string(),
                expected: "number".to_string(),
            })
        );
        assert_eq!(memory.flag("harvestable.p0"), Ok(true));
    }

    #[test]
    fn test_fact_value_untagged_json() {
        let value: FactValue = serde_json::from_str("[1.0, 2.5]").unwrap();
        assert_eq!(value, FactValue::Series(vec![1.0, 2.5]));

        let value: FactValue = serde_json::from_str("false").unwrap();
        assert_eq!(value, FactValue::Flag(false));
    }
}
