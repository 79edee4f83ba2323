//! Rules and predicate parameters
//!
//! A rule is a conjunction of predicate calls. Each call names a predicate in
//! the registry and carries its own parameter bag, read from configuration.
//! An activity may start when any of its rules holds.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Absolute tolerance for `=` / `!=` in predicates
///
/// Thresholds come from text configuration, so exact float equality is never
/// used.
pub const EQUALITY_TOLERANCE: f64 = 0.1;

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// Operator read from a predicate's `*_operator` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    /// Parse an operator string
    ///
    /// Unknown operators are configuration errors naming the predicate.
    ///
    /// # Example
    /// ```
    /// use agrisim_core::decision::Comparison;
    ///
    /// let op = Comparison::parse("penetrability", "<").unwrap();
    /// assert!(op.apply(39.9, 40.0));
    /// assert!(!op.apply(40.1, 40.0));
    ///
    /// assert!(Comparison::parse("penetrability", "<>").is_err());
    /// ```
    pub fn parse(predicate: &str, operator: &str) -> Result<Self, ConfigurationError> {
        match operator {
            "<" => Ok(Comparison::Less),
            "<=" => Ok(Comparison::LessOrEqual),
            ">" => Ok(Comparison::Greater),
            ">=" => Ok(Comparison::GreaterOrEqual),
            "=" | "==" => Ok(Comparison::Equal),
            "!=" => Ok(Comparison::NotEqual),
            other => Err(ConfigurationError::UnknownOperator {
                predicate: predicate.to_string(),
                operator: other.to_string(),
            }),
        }
    }

    /// `lhs <op> rhs`
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
            Comparison::Equal => (lhs - rhs).abs() <= EQUALITY_TOLERANCE,
            Comparison::NotEqual => (lhs - rhs).abs() > EQUALITY_TOLERANCE,
        }
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Parameter bag of one predicate call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateParams(HashMap<String, Value>);

impl PredicateParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get_str(&self, predicate: &str, name: &str) -> Result<&str, ConfigurationError> {
        self.require(predicate, name)?
            .as_str()
            .ok_or_else(|| invalid(name, "string"))
    }

    pub fn get_f64(&self, predicate: &str, name: &str) -> Result<f64, ConfigurationError> {
        self.require(predicate, name)?
            .as_f64()
            .ok_or_else(|| invalid(name, "number"))
    }

    /// Non-negative whole number (day counts, lookahead indices)
    ///
    /// Accepts `5` as well as `5.0`, since day counts are often written as
    /// floats in plan files.
    pub fn get_count(&self, predicate: &str, name: &str) -> Result<usize, ConfigurationError> {
        let value = self.get_f64(predicate, name)?;
        if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
            return Err(invalid(name, "non-negative integer"));
        }
        Ok(value as usize)
    }

    /// Operator and threshold stored under `<prefix>_operator` / `<prefix>_threshold`
    pub fn comparison(
        &self,
        predicate: &str,
        prefix: &str,
    ) -> Result<(Comparison, f64), ConfigurationError> {
        let operator = self.get_str(predicate, &format!("{}_operator", prefix))?;
        let comparison = Comparison::parse(predicate, operator)?;
        let threshold = self.get_f64(predicate, &format!("{}_threshold", prefix))?;
        Ok((comparison, threshold))
    }

    fn require(&self, predicate: &str, name: &str) -> Result<&Value, ConfigurationError> {
        self.0
            .get(name)
            .ok_or_else(|| ConfigurationError::MissingParameter {
                predicate: predicate.to_string(),
                parameter: name.to_string(),
            })
    }
}

fn invalid(name: &str, expected: &str) -> ConfigurationError {
    ConfigurationError::InvalidParameter {
        parameter: name.to_string(),
        expected: expected.to_string(),
    }
}

// ============================================================================
// RULES
// ============================================================================

/// One predicate invocation inside a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateCall {
    pub predicate: String,
    #[serde(default)]
    pub params: PredicateParams,
}

impl PredicateCall {
    pub fn new(predicate: impl Into<String>, params: PredicateParams) -> Self {
        Self {
            predicate: predicate.into(),
            params,
        }
    }
}

/// Named conjunction of predicate calls
///
/// A rule with no predicates always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub predicates: Vec<PredicateCall>,
}

impl Rule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>, params: PredicateParams) -> Self {
        self.predicates.push(PredicateCall::new(predicate, params));
        self
    }
}
