//! Port-addressed events exchanged between models
//!
//! Events carry an attribute bag (`serde_json::Map`) rather than a fixed
//! struct: each port has its own contract and the typed payloads below
//! ([`Ack`], [`ResourceCommand`], [`ResourceOrder`], [`WeatherObservation`],
//! [`ResourceReport`]) convert to and from that bag.
//!
//! # Example
//!
//! ```rust
//! use agrisim_core::models::{Ack, AckOrder, ExternalEvent};
//!
//! let event = ExternalEvent::new("out")
//!     .with("activity", "Seed_WW_p0")
//!     .with("order", "done");
//!
//! let ack = Ack::from_event(&event).unwrap();
//! assert_eq!(ack.activity, "Seed_WW_p0");
//! assert_eq!(ack.order, AckOrder::Done);
//! ```

use crate::error::ModelingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Attribute bag of an event
pub type Attributes = serde_json::Map<String, Value>;

/// Well-known port names of the farm topology
pub mod ports {
    /// Farmer input: job acknowledgements
    pub const ACK: &str = "ack";
    /// Farmer input: weather observations
    pub const METEO: &str = "meteo";
    /// Farmer output: resource commands
    pub const OS: &str = "os";
    /// Generic input port
    pub const IN: &str = "in";
    /// Generic output port
    pub const OUT: &str = "out";
}

/// An event addressed to (or emitted from) a named port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub port: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ExternalEvent {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn on_port(&self, port: &str) -> bool {
        self.port == port
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Value, ModelingError> {
        self.attributes
            .get(name)
            .ok_or_else(|| ModelingError::MissingAttribute {
                port: self.port.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, ModelingError> {
        self.get(name)?
            .as_f64()
            .ok_or_else(|| self.invalid(name, "number"))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ModelingError> {
        self.get(name)?
            .as_str()
            .ok_or_else(|| self.invalid(name, "string"))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ModelingError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "boolean"))
    }

    fn invalid(&self, name: &str, expected: &str) -> ModelingError {
        ModelingError::InvalidAttribute {
            port: self.port.clone(),
            attribute: name.to_string(),
            expected: expected.to_string(),
        }
    }
}

// ============================================================================
// Acknowledgements (operations → farmer)
// ============================================================================

/// Outcome reported for a finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckOrder {
    Done,
    Fail,
}

impl AckOrder {
    pub fn parse(order: &str) -> Result<Self, ModelingError> {
        match order {
            "done" => Ok(AckOrder::Done),
            "fail" => Ok(AckOrder::Fail),
            other => Err(ModelingError::UnknownOrder(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AckOrder::Done => "done",
            AckOrder::Fail => "fail",
        }
    }
}

/// `{resource?, activity, order: "done"|"fail"}`
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub resource: Option<String>,
    pub activity: String,
    pub order: AckOrder,
}

impl Ack {
    pub fn to_event(&self, port: &str) -> ExternalEvent {
        let mut event = ExternalEvent::new(port)
            .with("activity", self.activity.as_str())
            .with("order", self.order.as_str());
        if let Some(resource) = &self.resource {
            event = event.with("resource", resource.as_str());
        }
        event
    }

    pub fn from_event(event: &ExternalEvent) -> Result<Self, ModelingError> {
        let resource = if event.has("resource") {
            Some(event.get_str("resource")?.to_string())
        } else {
            None
        };

        Ok(Self {
            resource,
            activity: event.get_str("activity")?.to_string(),
            order: AckOrder::parse(event.get_str("order")?)?,
        })
    }
}

// ============================================================================
// Resource commands (farmer → operations → resource)
// ============================================================================

/// Kind of work ordered on a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Order {
    Sow,
    Harvest,
    /// Terminal notification: forwarded, never queued
    Stop,
    Other(String),
}

impl Order {
    /// Map an activity operation token to its order
    ///
    /// # Example
    /// ```
    /// use agrisim_core::models::Order;
    ///
    /// assert_eq!(Order::for_operation("Seed"), Order::Sow);
    /// assert_eq!(Order::for_operation("Harvest"), Order::Harvest);
    /// assert_eq!(Order::for_operation("Plough"), Order::Other("plough".to_string()));
    /// ```
    pub fn for_operation(operation: &str) -> Self {
        let lower = operation.to_ascii_lowercase();
        if lower.starts_with("seed") || lower.starts_with("sow") {
            Order::Sow
        } else if lower.starts_with("harvest") {
            Order::Harvest
        } else {
            Order::Other(lower)
        }
    }

    /// Orders that occupy the resource for a duration
    pub fn is_start(&self) -> bool {
        !matches!(self, Order::Stop)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Order::Sow => "sow",
            Order::Harvest => "harvest",
            Order::Stop => "stop",
            Order::Other(name) => name,
        }
    }
}

impl From<&str> for Order {
    fn from(value: &str) -> Self {
        match value {
            "sow" => Order::Sow,
            "harvest" => Order::Harvest,
            "stop" => Order::Stop,
            other => Order::Other(other.to_string()),
        }
    }
}

impl From<String> for Order {
    fn from(value: String) -> Self {
        Order::from(value.as_str())
    }
}

impl From<Order> for String {
    fn from(value: Order) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{resource, order, activity, duration}` on the farmer's command port
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCommand {
    pub resource: String,
    pub order: Order,
    pub activity: String,
    pub duration: f64,
}

impl ResourceCommand {
    pub fn to_event(&self, port: &str) -> ExternalEvent {
        ExternalEvent::new(port)
            .with("resource", self.resource.as_str())
            .with("order", self.order.as_str())
            .with("activity", self.activity.as_str())
            .with("duration", self.duration)
    }

    pub fn from_event(event: &ExternalEvent) -> Result<Self, ModelingError> {
        Ok(Self {
            resource: event.get_str("resource")?.to_string(),
            order: Order::from(event.get_str("order")?),
            activity: event.get_str("activity")?.to_string(),
            duration: event.get_f64("duration")?,
        })
    }
}

/// `{order, activity, duration}` forwarded to a resource's own port
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOrder {
    pub order: Order,
    pub activity: String,
    pub duration: f64,
}

impl ResourceOrder {
    pub fn to_event(&self, port: &str) -> ExternalEvent {
        ExternalEvent::new(port)
            .with("order", self.order.as_str())
            .with("activity", self.activity.as_str())
            .with("duration", self.duration)
    }

    pub fn from_event(event: &ExternalEvent) -> Result<Self, ModelingError> {
        Ok(Self {
            order: Order::from(event.get_str("order")?),
            activity: event.get_str("activity")?.to_string(),
            duration: event.get_f64("duration")?,
        })
    }
}

// ============================================================================
// Environment reports
// ============================================================================

/// `{rain, etp}` from the weather model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub rain: f64,
    pub etp: f64,
}

impl WeatherObservation {
    pub fn to_event(&self, port: &str) -> ExternalEvent {
        ExternalEvent::new(port)
            .with("rain", self.rain)
            .with("etp", self.etp)
    }

    pub fn from_event(event: &ExternalEvent) -> Result<Self, ModelingError> {
        Ok(Self {
            rain: event.get_f64("rain")?,
            etp: event.get_f64("etp")?,
        })
    }
}

/// Optional `{ru}` and/or `{harvestable}` on a plot port
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceReport {
    pub ru: Option<f64>,
    pub harvestable: Option<bool>,
}

impl ResourceReport {
    pub fn from_event(event: &ExternalEvent) -> Result<Self, ModelingError> {
        let ru = if event.has("ru") {
            Some(event.get_f64("ru")?)
        } else {
            None
        };
        let harvestable = if event.has("harvestable") {
            Some(event.get_bool("harvestable")?)
        } else {
            None
        };
        Ok(Self { ru, harvestable })
    }
}
