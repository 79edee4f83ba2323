//! Domain models: activities and the events models exchange

pub mod activity;
pub mod event;

pub use activity::{Activity, ActivityKey, ActivityState, PrecedenceConstraint, TemporalWindow};
pub use event::{
    ports, Ack, AckOrder, Attributes, ExternalEvent, Order, ResourceCommand, ResourceOrder,
    ResourceReport, WeatherObservation,
};
