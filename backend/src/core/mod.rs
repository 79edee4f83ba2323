//! Core simulation primitives

pub mod time;

pub use time::{SimTime, TIME_EPSILON};
