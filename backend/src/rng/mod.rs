//! Deterministic random number generation
//!
//! Uses the xorshift64* algorithm. Every random draw in the simulator
//! (forecast noise, crop maturity jitter) goes through an explicitly
//! injected [`RngManager`]; there is no global generator.

mod xorshift;

pub use xorshift::RngManager;
