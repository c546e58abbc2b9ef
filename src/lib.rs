//! Daily parlay generation and picks service.
//!
//! Generates a fixed set of risk-tiered parlays once per daily cycle from
//! live odds, serves them alongside per-user bet history, and exposes
//! operator diagnostics and maintenance over HTTP.

pub mod analyst;
pub mod api;
pub mod config;
pub mod cycle;
pub mod error;
pub mod generator;
pub mod model;
pub mod odds;
pub mod store;
