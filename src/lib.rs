//! Two-stage scheduling for small hydropower cascades.
//!
//! The first stage turns a price and inflow forecast into a day-ahead
//! dispatch plan on a coarse time axis. The second stage re-solves each
//! intraday scenario on a finer axis with unit commitment, tethered to
//! the day-ahead setpoints. [`optimizer::Planner`] is the entry point
//! for both.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod optimizer;
pub mod telemetry;
