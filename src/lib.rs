//! Capacity expansion and dispatch optimisation for small electricity networks.
#![warn(missing_docs)]
pub mod cli;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod network;
pub mod optimisation;
pub mod output;
pub mod profile;
pub mod report;
pub mod run;
pub mod settings;
pub mod snapshot;
pub mod units;

#[cfg(test)]
mod fixture;
