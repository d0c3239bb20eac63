//! Checkpointed batch execution over many stores and rasters.

mod config;
mod report;
mod runner;

pub mod jobs;

pub use config::{BatchConfig, Pools};
pub use report::{BatchReport, ItemOutcome};
pub use runner::BatchRunner;
