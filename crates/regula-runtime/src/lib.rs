//! Regula Runtime - Engine facade
//!
//! This crate wires the components into one thread-safe engine:
//! - Per-instrument writer sections and atomic snapshot publication
//! - Branch, workflow, ingestion and query entry points
//! - Isolated trial runs over copied snapshots
//! - Configuration, logging bootstrap and runtime statistics

pub mod config;
pub mod engine;
pub mod stats;
pub mod telemetry;
pub mod trial;

pub use config::*;
pub use engine::*;
pub use stats::*;
pub use telemetry::*;
pub use trial::*;
