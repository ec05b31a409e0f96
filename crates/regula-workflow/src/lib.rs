//! Regula Workflow - Branch registry and activity workflow
//!
//! This crate implements:
//! - Branch registration, closing and derivation (DAG of flat keys)
//! - The per-branch activity state machine as an explicit transition table
//! - Pending/published record bookkeeping and the activity log

pub mod branch;
pub mod workflow;

pub use branch::*;
pub use workflow::*;
