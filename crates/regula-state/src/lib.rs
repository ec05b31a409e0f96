//! Regula State - Amendment ingestion and consolidation
//!
//! This crate implements the write side of one instrument:
//! - The per-instrument ledger (branches, records, branch precedence)
//! - Record admission and ordering checks
//! - The consolidation engine producing one timeline per knowledge horizon
//! - All-or-nothing ingestion combining the two

pub mod consolidate;
pub mod ingest;
pub mod ledger;
pub mod priority;

pub use consolidate::*;
pub use ingest::*;
pub use ledger::*;
pub use priority::*;
