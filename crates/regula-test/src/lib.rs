//! Regula Test Harness - Scenario scripting and engine validation
//!
//! This crate provides:
//! - Scenario builders driving the engine like an application layer
//! - Ingestion-order fuzzing (determinism, partition, history immutability)
//! - Property helpers for the proptest suites
//! - A concurrent writer/reader/trial harness

pub mod integration;
pub mod order_fuzzer;
pub mod scenarios;

pub use integration::*;
pub use order_fuzzer::*;
pub use scenarios::*;
