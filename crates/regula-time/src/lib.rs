//! Regula Time - Bitemporal resolution and time travel
//!
//! This crate implements the read side over a [`HorizonHistory`]:
//! - Point resolution of (legal date, knowledge date)
//! - Legal timelines: the whole legal axis as known at one date
//! - Knowledge timelines: how the answer for one legal date evolved
//!
//! Everything here is pure; histories are immutable values.
//!
//! [`HorizonHistory`]: regula_core::HorizonHistory

pub mod resolver;
pub mod travel;

pub use resolver::*;
pub use travel::*;
