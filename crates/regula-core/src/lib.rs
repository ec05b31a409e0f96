//! Regula Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout Regula:
//! - Identifiers (InstrumentId, BranchId, VersionNumber, RecordKey)
//! - Date primitives (LegalDate, KnowledgeDate, LegalInterval)
//! - Amendment records and changes
//! - Consolidated states, timelines and horizon histories
//! - Branch lifecycle states and activities
//! - Error taxonomy and timeline invariants

pub mod id;
pub mod time;
pub mod record;
pub mod state;
pub mod lifecycle;
pub mod error;
pub mod invariants;

pub use id::*;
pub use time::*;
pub use record::*;
pub use state::*;
pub use lifecycle::*;
pub use error::*;
