//! Per-instrument ledger
//!
//! The ledger is everything the write path knows about one instrument:
//! its branch registry (with each branch's ordered records and workflow
//! state) and the caller-configured branch precedence. Ledgers are plain
//! values; writers clone, modify and publish a new one.

use regula_core::{InstrumentId, KnowledgeDate, SequencedRecord};
use regula_workflow::BranchRegistry;

use crate::BranchPriority;

/// Write-side state of one instrument
#[derive(Clone, Debug)]
pub struct Ledger {
    registry: BranchRegistry,
    priority: Option<BranchPriority>,
}

impl Ledger {
    pub fn new(instrument: InstrumentId) -> Self {
        Ledger {
            registry: BranchRegistry::new(instrument),
            priority: None,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        self.registry.instrument()
    }

    pub fn registry(&self) -> &BranchRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BranchRegistry {
        &mut self.registry
    }

    pub fn priority(&self) -> Option<&BranchPriority> {
        self.priority.as_ref()
    }

    pub fn set_priority(&mut self, priority: Option<BranchPriority>) {
        self.priority = priority;
    }

    /// All accepted records across branches
    pub fn records(&self) -> impl Iterator<Item = &SequencedRecord> {
        self.registry.iter().flat_map(|b| b.records().iter())
    }

    pub fn record_count(&self) -> usize {
        self.registry.iter().map(|b| b.records().len()).sum()
    }

    /// Distinct knowledge dates, ascending
    pub fn knowledge_dates(&self) -> Vec<KnowledgeDate> {
        let mut dates: Vec<_> = self.records().map(|r| r.record.known).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}
