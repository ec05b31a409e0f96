//! Trial runs
//!
//! A trial appends draft records to a private copy of an instrument's
//! ledger and consolidates it with the same engine the write path uses.
//! The result is a provisional history owned by the caller; nothing is
//! ever published.

use std::sync::Arc;

use tracing::info;

use regula_core::{
    AmendmentRecord, HorizonHistory, IngestSeq, InstrumentId, KnowledgeDate, RecordKey,
    RegulaError, RegulaResult, SequencedRecord,
};
use regula_state::{admit, Ingestor, Ledger, RecomputeReport};
use regula_time::Bitemporal;

/// Provisional consolidation of committed records plus drafts
#[derive(Clone, Debug)]
pub struct TrialResult {
    pub instrument: InstrumentId,
    /// Draft keys in the order they were applied
    pub drafts: Vec<RecordKey>,
    pub history: Arc<HorizonHistory>,
    pub report: RecomputeReport,
}

impl TrialResult {
    pub fn horizons(&self) -> Vec<KnowledgeDate> {
        self.history.horizons().collect()
    }

    /// Trial horizons whose legal timeline differs from what `committed`
    /// answers at the same knowledge date
    pub fn differs_from(&self, committed: &HorizonHistory) -> Vec<KnowledgeDate> {
        self.history
            .timelines()
            .filter(|trial| {
                committed
                    .at(trial.horizon)
                    .map_or(true, |c| !c.same_partition(trial))
            })
            .map(|t| t.horizon)
            .collect()
    }
}

impl Bitemporal for TrialResult {
    fn history(&self) -> &HorizonHistory {
        &self.history
    }
}

/// Apply `drafts` in order to a copy of `ledger` and consolidate every
/// horizon into a provisional history.
///
/// Drafts go through the same admission checks as committed records and
/// receive sequence numbers from `first_seq` on.
pub fn run_trial(
    ingestor: &Ingestor,
    ledger: &Ledger,
    drafts: Vec<AmendmentRecord>,
    first_seq: IngestSeq,
    max_drafts: usize,
) -> RegulaResult<TrialResult> {
    if drafts.is_empty() {
        return Err(RegulaError::TrialRejected("no draft records".to_string()));
    }
    if drafts.len() > max_drafts {
        return Err(RegulaError::TrialRejected(format!(
            "{} draft records exceed the limit of {}",
            drafts.len(),
            max_drafts
        )));
    }

    let mut ledger = ledger.clone();
    let mut keys = Vec::with_capacity(drafts.len());
    let affected_from = drafts.iter().map(|d| d.effective).min();
    let mut seq = first_seq;

    for draft in drafts {
        admit(&ledger, &draft, ingestor.policy())?;
        keys.push(draft.key());
        let branch = draft.branch;
        ledger
            .registry_mut()
            .get_mut(branch)?
            .push_record(SequencedRecord::new(draft, seq));
        seq = seq.next();
    }

    let from = ledger
        .knowledge_dates()
        .first()
        .copied()
        .ok_or_else(|| RegulaError::TrialRejected("no knowledge horizon".to_string()))?;

    let base = HorizonHistory::provisional(ledger.instrument().clone());
    let (history, mut report) = ingestor.engine().recompute(&ledger, &base, from)?;
    report.affected_from = affected_from;

    info!(
        instrument = %ledger.instrument(),
        drafts = keys.len(),
        horizons = history.len(),
        "trial consolidated"
    );

    Ok(TrialResult {
        instrument: ledger.instrument().clone(),
        drafts: keys,
        history: Arc::new(history),
        report,
    })
}
