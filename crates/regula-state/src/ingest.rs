//! Amendment ingestion
//!
//! Admission checks a record against the ledger without touching it.
//! Ingestion then builds the next ledger and the next horizon history as
//! new values; the caller publishes both or neither.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use regula_core::{
    AmendmentRecord, Change, HorizonHistory, IngestSeq, LegalDate, RecordKey, RegulaError,
    RegulaResult, SequencedRecord,
};

use crate::{ConsolidationEngine, Ledger, RecomputeReport};

/// Admission rules that are configurable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// A branch's versions must carry non-decreasing knowledge dates
    pub require_monotonic_knowledge: bool,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy {
            require_monotonic_knowledge: true,
        }
    }
}

/// Check that `record` may be appended to `ledger`.
///
/// Checks run in a fixed order so a record with several defects is always
/// rejected for the same reason.
pub fn admit(ledger: &Ledger, record: &AmendmentRecord, policy: &AdmissionPolicy) -> RegulaResult<()> {
    record.check_well_formed()?;
    let key = record.key();

    let branch = ledger.registry().get(record.branch)?;
    if &record.instrument != ledger.instrument() {
        return Err(RegulaError::InstrumentMismatch {
            key,
            expected: ledger.instrument().clone(),
            actual: record.instrument.clone(),
        });
    }

    if branch.last_version().is_some_and(|last| record.version <= last) {
        return Err(RegulaError::DuplicateVersion(key));
    }

    if branch.is_closed() {
        return Err(RegulaError::BranchAlreadyClosed(branch.id));
    }

    if !branch.state().accepts_records() {
        return Err(RegulaError::IngestNotPermitted {
            branch: branch.id,
            state: branch.state(),
        });
    }

    let expected = branch.next_version();
    if record.version != expected {
        return Err(RegulaError::UnexpectedVersion { key, expected });
    }

    if policy.require_monotonic_knowledge {
        if let Some(previous) = branch.records().last() {
            if record.known < previous.record.known {
                return Err(RegulaError::malformed(
                    key,
                    format!(
                        "knowledge date {} precedes {} of {}",
                        record.known,
                        previous.record.known,
                        previous.key()
                    ),
                ));
            }
        }
    }

    match record.change {
        Change::Withdraw(target) => {
            let withdrawn = branch.record(target).ok_or_else(|| {
                RegulaError::malformed(key, format!("withdrawal target {} does not exist", target))
            })?;
            if withdrawn.record.change.is_withdrawal() {
                return Err(RegulaError::malformed(
                    key,
                    format!("withdrawal target {} is itself a withdrawal", target),
                ));
            }
            if branch.is_withdrawn(target) {
                return Err(RegulaError::malformed(
                    key,
                    format!("version {} is already withdrawn", target),
                ));
            }
        }
        _ if !record.retroactive => {
            if let Some(previous) = branch.last_change() {
                if record.effective < previous.record.effective {
                    return Err(RegulaError::OrderingViolation {
                        key,
                        effective: record.effective,
                        previous: previous.record.effective,
                    });
                }
            }
        }
        _ => {}
    }

    Ok(())
}

/// Earliest legal date an admitted record can change
fn affected_from(ledger: &Ledger, record: &AmendmentRecord) -> Option<LegalDate> {
    match record.change {
        Change::Withdraw(target) => ledger
            .registry()
            .get(record.branch)
            .ok()
            .and_then(|b| b.record(target))
            .map(|r| r.record.effective),
        _ => Some(record.effective),
    }
}

/// Acceptance receipt of one record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub key: RecordKey,
    pub seq: IngestSeq,
    pub report: RecomputeReport,
}

/// Next ledger and history after a successful ingestion
#[derive(Clone, Debug)]
pub struct Ingested {
    pub ledger: Ledger,
    pub history: HorizonHistory,
    pub accepted: Accepted,
}

/// Admission followed by consolidation, all-or-nothing
#[derive(Clone, Debug, Default)]
pub struct Ingestor {
    policy: AdmissionPolicy,
    engine: ConsolidationEngine,
}

impl Ingestor {
    pub fn new(policy: AdmissionPolicy, engine: ConsolidationEngine) -> Self {
        Ingestor { policy, engine }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn engine(&self) -> &ConsolidationEngine {
        &self.engine
    }

    /// Admit `record`, append it under `seq` and rebuild every horizon its
    /// knowledge date reaches. `ledger` and `history` are left untouched.
    pub fn ingest(
        &self,
        ledger: &Ledger,
        history: &HorizonHistory,
        record: AmendmentRecord,
        seq: IngestSeq,
    ) -> RegulaResult<Ingested> {
        if let Err(e) = admit(ledger, &record, &self.policy) {
            debug!(key = %record.key(), error = %e, "record rejected");
            return Err(e);
        }

        let key = record.key();
        let known = record.known;
        let affected = affected_from(ledger, &record);

        let mut next = ledger.clone();
        next.registry_mut()
            .get_mut(record.branch)?
            .push_record(SequencedRecord::new(record, seq));

        let (history, mut report) = self.engine.recompute(&next, history, known)?;
        report.affected_from = affected;

        info!(
            %key,
            seq = seq.0,
            %known,
            rebuilt = report.horizons_rebuilt,
            affected_from = ?report.affected_from,
            "record accepted"
        );

        Ok(Ingested {
            ledger: next,
            history,
            accepted: Accepted { key, seq, report },
        })
    }
}
