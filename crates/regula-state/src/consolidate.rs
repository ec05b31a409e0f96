//! Consolidation engine
//!
//! Computes the consolidated timeline of an instrument for every knowledge
//! horizon. The timeline at horizon `K` is a pure function of the records
//! known by `K`:
//!
//! 1. Per branch, take its lineage records (own + inherited up to each base
//!    version) known by `K`, drop withdrawals and the versions they withdraw.
//!    A branch with no surviving change of its own only mirrors its parent
//!    and takes no part.
//! 2. Process them by (knowledge date, ingestion sequence); each record
//!    installs its change at its effective date, replacing any change
//!    processed earlier at the same date. A change holds until the next
//!    later effective date of that branch.
//! 3. Cut the legal axis at every branch boundary. For each piece, branches
//!    that agree need no arbitration; branches that disagree are settled by
//!    the instrument's branch priority, or the horizon is ambiguous.
//! 4. Before the first boundary the instrument is explicitly not regulated.
//!
//! Rebuilding from horizon `K0` keeps every stored horizon before `K0`
//! untouched and shares it with the new history.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::iter;

use serde::{Deserialize, Serialize};
use tracing::debug;

use regula_core::invariants::InvariantCompliant;
use regula_core::{
    BranchId, Change, ConsolidatedState, HorizonHistory, InstrumentId, KnowledgeDate, LegalDate,
    LegalInterval, RecordKey, RegulaError, RegulaResult, SequencedRecord, StateValue, Timeline,
};

use crate::Ledger;

/// Consolidation engine configuration
#[derive(Clone, Debug)]
pub struct ConsolidationConfig {
    /// Skip storing a horizon whose partition repeats its predecessor's
    pub collapse_unchanged_horizons: bool,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        ConsolidationConfig {
            collapse_unchanged_horizons: true,
        }
    }
}

/// Outcome of one recomputation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub instrument: InstrumentId,
    /// Earliest horizon that was rebuilt
    pub rebuilt_from: KnowledgeDate,
    /// Horizons computed
    pub horizons_rebuilt: usize,
    /// Horizons in the resulting history
    pub horizons_stored: usize,
    /// Earliest legal date the triggering change can affect
    pub affected_from: Option<LegalDate>,
}

/// One branch at one horizon: effective date -> (value, source record)
type BranchLine = BTreeMap<LegalDate, (StateValue, RecordKey)>;

/// Consolidation engine
#[derive(Clone, Debug, Default)]
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new() -> Self {
        Self::with_config(ConsolidationConfig::default())
    }

    pub fn with_config(config: ConsolidationConfig) -> Self {
        ConsolidationEngine { config }
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Rebuild every horizon at or after `from` on top of `previous`.
    ///
    /// The returned history shares all horizons before `from` with
    /// `previous`. On error nothing is returned and `previous` stays valid.
    pub fn recompute(
        &self,
        ledger: &Ledger,
        previous: &HorizonHistory,
        from: KnowledgeDate,
    ) -> RegulaResult<(HorizonHistory, RecomputeReport)> {
        let mut history = previous.prefix_before(from);
        let mut rebuilt = 0;

        for horizon in ledger.knowledge_dates().into_iter().filter(|k| *k >= from) {
            let mut timeline = self.timeline_at(ledger, horizon)?;
            if history.is_provisional() {
                timeline.states.iter_mut().for_each(|s| s.provisional = true);
            }
            debug_assert!(timeline.verify_invariants().is_ok());

            rebuilt += 1;
            history.push(timeline, self.config.collapse_unchanged_horizons);
        }

        debug!(
            instrument = %ledger.instrument(),
            %from,
            rebuilt,
            stored = history.len(),
            provisional = history.is_provisional(),
            "horizons recomputed"
        );

        let report = RecomputeReport {
            instrument: ledger.instrument().clone(),
            rebuilt_from: from,
            horizons_rebuilt: rebuilt,
            horizons_stored: history.len(),
            affected_from: None,
        };
        Ok((history, report))
    }

    /// Consolidated timeline of the ledger as known at `horizon`
    pub fn timeline_at(&self, ledger: &Ledger, horizon: KnowledgeDate) -> RegulaResult<Timeline> {
        let registry = ledger.registry();
        let withdrawn = withdrawn_by(ledger, horizon);

        let mut lines: Vec<(BranchId, BranchLine)> = Vec::new();
        for branch in registry.iter() {
            let lineage = registry.lineage_records(branch.id)?;
            if let Some(line) = branch_line(branch.id, lineage, &withdrawn, horizon) {
                lines.push((branch.id, line));
            }
        }

        let states = merge_lines(ledger, horizon, &lines)?;

        let mut records: Vec<RecordKey> = ledger
            .records()
            .filter(|r| r.record.known <= horizon)
            .map(|r| r.key())
            .collect();
        records.sort_unstable();

        Ok(Timeline::new(horizon, states, records))
    }
}

/// Keys withdrawn by any branch of the ledger as of `horizon`.
///
/// Collected ledger-wide: a derived branch inherits its parent's records up
/// to the base version but not the parent's later withdrawals of them.
fn withdrawn_by(ledger: &Ledger, horizon: KnowledgeDate) -> HashSet<RecordKey> {
    ledger
        .records()
        .filter(|r| r.record.known <= horizon)
        .filter_map(|r| {
            r.record
                .change
                .withdrawn_version()
                .map(|v| RecordKey::new(r.record.branch, v))
        })
        .collect()
}

/// Per-branch view at `horizon`, `None` while the branch has no surviving
/// change of its own
fn branch_line(
    branch: BranchId,
    lineage: Vec<&SequencedRecord>,
    withdrawn: &HashSet<RecordKey>,
    horizon: KnowledgeDate,
) -> Option<BranchLine> {
    let visible: Vec<&SequencedRecord> = lineage
        .into_iter()
        .filter(|r| r.record.known <= horizon)
        .collect();

    let mut changes: Vec<&SequencedRecord> = visible
        .into_iter()
        .filter(|r| !r.record.change.is_withdrawal() && !withdrawn.contains(&r.key()))
        .collect();
    if !changes.iter().any(|r| r.record.branch == branch) {
        return None;
    }
    changes.sort_by_key(|r| r.order_key());

    let mut line = BranchLine::new();
    for r in changes {
        let value = match &r.record.change {
            Change::Content(content) => StateValue::Regulated(content.clone()),
            Change::NotRegulated => StateValue::NotRegulated,
            Change::Withdraw(_) => continue,
        };
        line.insert(r.record.effective, (value, r.key()));
    }
    Some(line)
}

/// Cut the legal axis at every boundary and settle each piece
fn merge_lines(
    ledger: &Ledger,
    horizon: KnowledgeDate,
    lines: &[(BranchId, BranchLine)],
) -> RegulaResult<Vec<ConsolidatedState>> {
    let boundaries: BTreeSet<LegalDate> = lines
        .iter()
        .flat_map(|(_, line)| line.keys().copied())
        .collect();
    let starts: Vec<Option<LegalDate>> = iter::once(None)
        .chain(boundaries.into_iter().map(Some))
        .collect();

    let mut states: Vec<ConsolidatedState> = Vec::with_capacity(starts.len());
    for (i, start) in starts.iter().enumerate() {
        let until = starts.get(i + 1).copied().flatten();
        let interval = LegalInterval::new(*start, until);
        let (value, sources) = settle(ledger, horizon, interval, lines)?;

        if let Some(last) = states.last_mut() {
            if last.value == value && last.sources == sources {
                last.interval.until = until;
                continue;
            }
        }
        states.push(ConsolidatedState::new(interval, value, sources));
    }

    Ok(states)
}

/// Value and provenance of one elementary interval
fn settle(
    ledger: &Ledger,
    horizon: KnowledgeDate,
    interval: LegalInterval,
    lines: &[(BranchId, BranchLine)],
) -> RegulaResult<(StateValue, Vec<RecordKey>)> {
    let Some(start) = interval.from else {
        return Ok((StateValue::NotRegulated, Vec::new()));
    };

    let candidates: Vec<(BranchId, &StateValue, RecordKey)> = lines
        .iter()
        .filter_map(|(branch, line)| {
            line.range(..=start)
                .next_back()
                .map(|(_, (value, key))| (*branch, value, *key))
        })
        .collect();

    let Some(&(_, first, _)) = candidates.first() else {
        return Ok((StateValue::NotRegulated, Vec::new()));
    };

    let value = if candidates.iter().all(|(_, v, _)| *v == first) {
        first.clone()
    } else {
        let branches: Vec<BranchId> = candidates.iter().map(|(b, _, _)| *b).collect();
        let chosen = ledger
            .priority()
            .and_then(|p| p.pick(&branches))
            .and_then(|winner| candidates.iter().find(|(b, _, _)| *b == winner));

        match chosen {
            Some((_, v, _)) => (*v).clone(),
            None => {
                return Err(RegulaError::AmbiguousState {
                    instrument: ledger.instrument().clone(),
                    horizon,
                    interval,
                    branches,
                })
            }
        }
    };

    let mut sources: Vec<RecordKey> = candidates
        .iter()
        .filter(|(_, v, _)| **v == value)
        .map(|(_, _, k)| *k)
        .collect();
    sources.sort_unstable();
    sources.dedup();

    Ok((value, sources))
}
