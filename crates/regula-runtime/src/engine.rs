//! Regula Engine - thread-safe facade over all instruments
//!
//! Each instrument lives in a slot holding its current snapshot (ledger +
//! horizon history) behind an `Arc`. Writers for one instrument take that
//! slot's writer section, build the next snapshot off to the side and swap
//! it in whole; readers and trials only clone the `Arc`, so they never wait
//! on a recomputation and never see a half-built timeline. Different
//! instruments never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use regula_core::{
    Activity, AmendmentRecord, BranchId, ConsolidatedState, HorizonHistory, IngestSeq,
    InstrumentId, KnowledgeDate, LegalDate, RegulaError, RegulaResult, Resolution, Timeline,
    VersionNumber, WorkflowState,
};
use regula_state::{Accepted, BranchPriority, ConsolidationEngine, Ingestor, Ledger};
use regula_time::{Bitemporal, KnowledgeEntry};
use regula_workflow::{ActivityEntry, BranchOrigin};

use crate::stats::StatsCounters;
use crate::{run_trial, EngineConfig, RuntimeStats, TrialResult};

/// Committed state of one instrument at one moment
#[derive(Clone, Debug)]
pub struct InstrumentSnapshot {
    pub ledger: Ledger,
    pub history: Arc<HorizonHistory>,
}

impl Bitemporal for InstrumentSnapshot {
    fn history(&self) -> &HorizonHistory {
        &self.history
    }
}

struct InstrumentSlot {
    /// Serializes writers of this instrument
    writer: Mutex<()>,
    current: RwLock<Arc<InstrumentSnapshot>>,
}

impl InstrumentSlot {
    fn new(instrument: InstrumentId) -> Self {
        InstrumentSlot {
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(InstrumentSnapshot {
                ledger: Ledger::new(instrument.clone()),
                history: Arc::new(HorizonHistory::empty(instrument)),
            })),
        }
    }

    fn snapshot(&self) -> Arc<InstrumentSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Run `f` inside the writer section and publish its snapshot on success
    fn write<T>(
        &self,
        f: impl FnOnce(&InstrumentSnapshot) -> RegulaResult<(InstrumentSnapshot, T)>,
    ) -> RegulaResult<T> {
        let _guard = self.writer.lock();
        let current = self.snapshot();
        let (next, out) = f(&current)?;
        *self.current.write() = Arc::new(next);
        Ok(out)
    }
}

/// Summary of one branch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub id: BranchId,
    pub instrument: InstrumentId,
    pub name: String,
    pub origin: BranchOrigin,
    pub state: WorkflowState,
    pub closed: bool,
    pub last_version: Option<VersionNumber>,
    pub pending: usize,
}

/// Consolidation engine for any number of instruments
pub struct Engine {
    config: EngineConfig,
    ingestor: Ingestor,
    instruments: RwLock<HashMap<InstrumentId, Arc<InstrumentSlot>>>,
    /// Branch id -> owning instrument
    branches: RwLock<HashMap<BranchId, InstrumentId>>,
    next_branch: AtomicU64,
    next_seq: AtomicU64,
    stats: StatsCounters,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let ingestor = Ingestor::new(
            config.admission_policy(),
            ConsolidationEngine::with_config(config.consolidation_config()),
        );
        Engine {
            config,
            ingestor,
            instruments: RwLock::new(HashMap::new()),
            branches: RwLock::new(HashMap::new()),
            next_branch: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            stats: StatsCounters::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn slot(&self, instrument: &InstrumentId) -> RegulaResult<Arc<InstrumentSlot>> {
        self.instruments
            .read()
            .get(instrument)
            .cloned()
            .ok_or_else(|| RegulaError::UnknownInstrument(instrument.clone()))
    }

    fn branch_slot(&self, branch: BranchId) -> RegulaResult<Arc<InstrumentSlot>> {
        let instrument = self
            .branches
            .read()
            .get(&branch)
            .cloned()
            .ok_or(RegulaError::UnknownBranch(branch))?;
        self.slot(&instrument)
    }

    // === Branch registry ===

    /// Register a branch. A derived branch must name a parent of the same
    /// instrument and an existing, non-withdrawn base version.
    pub fn create_branch(
        &self,
        instrument: &InstrumentId,
        name: impl Into<String>,
        origin: BranchOrigin,
    ) -> RegulaResult<BranchId> {
        let name = name.into();

        let existing = self.instruments.read().get(instrument).cloned();
        let id = match existing {
            Some(slot) => self.register_branch(&slot, name, origin)?,
            None => {
                // a new instrument becomes visible only with its first branch
                let mut instruments = self.instruments.write();
                match instruments.get(instrument).cloned() {
                    Some(slot) => {
                        drop(instruments);
                        self.register_branch(&slot, name, origin)?
                    }
                    None => {
                        let slot = Arc::new(InstrumentSlot::new(instrument.clone()));
                        let id = self.register_branch(&slot, name, origin)?;
                        instruments.insert(instrument.clone(), slot);
                        id
                    }
                }
            }
        };

        self.branches.write().insert(id, instrument.clone());
        StatsCounters::bump(&self.stats.branches_created);
        info!(branch = %id, %instrument, ?origin, "branch created");
        Ok(id)
    }

    fn register_branch(
        &self,
        slot: &InstrumentSlot,
        name: String,
        origin: BranchOrigin,
    ) -> RegulaResult<BranchId> {
        slot.write(|current| {
            let id = BranchId::new(self.next_branch.fetch_add(1, Ordering::SeqCst) + 1);
            let mut ledger = current.ledger.clone();
            ledger.registry_mut().create(id, name, origin)?;
            let next = InstrumentSnapshot {
                ledger,
                history: Arc::clone(&current.history),
            };
            Ok((next, id))
        })
    }

    pub fn close_branch(&self, branch: BranchId) -> RegulaResult<()> {
        self.branch_slot(branch)?.write(|current| {
            let mut ledger = current.ledger.clone();
            ledger.registry_mut().close(branch)?;
            Ok((
                InstrumentSnapshot {
                    ledger,
                    history: Arc::clone(&current.history),
                },
                (),
            ))
        })?;
        info!(%branch, "branch closed");
        Ok(())
    }

    pub fn list_branches(&self, instrument: &InstrumentId) -> RegulaResult<Vec<BranchInfo>> {
        let snapshot = self.slot(instrument)?.snapshot();
        Ok(snapshot
            .ledger
            .registry()
            .iter()
            .map(|b| BranchInfo {
                id: b.id,
                instrument: b.instrument.clone(),
                name: b.name.clone(),
                origin: b.origin,
                state: b.state(),
                closed: b.is_closed(),
                last_version: b.last_version(),
                pending: b.pending().len(),
            })
            .collect())
    }

    /// Derivation chain: the branch itself, then each ancestor with its base
    pub fn ancestry(&self, branch: BranchId) -> RegulaResult<Vec<(BranchId, Option<VersionNumber>)>> {
        self.branch_slot(branch)?.snapshot().ledger.registry().ancestry(branch)
    }

    // === Workflow ===

    pub fn transition(&self, branch: BranchId, activity: Activity) -> RegulaResult<ActivityEntry> {
        let entry = self.branch_slot(branch)?.write(|current| {
            let mut ledger = current.ledger.clone();
            let entry = ledger.registry_mut().get_mut(branch)?.apply(activity)?;
            Ok((
                InstrumentSnapshot {
                    ledger,
                    history: Arc::clone(&current.history),
                },
                entry,
            ))
        })?;

        StatsCounters::bump(&self.stats.transitions);
        info!(%branch, %activity, from = %entry.from, to = %entry.to, "workflow transition");
        Ok(entry)
    }

    /// The `Download` activity: log it and hand out the published records
    pub fn download(&self, branch: BranchId) -> RegulaResult<Vec<Arc<AmendmentRecord>>> {
        self.branch_slot(branch)?.write(|current| {
            let mut ledger = current.ledger.clone();
            let b = ledger.registry_mut().get_mut(branch)?;
            b.apply(Activity::Download)?;
            let published = b.published().iter().map(|r| Arc::clone(&r.record)).collect();
            Ok((
                InstrumentSnapshot {
                    ledger,
                    history: Arc::clone(&current.history),
                },
                published,
            ))
        })
    }

    pub fn workflow_state(&self, branch: BranchId) -> RegulaResult<WorkflowState> {
        let snapshot = self.branch_slot(branch)?.snapshot();
        Ok(snapshot.ledger.registry().get(branch)?.state())
    }

    pub fn activity_log(&self, branch: BranchId) -> RegulaResult<Vec<ActivityEntry>> {
        let snapshot = self.branch_slot(branch)?.snapshot();
        Ok(snapshot.ledger.registry().get(branch)?.activity_log().to_vec())
    }

    // === Ingestion ===

    /// Accept one amendment record and publish the recomputed timeline.
    ///
    /// On any error, including an ambiguous recomputation, nothing changes.
    pub fn ingest(&self, record: AmendmentRecord) -> RegulaResult<Accepted> {
        let slot = match self.branch_slot(record.branch) {
            Ok(slot) => slot,
            Err(e) => {
                StatsCounters::bump(&self.stats.records_rejected);
                return Err(e);
            }
        };

        let result = slot.write(|current| {
            let seq = IngestSeq(self.next_seq.fetch_add(1, Ordering::SeqCst) + 1);
            let ingested = self
                .ingestor
                .ingest(&current.ledger, &current.history, record, seq)?;
            Ok((
                InstrumentSnapshot {
                    ledger: ingested.ledger,
                    history: Arc::new(ingested.history),
                },
                ingested.accepted,
            ))
        });

        match &result {
            Ok(accepted) => {
                StatsCounters::bump(&self.stats.records_accepted);
                StatsCounters::bump(&self.stats.recomputations);
                StatsCounters::add(
                    &self.stats.horizons_rebuilt,
                    accepted.report.horizons_rebuilt as u64,
                );
            }
            Err(e @ RegulaError::AmbiguousState { .. }) => {
                StatsCounters::bump(&self.stats.records_rejected);
                StatsCounters::bump(&self.stats.ambiguity_aborts);
                warn!(error = %e, "recomputation aborted");
            }
            Err(e) => {
                StatsCounters::bump(&self.stats.records_rejected);
                debug!(error = %e, "ingestion rejected");
            }
        }
        result
    }

    /// Set or clear the branch precedence of an instrument.
    ///
    /// Publishes nothing by itself. The next ingestion rebuilds every
    /// horizon at or after its knowledge date under this precedence,
    /// stored ones included.
    pub fn set_branch_priority(
        &self,
        instrument: &InstrumentId,
        order: Option<Vec<BranchId>>,
    ) -> RegulaResult<()> {
        self.slot(instrument)?.write(|current| {
            let mut ledger = current.ledger.clone();
            if let Some(order) = &order {
                for branch in order {
                    ledger.registry().get(*branch)?;
                }
            }
            ledger.set_priority(order.clone().map(BranchPriority::new));
            Ok((
                InstrumentSnapshot {
                    ledger,
                    history: Arc::clone(&current.history),
                },
                (),
            ))
        })?;
        info!(%instrument, ?order, "branch priority set");
        Ok(())
    }

    // === Queries ===

    pub fn snapshot(&self, instrument: &InstrumentId) -> RegulaResult<Arc<InstrumentSnapshot>> {
        Ok(self.slot(instrument)?.snapshot())
    }

    pub fn resolve(
        &self,
        instrument: &InstrumentId,
        legal: LegalDate,
        known: KnowledgeDate,
    ) -> RegulaResult<Resolution<ConsolidatedState>> {
        Ok(self.snapshot(instrument)?.resolve(legal, known))
    }

    pub fn legal_timeline(
        &self,
        instrument: &InstrumentId,
        known: KnowledgeDate,
    ) -> RegulaResult<Resolution<Arc<Timeline>>> {
        Ok(self.snapshot(instrument)?.legal_timeline(known))
    }

    pub fn knowledge_timeline(
        &self,
        instrument: &InstrumentId,
        legal: LegalDate,
    ) -> RegulaResult<Vec<KnowledgeEntry>> {
        Ok(self.snapshot(instrument)?.knowledge_timeline(legal))
    }

    /// Consolidate committed records plus `drafts` without publishing
    pub fn run_trial(
        &self,
        instrument: &InstrumentId,
        drafts: Vec<AmendmentRecord>,
    ) -> RegulaResult<TrialResult> {
        let snapshot = self.snapshot(instrument)?;
        let first_seq = IngestSeq(self.next_seq.load(Ordering::SeqCst) + 1);
        StatsCounters::bump(&self.stats.trials);
        run_trial(
            &self.ingestor,
            &snapshot.ledger,
            drafts,
            first_seq,
            self.config.max_trial_drafts,
        )
    }

    pub fn horizons(&self, instrument: &InstrumentId) -> RegulaResult<Vec<KnowledgeDate>> {
        Ok(self.snapshot(instrument)?.history.horizons().collect())
    }

    pub fn instruments(&self) -> Vec<InstrumentId> {
        let mut out: Vec<_> = self.instruments.read().keys().cloned().collect();
        out.sort();
        out
    }

    pub fn records(&self, branch: BranchId) -> RegulaResult<Vec<Arc<AmendmentRecord>>> {
        let snapshot = self.branch_slot(branch)?.snapshot();
        Ok(snapshot
            .ledger
            .registry()
            .get(branch)?
            .records()
            .iter()
            .map(|r| Arc::clone(&r.record))
            .collect())
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.snapshot()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
