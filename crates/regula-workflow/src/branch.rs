//! Branch registry
//!
//! Branches are parallel lines of amendment development for one instrument.
//! A branch may derive from a version of another branch; derivations are
//! stored as flat `(parent, base_version)` keys, never as references, so the
//! derivation graph is a DAG that can be walked and checked for cycles.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use regula_core::{
    Activity, BranchId, InstrumentId, KnowledgeDate, RegulaError, RegulaResult, SequencedRecord,
    VersionNumber, WorkflowState,
};

use crate::workflow::{next_state, ActivityEntry};

/// Where a branch starts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchOrigin {
    /// Starts from nothing
    Root,
    /// Starts from `base` of `parent`
    Derived {
        parent: BranchId,
        base: VersionNumber,
    },
}

/// A line of amendment development
#[derive(Clone, Debug)]
pub struct Branch {
    pub id: BranchId,
    pub instrument: InstrumentId,
    pub name: String,
    pub origin: BranchOrigin,
    state: WorkflowState,
    closed: bool,
    /// Accepted records; index `i` holds version `i + 1`
    records: Vec<SequencedRecord>,
    /// Last version covered by a publication
    published_through: VersionNumber,
    log: Vec<ActivityEntry>,
}

impl Branch {
    pub fn new(id: BranchId, instrument: InstrumentId, name: impl Into<String>, origin: BranchOrigin) -> Self {
        Branch {
            id,
            instrument,
            name: name.into(),
            origin,
            state: WorkflowState::Draft,
            closed: false,
            records: Vec::new(),
            published_through: VersionNumber::default(),
            log: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Next version number the branch expects
    pub fn next_version(&self) -> VersionNumber {
        VersionNumber::new(self.records.len() as u32 + 1)
    }

    pub fn last_version(&self) -> Option<VersionNumber> {
        self.records.last().map(|r| r.record.version)
    }

    pub fn records(&self) -> &[SequencedRecord] {
        &self.records
    }

    pub fn record(&self, version: VersionNumber) -> Option<&SequencedRecord> {
        let idx = (version.get() as usize).checked_sub(1)?;
        self.records.get(idx)
    }

    /// Last accepted record that is not a withdrawal
    pub fn last_change(&self) -> Option<&SequencedRecord> {
        self.records.iter().rev().find(|r| !r.record.change.is_withdrawal())
    }

    /// Knowledge date at which `version` was withdrawn, if it was
    pub fn withdrawn_at(&self, version: VersionNumber) -> Option<KnowledgeDate> {
        self.records
            .iter()
            .filter(|r| r.record.change.withdrawn_version() == Some(version))
            .map(|r| r.record.known)
            .min()
    }

    pub fn is_withdrawn(&self, version: VersionNumber) -> bool {
        self.withdrawn_at(version).is_some()
    }

    /// Records accepted since the last publication
    pub fn pending(&self) -> &[SequencedRecord] {
        let published = self.published_through.get() as usize;
        &self.records[published.min(self.records.len())..]
    }

    /// Records covered by a publication
    pub fn published(&self) -> &[SequencedRecord] {
        let published = self.published_through.get() as usize;
        &self.records[..published.min(self.records.len())]
    }

    pub fn activity_log(&self) -> &[ActivityEntry] {
        &self.log
    }

    /// Append an accepted record. The caller has validated it.
    pub fn push_record(&mut self, record: SequencedRecord) {
        debug_assert_eq!(record.record.version, self.next_version());
        self.records.push(record);
    }

    /// Apply a workflow activity. On error nothing changes.
    pub fn apply(&mut self, activity: Activity) -> RegulaResult<ActivityEntry> {
        if self.closed {
            return Err(RegulaError::BranchAlreadyClosed(self.id));
        }

        let from = self.state;
        let to = next_state(from, activity, self.pending().len()).map_err(|refusal| {
            debug!(branch = %self.id, %activity, state = %from, ?refusal, "workflow transition refused");
            RegulaError::InvalidWorkflowTransition {
                branch: self.id,
                state: from,
                activity,
            }
        })?;

        let published_through = if activity == Activity::Publish {
            let last = self.last_version().unwrap_or_default();
            self.published_through = last;
            Some(last)
        } else {
            None
        };

        self.state = to;
        let entry = ActivityEntry {
            seq: self.log.len() as u64 + 1,
            activity,
            from,
            to,
            published_through,
        };
        self.log.push(entry.clone());
        Ok(entry)
    }

    fn close(&mut self) -> RegulaResult<()> {
        if self.closed {
            return Err(RegulaError::BranchAlreadyClosed(self.id));
        }
        self.closed = true;
        Ok(())
    }
}

/// All branches of one instrument
#[derive(Clone, Debug)]
pub struct BranchRegistry {
    instrument: InstrumentId,
    branches: BTreeMap<BranchId, Branch>,
}

impl BranchRegistry {
    pub fn new(instrument: InstrumentId) -> Self {
        BranchRegistry {
            instrument,
            branches: BTreeMap::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Register a branch under an id the caller allocated
    pub fn create(&mut self, id: BranchId, name: impl Into<String>, origin: BranchOrigin) -> RegulaResult<&Branch> {
        if let BranchOrigin::Derived { parent, base } = origin {
            let parent_branch = self.get(parent)?;
            let base_record = parent_branch
                .record(base)
                .ok_or(RegulaError::UnknownParentVersion { parent, version: base })?;
            if base_record.record.change.is_withdrawal() || parent_branch.is_withdrawn(base) {
                return Err(RegulaError::UnknownParentVersion { parent, version: base });
            }
        }

        let branch = Branch::new(id, self.instrument.clone(), name, origin);
        debug!(branch = %id, instrument = %self.instrument, ?origin, "branch registered");
        Ok(self.branches.entry(id).or_insert(branch))
    }

    pub fn close(&mut self, id: BranchId) -> RegulaResult<()> {
        self.get_mut(id)?.close()
    }

    pub fn get(&self, id: BranchId) -> RegulaResult<&Branch> {
        self.branches.get(&id).ok_or(RegulaError::UnknownBranch(id))
    }

    pub fn get_mut(&mut self, id: BranchId) -> RegulaResult<&mut Branch> {
        self.branches.get_mut(&id).ok_or(RegulaError::UnknownBranch(id))
    }

    pub fn contains(&self, id: BranchId) -> bool {
        self.branches.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Derivation chain of a branch: itself first, then each ancestor with
    /// the base version it was derived from.
    pub fn ancestry(&self, id: BranchId) -> RegulaResult<Vec<(BranchId, Option<VersionNumber>)>> {
        let mut chain = vec![(id, None)];
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id)?;

        while let BranchOrigin::Derived { parent, base } = current.origin {
            if !seen.insert(parent) {
                return Err(RegulaError::CyclicDerivation(parent));
            }
            chain.push((parent, Some(base)));
            current = self.get(parent)?;
        }

        Ok(chain)
    }

    /// Records a branch consolidates: its own plus those inherited from its
    /// ancestors up to each base version.
    pub fn lineage_records(&self, id: BranchId) -> RegulaResult<Vec<&SequencedRecord>> {
        let mut out = Vec::new();

        for (branch_id, base) in self.ancestry(id)? {
            let branch = self.get(branch_id)?;
            out.extend(
                branch
                    .records()
                    .iter()
                    .filter(|r| base.map_or(true, |b| r.record.version <= b)),
            );
        }

        Ok(out)
    }
}
