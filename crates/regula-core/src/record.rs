//! Amendment record definitions
//!
//! An amendment record is an announced change to a regulation instrument.
//! It carries its identity (branch + version), the legal date it takes
//! effect, the knowledge date it became known and the change itself.
//! Records are immutable once accepted: they are only superseded by later
//! records or withdrawn by a withdrawal record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    BranchId, ContentRef, IngestSeq, InstrumentId, KnowledgeDate, LegalDate, RecordKey,
    RegulaError, RegulaResult, VersionNumber,
};

/// The change an amendment record announces
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Change {
    /// From the effective date, the instrument reads as the referenced content
    Content(ContentRef),
    /// From the effective date, the instrument no longer regulates anything
    NotRegulated,
    /// Invalidate an earlier version of the same branch
    Withdraw(VersionNumber),
}

impl Change {
    pub fn content(content: impl Into<String>) -> Self {
        Change::Content(ContentRef::new(content))
    }

    #[inline]
    pub fn is_withdrawal(&self) -> bool {
        matches!(self, Change::Withdraw(_))
    }

    /// Version withdrawn by this change, if any
    pub fn withdrawn_version(&self) -> Option<VersionNumber> {
        match self {
            Change::Withdraw(v) => Some(*v),
            _ => None,
        }
    }
}

/// Amendment record ("momentopname") - the fundamental immutable fact
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmendmentRecord {
    /// Instrument the record amends
    pub instrument: InstrumentId,
    /// Branch the record belongs to
    pub branch: BranchId,
    /// Branch-local version number
    pub version: VersionNumber,
    /// Date from which the change is legally valid
    pub effective: LegalDate,
    /// Date the change became known
    pub known: KnowledgeDate,
    /// Announced change
    pub change: Change,
    /// Effective date may precede the branch's previous effective date
    pub retroactive: bool,
}

impl AmendmentRecord {
    pub fn new(
        instrument: InstrumentId,
        key: RecordKey,
        effective: LegalDate,
        known: KnowledgeDate,
        change: Change,
    ) -> Self {
        AmendmentRecord {
            instrument,
            branch: key.branch,
            version: key.version,
            effective,
            known,
            change,
            retroactive: false,
        }
    }

    /// Mark the record as a retroactive correction
    pub fn retroactive(mut self) -> Self {
        self.retroactive = true;
        self
    }

    #[inline]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.branch, self.version)
    }

    /// Check the record is well-formed on its own, without any branch context
    pub fn check_well_formed(&self) -> RegulaResult<()> {
        let key = self.key();

        if self.version.get() == 0 {
            return Err(RegulaError::malformed(key, "version numbers start at 1"));
        }

        if self.instrument.as_str().trim().is_empty() {
            return Err(RegulaError::malformed(key, "empty instrument identifier"));
        }

        match &self.change {
            Change::Content(content) if content.is_empty() => {
                Err(RegulaError::malformed(key, "empty content reference"))
            }
            Change::Withdraw(target) if *target >= self.version => Err(RegulaError::malformed(
                key,
                format!("withdrawal must target an earlier version, not {}", target),
            )),
            _ => Ok(()),
        }
    }
}

/// An accepted record together with its global ingestion sequence number
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencedRecord {
    pub record: Arc<AmendmentRecord>,
    pub seq: IngestSeq,
}

impl SequencedRecord {
    pub fn new(record: AmendmentRecord, seq: IngestSeq) -> Self {
        SequencedRecord {
            record: Arc::new(record),
            seq,
        }
    }

    #[inline]
    pub fn key(&self) -> RecordKey {
        self.record.key()
    }

    /// Deterministic processing order: knowledge date, then ingestion sequence
    #[inline]
    pub fn order_key(&self) -> (KnowledgeDate, IngestSeq) {
        (self.record.known, self.seq)
    }
}
