//! Error types for Regula

use thiserror::Error;

use crate::{
    Activity, BranchId, InstrumentId, KnowledgeDate, LegalDate, LegalInterval, RecordKey,
    VersionNumber, WorkflowState,
};

/// Core Regula errors
///
/// Every variant is scoped to a single operation: a rejected ingestion,
/// an aborted recomputation or a failed query. None of them leave the
/// committed timeline partially updated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegulaError {
    // Validation errors
    #[error("Invalid date: {0:?}")]
    InvalidDate(String),

    #[error("Malformed record {key}: {reason}")]
    MalformedRecord { key: RecordKey, reason: String },

    #[error("Record {key} names instrument {actual}, but its branch belongs to {expected}")]
    InstrumentMismatch {
        key: RecordKey,
        expected: InstrumentId,
        actual: InstrumentId,
    },

    #[error("Unexpected version {key}: branch expects {expected}")]
    UnexpectedVersion { key: RecordKey, expected: VersionNumber },

    #[error(
        "Ordering violation on {key}: effective {effective} precedes {previous} and record is not retroactive"
    )]
    OrderingViolation {
        key: RecordKey,
        effective: LegalDate,
        previous: LegalDate,
    },

    #[error("Duplicate version {0}")]
    DuplicateVersion(RecordKey),

    // Workflow errors
    #[error("Invalid workflow transition on {branch}: {activity} not allowed in {state}")]
    InvalidWorkflowTransition {
        branch: BranchId,
        state: WorkflowState,
        activity: Activity,
    },

    #[error("Branch {branch} does not accept records in {state}")]
    IngestNotPermitted { branch: BranchId, state: WorkflowState },

    #[error("Branch {0} is already closed")]
    BranchAlreadyClosed(BranchId),

    // Lookup errors
    #[error("Unknown branch {0}")]
    UnknownBranch(BranchId),

    #[error("Unknown instrument {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Unknown parent version {parent}:{version}")]
    UnknownParentVersion { parent: BranchId, version: VersionNumber },

    #[error("Cyclic branch derivation through {0}")]
    CyclicDerivation(BranchId),

    // Consolidation errors
    #[error(
        "Ambiguous state for {instrument} at horizon {horizon} over {interval}: branches {branches:?} disagree without precedence"
    )]
    AmbiguousState {
        instrument: InstrumentId,
        horizon: KnowledgeDate,
        interval: LegalInterval,
        branches: Vec<BranchId>,
    },

    // Trial errors
    #[error("Trial rejected: {0}")]
    TrialRejected(String),
}

/// Error taxonomy class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed or out-of-order record, rejected at ingestion
    Validation,
    /// Illegal activity for the branch's workflow state
    Workflow,
    /// Overlapping branch coverage without precedence
    Ambiguity,
    /// Caller referenced something that does not exist
    Lookup,
}

impl RegulaError {
    /// Classify the error
    pub fn class(&self) -> ErrorClass {
        match self {
            RegulaError::InvalidDate(_)
            | RegulaError::MalformedRecord { .. }
            | RegulaError::InstrumentMismatch { .. }
            | RegulaError::UnexpectedVersion { .. }
            | RegulaError::OrderingViolation { .. }
            | RegulaError::DuplicateVersion(_)
            | RegulaError::TrialRejected(_) => ErrorClass::Validation,
            RegulaError::InvalidWorkflowTransition { .. }
            | RegulaError::IngestNotPermitted { .. }
            | RegulaError::BranchAlreadyClosed(_) => ErrorClass::Workflow,
            RegulaError::AmbiguousState { .. } => ErrorClass::Ambiguity,
            RegulaError::UnknownBranch(_)
            | RegulaError::UnknownInstrument(_)
            | RegulaError::UnknownParentVersion { .. }
            | RegulaError::CyclicDerivation(_) => ErrorClass::Lookup,
        }
    }

    /// No Regula error is fatal to the process
    pub fn is_recoverable(&self) -> bool {
        true
    }

    pub fn malformed(key: RecordKey, reason: impl Into<String>) -> Self {
        RegulaError::MalformedRecord {
            key,
            reason: reason.into(),
        }
    }
}

/// Result type for Regula operations
pub type RegulaResult<T> = Result<T, RegulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let key = RecordKey::new(BranchId::new(1), VersionNumber::new(2));

        assert_eq!(RegulaError::DuplicateVersion(key).class(), ErrorClass::Validation);
        assert_eq!(
            RegulaError::BranchAlreadyClosed(BranchId::new(1)).class(),
            ErrorClass::Workflow
        );
        assert_eq!(
            RegulaError::UnknownInstrument(InstrumentId::new("X")).class(),
            ErrorClass::Lookup
        );
    }

    #[test]
    fn test_every_error_is_recoverable() {
        let key = RecordKey::new(BranchId::new(1), VersionNumber::new(2));
        let errors = [
            RegulaError::malformed(key, "empty content"),
            RegulaError::DuplicateVersion(key),
            RegulaError::BranchAlreadyClosed(BranchId::new(1)),
            RegulaError::UnknownInstrument(InstrumentId::new("X")),
            RegulaError::CyclicDerivation(BranchId::new(1)),
        ];
        assert!(errors.iter().all(RegulaError::is_recoverable));
    }

    #[test]
    fn test_error_display() {
        let err = RegulaError::InvalidWorkflowTransition {
            branch: BranchId::new(3),
            state: WorkflowState::Draft,
            activity: Activity::Publish,
        };
        let msg = err.to_string();
        assert!(msg.contains("B3"));
        assert!(msg.contains("Publish"));
        assert!(msg.contains("Draft"));
    }
}
