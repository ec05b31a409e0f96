//! Branch lifecycle classification
//!
//! Workflow states and the activities that move a branch between them.
//! The transition table itself lives in `regula-workflow`; this module
//! only names the closed set of states and activities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Workflow state of a branch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkflowState {
    /// Branch created, starting situation not yet fixed
    #[default]
    Draft = 0x00,

    /// Starting situation determined; the branch accepts records
    StartingSituationDetermined = 0x01,

    /// Pending records published; the published version is frozen
    Published = 0x02,

    /// Published version exchanged with downstream consumers
    Exchanged = 0x03,

    /// Branch withdrawn; terminal
    Withdrawn = 0x04,
}

impl WorkflowState {
    pub fn name(self) -> &'static str {
        match self {
            WorkflowState::Draft => "Draft",
            WorkflowState::StartingSituationDetermined => "StartingSituationDetermined",
            WorkflowState::Published => "Published",
            WorkflowState::Exchanged => "Exchanged",
            WorkflowState::Withdrawn => "Withdrawn",
        }
    }

    /// Can new amendment records be ingested in this state?
    pub fn accepts_records(self) -> bool {
        matches!(
            self,
            WorkflowState::StartingSituationDetermined
                | WorkflowState::Published
                | WorkflowState::Exchanged
        )
    }

    /// Has at least one version of the branch been published?
    pub fn is_published(self) -> bool {
        matches!(self, WorkflowState::Published | WorkflowState::Exchanged)
    }

    pub fn is_terminal(self) -> bool {
        self == WorkflowState::Withdrawn
    }

    pub fn all() -> &'static [WorkflowState] {
        &[
            WorkflowState::Draft,
            WorkflowState::StartingSituationDetermined,
            WorkflowState::Published,
            WorkflowState::Exchanged,
            WorkflowState::Withdrawn,
        ]
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Authority workflow activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Activity {
    DetermineStartingSituation = 0x01,
    Publish = 0x02,
    Exchange = 0x03,
    Withdraw = 0x04,
    /// Read-only: fetch the published records
    Download = 0x05,
}

impl Activity {
    pub fn name(self) -> &'static str {
        match self {
            Activity::DetermineStartingSituation => "DetermineStartingSituation",
            Activity::Publish => "Publish",
            Activity::Exchange => "Exchange",
            Activity::Withdraw => "Withdraw",
            Activity::Download => "Download",
        }
    }

    /// Does this activity leave the workflow state untouched?
    pub fn is_read_only(self) -> bool {
        self == Activity::Download
    }

    pub fn all() -> &'static [Activity] {
        &[
            Activity::DetermineStartingSituation,
            Activity::Publish,
            Activity::Exchange,
            Activity::Withdraw,
            Activity::Download,
        ]
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
