//! Activity workflow state machine
//!
//! A closed transition table over [`WorkflowState`] x [`Activity`]:
//!
//! | From                                   | Activity                   | To                          |
//! |----------------------------------------|----------------------------|-----------------------------|
//! | Draft                                  | DetermineStartingSituation | StartingSituationDetermined |
//! | StartingSituationDetermined, Published, Exchanged | Publish (pending > 0) | Published              |
//! | Published                              | Exchange                   | Exchanged                   |
//! | Published, Exchanged                   | Download                   | unchanged                   |
//! | any but Withdrawn                      | Withdraw                   | Withdrawn                   |
//!
//! Everything else is an invalid transition and leaves the state unchanged.

use serde::{Deserialize, Serialize};

use regula_core::{Activity, VersionNumber, WorkflowState};

/// Why a transition was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refusal {
    /// The table has no entry for (state, activity)
    NoTransition,
    /// `Publish` with nothing pending
    NothingPending,
}

/// Look up the transition for `activity` in `state`.
///
/// `pending` is the number of records accepted since the last publication.
pub fn next_state(
    state: WorkflowState,
    activity: Activity,
    pending: usize,
) -> Result<WorkflowState, Refusal> {
    use Activity::*;
    use WorkflowState::*;

    match (state, activity) {
        (Draft, DetermineStartingSituation) => Ok(StartingSituationDetermined),
        (StartingSituationDetermined | Published | Exchanged, Publish) => {
            if pending == 0 {
                Err(Refusal::NothingPending)
            } else {
                Ok(Published)
            }
        }
        (Published, Exchange) => Ok(Exchanged),
        (Published | Exchanged, Download) => Ok(state),
        (Withdrawn, _) => Err(Refusal::NoTransition),
        (_, Withdraw) => Ok(Withdrawn),
        _ => Err(Refusal::NoTransition),
    }
}

/// Activities legal in `state`, ignoring the pending-record guard
pub fn legal_activities(state: WorkflowState) -> Vec<Activity> {
    Activity::all()
        .iter()
        .copied()
        .filter(|a| next_state(state, *a, 1).is_ok())
        .collect()
}

/// One entry of a branch's append-only activity log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Position in the branch log, starting at 1
    pub seq: u64,
    pub activity: Activity,
    pub from: WorkflowState,
    pub to: WorkflowState,
    /// Last version covered by the publication, for `Publish`
    pub published_through: Option<VersionNumber>,
}
