//! Bitemporal state resolver
//!
//! `resolve(legal, known)` picks the timeline of the latest horizon at or
//! before `known`, then the state covering `legal`. Before the first
//! horizon nothing was known and the answer is `NotYetKnown`.

use std::sync::Arc;

use tracing::trace;

use regula_core::{
    ConsolidatedState, HorizonHistory, KnowledgeDate, LegalDate, LegalInterval, Resolution,
    Timeline,
};

use crate::{knowledge_timeline, legal_timeline, KnowledgeEntry};

/// Resolve one (legal date, knowledge date) pair against `history`
pub fn resolve(
    history: &HorizonHistory,
    legal: LegalDate,
    known: KnowledgeDate,
) -> Resolution<ConsolidatedState> {
    let Some(timeline) = history.at(known) else {
        trace!(instrument = %history.instrument, %legal, %known, "not yet known");
        return Resolution::NotYetKnown;
    };

    // Stored timelines cover the whole legal axis
    let state = timeline
        .state_at(legal)
        .cloned()
        .unwrap_or_else(|| ConsolidatedState::not_regulated(LegalInterval::ALL));

    trace!(
        instrument = %history.instrument,
        %legal,
        %known,
        horizon = %timeline.horizon,
        interval = %state.interval,
        "resolved"
    );
    Resolution::Known(state)
}

/// Query surface over anything holding a horizon history
pub trait Bitemporal {
    fn history(&self) -> &HorizonHistory;

    fn resolve(&self, legal: LegalDate, known: KnowledgeDate) -> Resolution<ConsolidatedState> {
        resolve(self.history(), legal, known)
    }

    fn legal_timeline(&self, known: KnowledgeDate) -> Resolution<Arc<Timeline>> {
        legal_timeline(self.history(), known)
    }

    fn knowledge_timeline(&self, legal: LegalDate) -> Vec<KnowledgeEntry> {
        knowledge_timeline(self.history(), legal)
    }
}

impl Bitemporal for HorizonHistory {
    fn history(&self) -> &HorizonHistory {
        self
    }
}

impl Bitemporal for Arc<HorizonHistory> {
    fn history(&self) -> &HorizonHistory {
        self
    }
}
