//! Time-travel queries
//!
//! Two finite, restartable views over an immutable horizon history:
//! the legal axis at a fixed knowledge date, and the knowledge axis at a
//! fixed legal date.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use regula_core::{ConsolidatedState, HorizonHistory, KnowledgeDate, LegalDate, Resolution, Timeline};

/// Whole legal axis as known at `known`
pub fn legal_timeline(history: &HorizonHistory, known: KnowledgeDate) -> Resolution<Arc<Timeline>> {
    match history.at(known) {
        Some(timeline) => Resolution::Known(Arc::clone(timeline)),
        None => Resolution::NotYetKnown,
    }
}

/// One distinct answer on the knowledge axis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// First knowledge date giving this answer
    pub known_from: KnowledgeDate,
    /// First knowledge date giving a different answer, if any
    pub known_until: Option<KnowledgeDate>,
    pub state: ConsolidatedState,
}

impl KnowledgeEntry {
    pub fn covers(&self, known: KnowledgeDate) -> bool {
        known >= self.known_from && self.known_until.map_or(true, |u| known < u)
    }
}

/// How the answer for `legal` evolved as knowledge advanced.
///
/// Consecutive horizons giving the same value over the same interval
/// collapse into one entry.
pub fn knowledge_timeline(history: &HorizonHistory, legal: LegalDate) -> Vec<KnowledgeEntry> {
    let mut entries: Vec<KnowledgeEntry> = Vec::new();

    for timeline in history.timelines() {
        let Some(state) = timeline.state_at(legal) else {
            continue;
        };

        if let Some(last) = entries.last_mut() {
            if last.state.same_answer(state) {
                continue;
            }
            last.known_until = Some(timeline.horizon);
        }

        entries.push(KnowledgeEntry {
            known_from: timeline.horizon,
            known_until: None,
            state: state.clone(),
        });
    }

    entries
}
