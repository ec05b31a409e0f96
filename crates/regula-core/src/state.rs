//! Consolidated state definitions
//!
//! A consolidated state ("toestand") maps one interval of the legal axis to
//! the content valid there. A `Timeline` is the full partition of the legal
//! axis under one knowledge horizon; a `HorizonHistory` keeps one timeline
//! per horizon and is never edited in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContentRef, InstrumentId, KnowledgeDate, LegalDate, LegalInterval, RecordKey};

/// What an instrument says over an interval
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateValue {
    /// Regulated by the referenced content
    Regulated(ContentRef),
    /// Explicitly not regulated
    NotRegulated,
}

impl StateValue {
    pub fn content(&self) -> Option<&ContentRef> {
        match self {
            StateValue::Regulated(c) => Some(c),
            StateValue::NotRegulated => None,
        }
    }

    #[inline]
    pub fn is_regulated(&self) -> bool {
        matches!(self, StateValue::Regulated(_))
    }
}

/// Consolidated state over one legal interval
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsolidatedState {
    /// `[from, until)` on the legal axis
    pub interval: LegalInterval,
    /// Content valid over the interval
    pub value: StateValue,
    /// Records that established this state (empty for the implicit
    /// not-regulated prefix before the first effective date)
    pub sources: Vec<RecordKey>,
    /// Computed by a trial run, never committed
    pub provisional: bool,
}

impl ConsolidatedState {
    pub fn new(interval: LegalInterval, value: StateValue, sources: Vec<RecordKey>) -> Self {
        ConsolidatedState {
            interval,
            value,
            sources,
            provisional: false,
        }
    }

    pub fn not_regulated(interval: LegalInterval) -> Self {
        ConsolidatedState::new(interval, StateValue::NotRegulated, Vec::new())
    }

    #[inline]
    pub fn content(&self) -> Option<&ContentRef> {
        self.value.content()
    }

    /// Same answer to a legal-date query: equal value over equal bounds
    pub fn same_answer(&self, other: &ConsolidatedState) -> bool {
        self.interval == other.interval && self.value == other.value
    }
}

/// Partition of the legal axis under one knowledge horizon
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Knowledge horizon this timeline is valid under
    pub horizon: KnowledgeDate,
    /// Ordered, gapless, non-overlapping states
    pub states: Vec<ConsolidatedState>,
    /// Every record visible at this horizon (for audit)
    pub records: Vec<RecordKey>,
}

impl Timeline {
    pub fn new(horizon: KnowledgeDate, states: Vec<ConsolidatedState>, records: Vec<RecordKey>) -> Self {
        Timeline {
            horizon,
            states,
            records,
        }
    }

    /// State covering a legal date
    pub fn state_at(&self, date: LegalDate) -> Option<&ConsolidatedState> {
        // States are sorted and gapless; find the last one starting at or before `date`
        let idx = self
            .states
            .partition_point(|s| s.interval.from.map_or(true, |f| f <= date));
        idx.checked_sub(1)
            .map(|i| &self.states[i])
            .filter(|s| s.interval.contains(date))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsolidatedState> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Equal legal partition, ignoring horizon and provenance
    pub fn same_partition(&self, other: &Timeline) -> bool {
        self.states.len() == other.states.len()
            && self
                .states
                .iter()
                .zip(&other.states)
                .all(|(a, b)| a.same_answer(b))
    }

    /// Legal dates at which the state changes
    pub fn boundaries(&self) -> Vec<LegalDate> {
        self.states.iter().filter_map(|s| s.interval.from).collect()
    }
}

/// Bitemporal history of one instrument: one timeline per knowledge horizon
///
/// Values are immutable; writers build a new history and publish it whole.
/// Unchanged horizons are shared between successive histories.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HorizonHistory {
    pub instrument: InstrumentId,
    horizons: BTreeMap<KnowledgeDate, Arc<Timeline>>,
    provisional: bool,
}

impl HorizonHistory {
    pub fn empty(instrument: InstrumentId) -> Self {
        HorizonHistory {
            instrument,
            horizons: BTreeMap::new(),
            provisional: false,
        }
    }

    pub fn provisional(instrument: InstrumentId) -> Self {
        HorizonHistory {
            provisional: true,
            ..HorizonHistory::empty(instrument)
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    /// Timeline of the latest horizon at or before `known`
    pub fn at(&self, known: KnowledgeDate) -> Option<&Arc<Timeline>> {
        self.horizons.range(..=known).next_back().map(|(_, t)| t)
    }

    /// Timeline stored exactly at `horizon`
    pub fn get(&self, horizon: KnowledgeDate) -> Option<&Arc<Timeline>> {
        self.horizons.get(&horizon)
    }

    pub fn latest(&self) -> Option<&Arc<Timeline>> {
        self.horizons.values().next_back()
    }

    pub fn horizons(&self) -> impl Iterator<Item = KnowledgeDate> + '_ {
        self.horizons.keys().copied()
    }

    pub fn timelines(&self) -> impl Iterator<Item = &Arc<Timeline>> {
        self.horizons.values()
    }

    pub fn len(&self) -> usize {
        self.horizons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.horizons.is_empty()
    }

    /// Copy of the horizons strictly before `horizon`, sharing their timelines
    pub fn prefix_before(&self, horizon: KnowledgeDate) -> HorizonHistory {
        HorizonHistory {
            instrument: self.instrument.clone(),
            horizons: self
                .horizons
                .range(..horizon)
                .map(|(k, t)| (*k, Arc::clone(t)))
                .collect(),
            provisional: self.provisional,
        }
    }

    /// Append a timeline. Returns `false` if it was not stored because it
    /// repeats the previous horizon's partition and `collapse` is set.
    pub fn push(&mut self, timeline: Timeline, collapse: bool) -> bool {
        if collapse {
            if let Some(prev) = self.at(timeline.horizon) {
                if prev.same_partition(&timeline) {
                    return false;
                }
            }
        }
        self.horizons.insert(timeline.horizon, Arc::new(timeline));
        true
    }
}

/// Answer of a bitemporal query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution<T> {
    /// Nothing about the instrument was known at the requested knowledge date
    NotYetKnown,
    Known(T),
}

impl<T> Resolution<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, Resolution::Known(_))
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Resolution::Known(t) => Some(t),
            Resolution::NotYetKnown => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            Resolution::Known(t) => Some(t),
            Resolution::NotYetKnown => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Resolution::Known(t) => Resolution::Known(f(t)),
            Resolution::NotYetKnown => Resolution::NotYetKnown,
        }
    }
}
