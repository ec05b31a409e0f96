//! Regula timeline invariants
//!
//! These are laws every stored timeline obeys. The consolidation engine
//! establishes them; tests and debug builds check them.
//!
//! 1. **Partition** - states are ordered, pairwise non-overlapping and gapless
//! 2. **Full Coverage** - the first state starts at the unbounded past and the
//!    last one is open-ended, so uncovered ranges appear as explicit
//!    not-regulated states instead of being omitted
//! 3. **Traceability** - every regulated state names the records that produced it
//! 4. **Horizon Order** - a history's horizons are strictly increasing and
//!    each timeline is stored under its own horizon
//!
//! ```rust
//! use regula_core::invariants::{Invariant, InvariantCompliant};
//! use regula_core::{ConsolidatedState, LegalInterval, Timeline};
//!
//! let timeline = Timeline::new(
//!     "2023-01-01".parse().unwrap(),
//!     vec![ConsolidatedState::not_regulated(LegalInterval::ALL)],
//!     vec![],
//! );
//! assert!(timeline.verify_invariants().is_ok());
//! ```

use std::fmt;

use crate::{HorizonHistory, KnowledgeDate, StateValue, Timeline};

/// Timeline invariants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Invariant {
    /// States are sorted, non-overlapping and each ends where the next starts
    Partition = 1,

    /// The timeline covers the entire legal axis
    FullCoverage = 2,

    /// Regulated states carry their source records
    Traceability = 3,

    /// Horizons in a history are keyed by their own horizon, in order
    HorizonOrder = 4,
}

impl Invariant {
    pub fn code(&self) -> &'static str {
        match self {
            Invariant::Partition => "TL-1",
            Invariant::FullCoverage => "TL-2",
            Invariant::Traceability => "TL-3",
            Invariant::HorizonOrder => "TL-4",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Invariant::Partition => "Partition",
            Invariant::FullCoverage => "Full Coverage",
            Invariant::Traceability => "Traceability",
            Invariant::HorizonOrder => "Horizon Order",
        }
    }

    pub fn all() -> &'static [Invariant] {
        &[
            Invariant::Partition,
            Invariant::FullCoverage,
            Invariant::Traceability,
            Invariant::HorizonOrder,
        ]
    }
}

/// Invariants that hold for each timeline on its own
pub const TIMELINE_INVARIANTS: &[Invariant] = &[
    Invariant::Partition,
    Invariant::FullCoverage,
    Invariant::Traceability,
];

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.name())
    }
}

/// Invariant violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub invariant: Invariant,
    pub context: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timeline invariant violation: {} - {}", self.invariant, self.context)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check a single invariant against a timeline. Horizon order only exists
/// across a history and is refused here.
pub fn check_timeline(invariant: Invariant, timeline: &Timeline) -> Result<(), String> {
    match invariant {
        Invariant::Partition => {
            for pair in timeline.states.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if a.interval.is_empty() {
                    return Err(format!("empty interval {}", a.interval));
                }
                match (a.interval.until, b.interval.from) {
                    (Some(until), Some(from)) if until == from => {}
                    _ => {
                        return Err(format!("{} is not followed by {}", a.interval, b.interval));
                    }
                }
            }
            Ok(())
        }
        Invariant::FullCoverage => {
            let first = timeline.states.first().ok_or("timeline has no states")?;
            let last = timeline.states.last().ok_or("timeline has no states")?;
            if first.interval.from.is_some() {
                return Err(format!("first state starts at {}", first.interval));
            }
            if last.interval.until.is_some() {
                return Err(format!("last state ends at {}", last.interval));
            }
            Ok(())
        }
        Invariant::Traceability => timeline
            .states
            .iter()
            .find(|s| matches!(s.value, StateValue::Regulated(_)) && s.sources.is_empty())
            .map_or(Ok(()), |s| Err(format!("regulated state {} has no sources", s.interval))),
        Invariant::HorizonOrder => Err(format!("{} is checked on histories", invariant.name())),
    }
}

/// Check a single invariant against every horizon of a history
pub fn check_history(invariant: Invariant, history: &HorizonHistory) -> Result<(), String> {
    match invariant {
        Invariant::HorizonOrder => {
            let mut previous: Option<KnowledgeDate> = None;
            for horizon in history.horizons() {
                if let Some(p) = previous.filter(|p| *p >= horizon) {
                    return Err(format!("horizon {} follows {}", horizon, p));
                }
                if let Some(t) = history.get(horizon).filter(|t| t.horizon != horizon) {
                    return Err(format!("timeline for {} stored under {}", t.horizon, horizon));
                }
                previous = Some(horizon);
            }
            Ok(())
        }
        _ => history.timelines().try_for_each(|t| {
            check_timeline(invariant, t).map_err(|e| format!("at horizon {}: {}", t.horizon, e))
        }),
    }
}

/// Check the given invariants for a component.
///
/// Returns a list of violated invariants.
pub fn check_all_invariants<F>(invariants: &[Invariant], mut checker: F) -> Vec<InvariantViolation>
where
    F: FnMut(Invariant) -> Result<(), String>,
{
    let mut violations = Vec::new();

    for &invariant in invariants {
        if let Err(context) = checker(invariant) {
            violations.push(InvariantViolation { invariant, context });
        }
    }

    violations
}

/// Types that can verify the timeline invariants on themselves
pub trait InvariantCompliant {
    fn verify_invariants(&self) -> Result<(), Vec<InvariantViolation>>;
}

impl InvariantCompliant for Timeline {
    fn verify_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        let violations = check_all_invariants(TIMELINE_INVARIANTS, |inv| check_timeline(inv, self));
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl InvariantCompliant for HorizonHistory {
    fn verify_invariants(&self) -> Result<(), Vec<InvariantViolation>> {
        let violations = check_all_invariants(Invariant::all(), |inv| check_history(inv, self));
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
