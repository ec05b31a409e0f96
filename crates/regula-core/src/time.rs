//! Date primitives for Regula
//!
//! Regula is bitemporal and keeps its two time axes apart at the type level:
//! - Legal date: the date from which an amendment is legally in force
//! - Knowledge date: the date a fact became known (registered)
//!
//! Both are calendar dates; a `LegalDate` can never be passed where a
//! `KnowledgeDate` is expected.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::RegulaError;

/// Legal-effect date - the date an amendment takes effect
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LegalDate(pub NaiveDate);

impl LegalDate {
    #[inline]
    pub fn new(date: NaiveDate) -> Self {
        LegalDate(date)
    }

    pub fn from_ymd_opt(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(LegalDate)
    }

    #[inline]
    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl FromStr for LegalDate {
    type Err = RegulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_iso(s).map(LegalDate)
    }
}

impl fmt::Debug for LegalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "legal({})", self.0)
    }
}

impl fmt::Display for LegalDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Knowledge date - the as-of registration date of a fact
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KnowledgeDate(pub NaiveDate);

impl KnowledgeDate {
    #[inline]
    pub fn new(date: NaiveDate) -> Self {
        KnowledgeDate(date)
    }

    pub fn from_ymd_opt(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(KnowledgeDate)
    }

    #[inline]
    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl FromStr for KnowledgeDate {
    type Err = RegulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_iso(s).map(KnowledgeDate)
    }
}

impl fmt::Debug for KnowledgeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "known({})", self.0)
    }
}

impl fmt::Display for KnowledgeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_iso(s: &str) -> Result<NaiveDate, RegulaError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| RegulaError::InvalidDate(s.to_string()))
}

/// Half-open interval on the legal axis: `[from, until)`
///
/// `from == None` is the unbounded past, `until == None` is open-ended.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegalInterval {
    pub from: Option<LegalDate>,
    pub until: Option<LegalDate>,
}

impl LegalInterval {
    /// The whole legal axis
    pub const ALL: LegalInterval = LegalInterval {
        from: None,
        until: None,
    };

    pub fn new(from: Option<LegalDate>, until: Option<LegalDate>) -> Self {
        LegalInterval { from, until }
    }

    /// `[from, open)`
    pub fn starting(from: LegalDate) -> Self {
        LegalInterval {
            from: Some(from),
            until: None,
        }
    }

    /// Check if a legal date lies within the interval
    pub fn contains(&self, date: LegalDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.until.map_or(true, |u| date < u)
    }

    /// Empty when both ends are bounded and `until <= from`
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.until), (Some(f), Some(u)) if u <= f)
    }

    pub fn is_open_ended(&self) -> bool {
        self.until.is_none()
    }

    /// Check if two intervals share at least one date
    pub fn overlaps(&self, other: &LegalInterval) -> bool {
        let starts_before_other_ends = match (self.from, other.until) {
            (Some(f), Some(u)) => f < u,
            _ => true,
        };
        let other_starts_before_end = match (other.from, self.until) {
            (Some(f), Some(u)) => f < u,
            _ => true,
        };
        starts_before_other_ends && other_starts_before_end && !self.is_empty() && !other.is_empty()
    }
}

impl fmt::Debug for LegalInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for LegalInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.from {
            Some(d) => write!(f, "[{}, ", d)?,
            None => write!(f, "(-inf, ")?,
        }
        match self.until {
            Some(d) => write!(f, "{})", d),
            None => write!(f, "open)"),
        }
    }
}
