//! Identity types for Regula
//!
//! Branch identifiers are engine-assigned 64-bit values; instrument
//! identifiers are caller-chosen work identifiers (for example an
//! `/akn/nl/act/...` path) and are never interpreted.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Regulation instrument identity - immutable, caller-chosen
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        InstrumentId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        InstrumentId::new(s)
    }
}

impl fmt::Debug for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instrument({})", self.0)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Branch identity - assigned by the branch registry, never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BranchId(pub u64);

impl BranchId {
    pub const ZERO: BranchId = BranchId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        BranchId(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        BranchId(self.0 + 1)
    }
}

impl fmt::Debug for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Branch({})", self.0)
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Branch-local version number. Versions start at 1 and are gapless.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct VersionNumber(pub u32);

impl VersionNumber {
    pub const FIRST: VersionNumber = VersionNumber(1);

    #[inline]
    pub fn new(v: u32) -> Self {
        VersionNumber(v)
    }

    #[inline]
    pub fn next(self) -> Self {
        VersionNumber(self.0 + 1)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Record identity - (branch, version) is the unique key of an amendment record
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub branch: BranchId,
    pub version: VersionNumber,
}

impl RecordKey {
    #[inline]
    pub fn new(branch: BranchId, version: VersionNumber) -> Self {
        RecordKey { branch, version }
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({}:{})", self.branch, self.version)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.branch, self.version)
    }
}

/// Global ingestion sequence number, assigned on acceptance
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct IngestSeq(pub u64);

impl IngestSeq {
    pub const ZERO: IngestSeq = IngestSeq(0);

    #[inline]
    pub fn next(self) -> Self {
        IngestSeq(self.0 + 1)
    }
}

impl fmt::Debug for IngestSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

/// Opaque content reference. The engine stores and compares it, never interprets it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(content: impl Into<String>) -> Self {
        ContentRef(content.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ContentRef {
    fn from(s: &str) -> Self {
        ContentRef::new(s)
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Content({:?})", self.0)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
