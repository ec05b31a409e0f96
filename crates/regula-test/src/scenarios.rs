//! Scenario builder
//!
//! Drives an [`Engine`] the way the authority's application layer would:
//! open branches, announce amendments with automatically numbered versions,
//! publish, withdraw. Also provides the reference scenarios used across
//! the integration tests and benches.

use std::collections::HashMap;
use std::sync::Arc;

use regula_core::{
    Activity, AmendmentRecord, BranchId, Change, InstrumentId, KnowledgeDate, LegalDate, RecordKey,
    RegulaResult, VersionNumber,
};
use regula_runtime::{Engine, EngineConfig};
use regula_state::Accepted;
use regula_workflow::BranchOrigin;

/// A scripted instrument on a shared engine
pub struct Scenario {
    pub engine: Arc<Engine>,
    pub instrument: InstrumentId,
    next_version: HashMap<BranchId, VersionNumber>,
}

impl Scenario {
    pub fn new(instrument: &str) -> Self {
        Self::with_engine(Arc::new(Engine::new()), instrument)
    }

    pub fn with_config(config: EngineConfig, instrument: &str) -> Self {
        Self::with_engine(Arc::new(Engine::with_config(config)), instrument)
    }

    /// Another instrument on an existing engine
    pub fn with_engine(engine: Arc<Engine>, instrument: &str) -> Self {
        Scenario {
            engine,
            instrument: InstrumentId::new(instrument),
            next_version: HashMap::new(),
        }
    }

    /// Create a root branch and determine its starting situation
    pub fn branch(&mut self, name: &str) -> RegulaResult<BranchId> {
        self.open(name, BranchOrigin::Root)
    }

    /// Create a branch derived from `parent` at `base` and open it
    pub fn derived(&mut self, name: &str, parent: BranchId, base: u32) -> RegulaResult<BranchId> {
        self.open(
            name,
            BranchOrigin::Derived {
                parent,
                base: VersionNumber::new(base),
            },
        )
    }

    fn open(&mut self, name: &str, origin: BranchOrigin) -> RegulaResult<BranchId> {
        let id = self.engine.create_branch(&self.instrument, name, origin)?;
        self.engine.transition(id, Activity::DetermineStartingSituation)?;
        self.next_version.insert(id, VersionNumber::FIRST);
        Ok(id)
    }

    /// Build the next record of `branch` without ingesting it
    pub fn draft(
        &self,
        branch: BranchId,
        effective: &str,
        known: &str,
        change: Change,
    ) -> RegulaResult<AmendmentRecord> {
        let version = self
            .next_version
            .get(&branch)
            .copied()
            .unwrap_or(VersionNumber::FIRST);
        Ok(AmendmentRecord::new(
            self.instrument.clone(),
            RecordKey::new(branch, version),
            effective.parse::<LegalDate>()?,
            known.parse::<KnowledgeDate>()?,
            change,
        ))
    }

    /// Ingest a prepared record; the branch's version counter advances on success
    pub fn submit(&mut self, record: AmendmentRecord) -> RegulaResult<Accepted> {
        let branch = record.branch;
        let version = record.version;
        let accepted = self.engine.ingest(record)?;
        self.next_version.insert(branch, version.next());
        Ok(accepted)
    }

    pub fn amend(&mut self, branch: BranchId, effective: &str, known: &str, content: &str) -> RegulaResult<Accepted> {
        let record = self.draft(branch, effective, known, Change::content(content))?;
        self.submit(record)
    }

    pub fn amend_retroactive(
        &mut self,
        branch: BranchId,
        effective: &str,
        known: &str,
        content: &str,
    ) -> RegulaResult<Accepted> {
        let record = self.draft(branch, effective, known, Change::content(content))?.retroactive();
        self.submit(record)
    }

    pub fn repeal(&mut self, branch: BranchId, effective: &str, known: &str) -> RegulaResult<Accepted> {
        let record = self.draft(branch, effective, known, Change::NotRegulated)?;
        self.submit(record)
    }

    pub fn withdraw(&mut self, branch: BranchId, version: u32, known: &str) -> RegulaResult<Accepted> {
        let target = VersionNumber::new(version);
        let effective = self
            .engine
            .records(branch)?
            .iter()
            .find(|r| r.version == target)
            .map(|r| r.effective.to_string())
            .unwrap_or_else(|| known.to_string());
        let record = self.draft(branch, &effective, known, Change::Withdraw(target))?;
        self.submit(record)
    }

    pub fn publish(&self, branch: BranchId) -> RegulaResult<()> {
        self.engine.transition(branch, Activity::Publish).map(|_| ())
    }

    pub fn set_priority(&self, order: &[BranchId]) -> RegulaResult<()> {
        self.engine
            .set_branch_priority(&self.instrument, Some(order.to_vec()))
    }
}

/// Branch `B1` on `X`: v1 "orig" from 2023-01-01 (known 2022-12-01), v2
/// "amended" from 2023-06-01 (known 2023-05-01)
pub fn amended_instrument() -> RegulaResult<(Scenario, BranchId)> {
    let mut s = Scenario::new("X");
    let b1 = s.branch("main")?;
    s.amend(b1, "2023-01-01", "2022-12-01", "orig")?;
    s.amend(b1, "2023-06-01", "2023-05-01", "amended")?;
    Ok((s, b1))
}

/// The amended instrument plus a retroactive correction from 2023-03-15,
/// known 2024-01-01
pub fn corrected_instrument() -> RegulaResult<(Scenario, BranchId)> {
    let (mut s, b1) = amended_instrument()?;
    s.amend_retroactive(b1, "2023-03-15", "2024-01-01", "corrected")?;
    Ok((s, b1))
}

/// Two root branches covering the same legal range, both opened, nothing
/// ingested on the second
pub fn competing_branches() -> RegulaResult<(Scenario, BranchId, BranchId)> {
    let mut s = Scenario::new("X");
    let b1 = s.branch("main")?;
    let b2 = s.branch("alternative")?;
    s.amend(b1, "2023-01-01", "2022-12-01", "main text")?;
    s.repeal(b1, "2023-12-31", "2022-12-01")?;
    Ok((s, b1, b2))
}

/// A long single-branch history: `versions` amendments one month apart,
/// each known the day before it takes effect
pub fn long_history(instrument: &str, versions: u32) -> RegulaResult<Scenario> {
    let mut s = Scenario::new(instrument);
    let b = s.branch("main")?;
    let base = chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
    for v in 0..versions {
        let effective = base + chrono::Duration::days(30 * i64::from(v) + 1);
        let known = base + chrono::Duration::days(30 * i64::from(v));
        s.amend(b, &effective.to_string(), &known.to_string(), &format!("text-{v}"))?;
    }
    Ok(s)
}
