//! Ingestion-order fuzzer
//!
//! Generates one random amendment history per run (several branches,
//! retroactive corrections, repeals, withdrawals) and ingests it under many
//! random interleavings into fresh engines. Branches other than the first
//! may derive from it; the first branch's leading records up to the base
//! version are then ingested before the derivation in every run, and the
//! rest of its records withdraw inherited versions. Checks:
//! - Determinism: every interleaving yields the same horizon history
//! - Partition and traceability of every stored timeline
//! - History immutability: horizons before a recomputation stay untouched

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use regula_core::invariants::InvariantCompliant;
use regula_core::{
    Activity, AmendmentRecord, BranchId, Change, ConsolidatedState, HorizonHistory, InstrumentId,
    KnowledgeDate, LegalDate, RecordKey, VersionNumber,
};
use regula_runtime::Engine;
use regula_workflow::BranchOrigin;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of root branches
    pub branch_count: usize,
    /// Records generated per branch
    pub records_per_branch: usize,
    /// Interleavings ingested and compared
    pub interleavings: usize,
    /// Probability a record is a retroactive correction
    pub retroactive_prob: f64,
    /// Probability a record withdraws an earlier version
    pub withdraw_prob: f64,
    /// Probability a record repeals the instrument
    pub repeal_prob: f64,
    /// Probability a later branch derives from the first one
    pub derive_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            branch_count: 3,
            records_per_branch: 20,
            interleavings: 8,
            retroactive_prob: 0.2,
            withdraw_prob: 0.1,
            repeal_prob: 0.05,
            derive_prob: DERIVE_PROB,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            branch_count: 2,
            records_per_branch: 6,
            interleavings: 4,
            retroactive_prob: 0.2,
            withdraw_prob: 0.1,
            repeal_prob: 0.0,
            derive_prob: DERIVE_PROB,
            seed: 42,
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            branch_count: 5,
            records_per_branch: 60,
            interleavings: 24,
            retroactive_prob: 0.3,
            withdraw_prob: 0.15,
            repeal_prob: 0.1,
            derive_prob: DERIVE_PROB,
            seed: 42,
        }
    }
}

const DERIVE_PROB: f64 = 0.5;

/// Per-branch generation state
struct BranchGen {
    known: NaiveDate,
    last_effective: Option<NaiveDate>,
    /// Versions that may still be withdrawn
    withdrawable: Vec<(VersionNumber, NaiveDate)>,
}

/// One generated branch: how it is opened and its records in version order
#[derive(Clone, Debug)]
pub struct FuzzBranch {
    pub origin: BranchOrigin,
    pub records: Vec<AmendmentRecord>,
}

/// Ingestion-order fuzzer
pub struct OrderFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    instrument: InstrumentId,
}

impl OrderFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        OrderFuzzer {
            config,
            rng,
            instrument: InstrumentId::new("FUZZ"),
        }
    }

    /// Base version of derived branches, when derivation is possible
    fn derive_base(&self) -> Option<VersionNumber> {
        let c = &self.config;
        (c.branch_count >= 2 && c.records_per_branch >= 2 && c.derive_prob > 0.0)
            .then(|| VersionNumber::new((c.records_per_branch / 2) as u32))
    }

    /// Generate each branch's origin and records. Branch `i` gets id
    /// `i + 1` on a fresh engine.
    pub fn generate(&mut self) -> Vec<FuzzBranch> {
        let origin = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        let base = self.derive_base();
        let parent = BranchId::new(1);

        let origins: Vec<BranchOrigin> = (0..self.config.branch_count)
            .map(|b| match base {
                Some(base) if b > 0 && self.rng.gen::<f64>() < self.config.derive_prob => {
                    BranchOrigin::Derived { parent, base }
                }
                _ => BranchOrigin::Root,
            })
            .collect();
        let derived = origins.iter().any(|o| matches!(o, BranchOrigin::Derived { .. }));

        let mut out = Vec::with_capacity(self.config.branch_count);
        for (b, origin_kind) in origins.into_iter().enumerate() {
            let branch = BranchId::new(b as u64 + 1);
            let mut gen = BranchGen {
                known: origin,
                last_effective: None,
                withdrawable: Vec::new(),
            };
            let mut records = Vec::with_capacity(self.config.records_per_branch);

            for v in 1..=self.config.records_per_branch {
                let version = VersionNumber::new(v as u32);
                let in_prefix = b == 0 && base.map_or(false, |base| version <= base);
                let after_base = b == 0 && base.map_or(false, |base| version == base.next());
                let record = if derived && after_base && self.config.withdraw_prob > 0.0 {
                    // the parent withdraws an inherited version right after the derivation
                    self.withdraw_record(branch, version, &mut gen)
                } else {
                    self.generate_record(branch, version, &mut gen, origin, !in_prefix)
                };
                records.push(record);
            }
            out.push(FuzzBranch {
                origin: origin_kind,
                records,
            });
        }

        out
    }

    /// Records of the first branch ingested before any derivation
    fn setup_len(&self, branches: &[FuzzBranch]) -> usize {
        let derived = branches
            .iter()
            .any(|b| matches!(b.origin, BranchOrigin::Derived { .. }));
        match self.derive_base() {
            Some(base) if derived => base.0 as usize,
            _ => 0,
        }
    }

    fn withdraw_record(&mut self, branch: BranchId, version: VersionNumber, gen: &mut BranchGen) -> AmendmentRecord {
        gen.known += Duration::days(self.rng.gen_range(0..20));
        let idx = self.rng.gen_range(0..gen.withdrawable.len());
        let (target, effective) = gen.withdrawable.swap_remove(idx);
        AmendmentRecord::new(
            self.instrument.clone(),
            RecordKey::new(branch, version),
            LegalDate::new(effective),
            KnowledgeDate::new(gen.known),
            Change::Withdraw(target),
        )
    }

    fn generate_record(
        &mut self,
        branch: BranchId,
        version: VersionNumber,
        gen: &mut BranchGen,
        origin: NaiveDate,
        allow_withdraw: bool,
    ) -> AmendmentRecord {
        if allow_withdraw
            && !gen.withdrawable.is_empty()
            && self.rng.gen::<f64>() < self.config.withdraw_prob
        {
            return self.withdraw_record(branch, version, gen);
        }

        gen.known += Duration::days(self.rng.gen_range(0..20));
        let key = RecordKey::new(branch, version);
        let known = KnowledgeDate::new(gen.known);

        let retroactive =
            gen.last_effective.is_some() && self.rng.gen::<f64>() < self.config.retroactive_prob;
        let effective = match gen.last_effective {
            Some(last) if !retroactive => last + Duration::days(self.rng.gen_range(0..90)),
            _ => origin + Duration::days(365 + self.rng.gen_range(0..730)),
        };
        let change = if self.rng.gen::<f64>() < self.config.repeal_prob {
            Change::NotRegulated
        } else {
            Change::content(format!("{}-{}-{}", branch, version, self.rng.gen_range(0..4)))
        };

        // a retroactive record never moves the branch's ordering bound back
        gen.last_effective = Some(gen.last_effective.map_or(effective, |l| l.max(effective)));
        gen.withdrawable.push((version, effective));

        let record = AmendmentRecord::new(
            self.instrument.clone(),
            key,
            LegalDate::new(effective),
            known,
            change,
        );
        if retroactive {
            record.retroactive()
        } else {
            record
        }
    }

    /// Random interleaving preserving each branch's version order
    pub fn interleave(&mut self, branches: &[Vec<AmendmentRecord>]) -> Vec<AmendmentRecord> {
        let mut queues: Vec<VecDeque<&AmendmentRecord>> =
            branches.iter().map(|b| b.iter().collect()).collect();
        let mut out = Vec::with_capacity(queues.iter().map(VecDeque::len).sum());

        loop {
            let live: Vec<usize> = (0..queues.len()).filter(|i| !queues[*i].is_empty()).collect();
            if live.is_empty() {
                break;
            }
            let pick = live[self.rng.gen_range(0..live.len())];
            if let Some(record) = queues[pick].pop_front() {
                out.push(record.clone());
            }
        }

        out
    }

    /// Fresh engine with the fuzzed branches opened and fully ranked. The
    /// first branch's `setup` records go in before the other branches exist,
    /// so derived branches find their base version.
    fn engine(&self, branches: &[FuzzBranch], setup: &[AmendmentRecord]) -> Result<Engine, String> {
        let engine = Engine::new();
        let mut ids = Vec::with_capacity(branches.len());
        for (b, branch) in branches.iter().enumerate() {
            let id = engine
                .create_branch(&self.instrument, format!("branch-{b}"), branch.origin)
                .map_err(|e| e.to_string())?;
            engine
                .transition(id, Activity::DetermineStartingSituation)
                .map_err(|e| e.to_string())?;
            ids.push(id);

            if b == 0 {
                for record in setup {
                    engine.ingest(record.clone()).map_err(|e| e.to_string())?;
                }
            }
        }
        engine
            .set_branch_priority(&self.instrument, Some(ids))
            .map_err(|e| e.to_string())?;
        Ok(engine)
    }

    /// Ingest one interleaving, checking immutability of earlier horizons
    fn replay(
        &self,
        branches: &[FuzzBranch],
        setup: &[AmendmentRecord],
        order: Vec<AmendmentRecord>,
        result: &mut FuzzResult,
    ) -> Option<Arc<HorizonHistory>> {
        let engine = match self.engine(branches, setup) {
            Ok(engine) => engine,
            Err(e) => {
                result.setup_errors.push(e);
                return None;
            }
        };

        for record in order {
            let before = engine.snapshot(&self.instrument).ok()?.history.clone();
            match engine.ingest(record) {
                Ok(accepted) => {
                    let after = engine.snapshot(&self.instrument).ok()?.history.clone();
                    if !properties::prefix_unchanged(&before, &after, accepted.report.rebuilt_from) {
                        result.history_mutations += 1;
                    }
                }
                Err(_) => result.rejected += 1,
            }
        }

        let history = engine.snapshot(&self.instrument).ok()?.history.clone();
        if let Err(violations) = history.verify_invariants() {
            result
                .invariant_violations
                .extend(violations.into_iter().map(|v| v.to_string()));
        }
        Some(history)
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let branches = self.generate();
        let mut result = FuzzResult::new();
        result.records = branches.iter().map(|b| b.records.len()).sum();
        result.derived_branches = branches
            .iter()
            .filter(|b| matches!(b.origin, BranchOrigin::Derived { .. }))
            .count();

        let setup_len = self.setup_len(&branches);
        let setup: Vec<AmendmentRecord> = branches
            .first()
            .map(|b| b.records[..setup_len].to_vec())
            .unwrap_or_default();
        let rest: Vec<Vec<AmendmentRecord>> = branches
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let skip = if i == 0 { setup_len } else { 0 };
                b.records[skip..].to_vec()
            })
            .collect();

        let mut reference: Option<Arc<HorizonHistory>> = None;
        for _ in 0..self.config.interleavings {
            let order = self.interleave(&rest);
            let Some(history) = self.replay(&branches, &setup, order, &mut result) else {
                continue;
            };
            result.interleavings += 1;

            match &reference {
                None => {
                    result.horizons = history.len();
                    reference = Some(history);
                }
                Some(first) => {
                    for horizon in properties::divergent_horizons(first, &history) {
                        if !result.divergent_horizons.contains(&horizon) {
                            result.divergent_horizons.push(horizon);
                        }
                    }
                }
            }
        }

        result
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub records: usize,
    pub derived_branches: usize,
    pub interleavings: usize,
    /// Horizons stored by the first interleaving
    pub horizons: usize,
    /// Records rejected in any interleaving
    pub rejected: u32,
    pub divergent_horizons: Vec<KnowledgeDate>,
    pub invariant_violations: Vec<String>,
    pub history_mutations: u32,
    pub setup_errors: Vec<String>,
}

impl FuzzResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.rejected == 0
            && self.divergent_horizons.is_empty()
            && self.invariant_violations.is_empty()
            && self.history_mutations == 0
            && self.setup_errors.is_empty()
    }
}

/// Property helpers shared by the fuzzer and the proptest suites
pub mod properties {
    use super::*;

    use regula_time::KnowledgeEntry;

    /// Horizons whose stored states differ between two histories,
    /// including horizons present in only one of them
    pub fn divergent_horizons(a: &HorizonHistory, b: &HorizonHistory) -> Vec<KnowledgeDate> {
        let mut horizons: Vec<KnowledgeDate> = a.horizons().chain(b.horizons()).collect();
        horizons.sort_unstable();
        horizons.dedup();

        horizons
            .into_iter()
            .filter(|h| {
                let sa: Option<&[ConsolidatedState]> = a.get(*h).map(|t| t.states.as_slice());
                let sb: Option<&[ConsolidatedState]> = b.get(*h).map(|t| t.states.as_slice());
                sa != sb
            })
            .collect()
    }

    /// Same horizons with the same states and provenance
    pub fn same_history(a: &HorizonHistory, b: &HorizonHistory) -> bool {
        divergent_horizons(a, b).is_empty()
    }

    /// Every horizon of `before` earlier than `from` is still stored in
    /// `after` as the very same value
    pub fn prefix_unchanged(before: &HorizonHistory, after: &HorizonHistory, from: KnowledgeDate) -> bool {
        before
            .horizons()
            .filter(|h| *h < from)
            .all(|h| match (before.get(h), after.get(h)) {
                (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                _ => false,
            })
    }

    /// Knowledge timeline entries are contiguous and never repeat an answer
    pub fn knowledge_timeline_collapsed(entries: &[KnowledgeEntry]) -> bool {
        entries.windows(2).all(|w| {
            w[0].known_until == Some(w[1].known_from) && !w[0].state.same_answer(&w[1].state)
        }) && entries.last().map_or(true, |e| e.known_until.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzer_light() {
        let mut fuzzer = OrderFuzzer::new(FuzzerConfig::light());
        let result = fuzzer.run();
        assert!(result.is_valid(), "light fuzz result: {:?}", result);
        assert_eq!(result.interleavings, 4);
    }

    #[test]
    fn test_fuzzer_default() {
        let mut fuzzer = OrderFuzzer::new(FuzzerConfig::default());
        let result = fuzzer.run();
        assert!(result.is_valid(), "default fuzz result: {:?}", result);
        assert!(result.horizons > 0);
    }

    #[test]
    fn test_interleave_preserves_branch_order() {
        let mut fuzzer = OrderFuzzer::new(FuzzerConfig::light());
        let branches: Vec<Vec<AmendmentRecord>> =
            fuzzer.generate().into_iter().map(|b| b.records).collect();
        let order = fuzzer.interleave(&branches);

        assert_eq!(order.len(), branches.iter().map(Vec::len).sum::<usize>());
        for branch in &branches {
            let id = branch[0].branch;
            let versions: Vec<_> = order.iter().filter(|r| r.branch == id).map(|r| r.version).collect();
            assert!(versions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_generated_records_are_well_formed() {
        let mut fuzzer = OrderFuzzer::new(FuzzerConfig::heavy());
        for branch in fuzzer.generate() {
            for record in branch.records {
                assert!(record.check_well_formed().is_ok(), "{:?}", record);
            }
        }
    }

    #[test]
    fn test_derived_branches_see_parent_withdrawals() {
        let config = FuzzerConfig {
            derive_prob: 1.0,
            withdraw_prob: 0.2,
            ..FuzzerConfig::default()
        };
        let mut fuzzer = OrderFuzzer::new(config.clone());
        let branches = fuzzer.generate();
        let base = config.records_per_branch / 2;

        assert!(branches[1..]
            .iter()
            .all(|b| matches!(b.origin, BranchOrigin::Derived { .. })));
        let parent = &branches[0].records;
        assert!(parent[..base].iter().all(|r| !r.change.is_withdrawal()));
        let withdrawn = parent[base].change.withdrawn_version().unwrap();
        assert!(withdrawn.0 as usize <= base);

        let result = OrderFuzzer::new(config).run();
        assert!(result.is_valid(), "derived fuzz result: {:?}", result);
        assert_eq!(result.derived_branches, 2);
    }
}
