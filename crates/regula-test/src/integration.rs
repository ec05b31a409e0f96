//! Concurrency integration harness
//!
//! Runs writer threads (one per instrument), reader threads and trial
//! threads against one shared engine. Readers check that every snapshot
//! they observe is complete: each stored timeline satisfies the partition
//! invariants. Writers only advance knowledge, so a reader must never see
//! an instrument's horizon count shrink.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use regula_core::invariants::InvariantCompliant;
use regula_core::{
    AmendmentRecord, Change, InstrumentId, KnowledgeDate, LegalDate, RecordKey, RegulaResult,
};
use regula_runtime::Engine;
use regula_time::Bitemporal;

use crate::scenarios::Scenario;

/// Concurrency run configuration
#[derive(Clone, Debug)]
pub struct ConcurrencyConfig {
    pub instruments: usize,
    pub records_per_instrument: u32,
    pub readers: usize,
    pub trial_threads: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        ConcurrencyConfig {
            instruments: 4,
            records_per_instrument: 40,
            readers: 4,
            trial_threads: 2,
        }
    }
}

/// Outcome of a concurrency run
#[derive(Debug, Default)]
pub struct ConcurrencyReport {
    pub accepted: u64,
    pub reads: u64,
    pub trials: u64,
    /// Observed snapshots with a broken timeline
    pub torn_reads: u64,
    /// Observed snapshots with fewer horizons than an earlier observation
    pub regressions: u64,
    pub writer_errors: Vec<String>,
}

impl ConcurrencyReport {
    pub fn is_clean(&self) -> bool {
        self.torn_reads == 0 && self.regressions == 0 && self.writer_errors.is_empty()
    }
}

fn instrument_name(i: usize) -> String {
    format!("I{i}")
}

fn date(base: chrono::NaiveDate, days: i64) -> String {
    (base + chrono::Duration::days(days)).to_string()
}

/// One writer: a single branch with steadily advancing amendments
fn write_instrument(engine: Arc<Engine>, i: usize, records: u32) -> RegulaResult<u64> {
    let mut s = Scenario::with_engine(engine, &instrument_name(i));
    let b = s.branch("main")?;
    let base = chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default();

    for v in 0..records {
        let offset = i64::from(v) * 10;
        s.amend(b, &date(base, offset + 5), &date(base, offset), &format!("{i}-{v}"))?;
    }
    Ok(u64::from(records))
}

/// Run writers, readers and trials concurrently on one engine
pub fn run_concurrent(config: &ConcurrencyConfig) -> ConcurrencyReport {
    let engine = Arc::new(Engine::new());
    let done = AtomicBool::new(false);
    let reads = AtomicU64::new(0);
    let trials = AtomicU64::new(0);
    let torn = AtomicU64::new(0);
    let regressions = AtomicU64::new(0);

    let mut report = ConcurrencyReport::default();

    thread::scope(|scope| {
        let writers: Vec<_> = (0..config.instruments)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let records = config.records_per_instrument;
                scope.spawn(move || write_instrument(engine, i, records))
            })
            .collect();

        for r in 0..config.readers {
            let engine = &engine;
            let (done, reads, torn, regressions) = (&done, &reads, &torn, &regressions);
            scope.spawn(move || {
                let instrument = InstrumentId::new(instrument_name(r % config.instruments.max(1)));
                let mut seen = 0usize;
                while !done.load(Ordering::Acquire) {
                    let Ok(snapshot) = engine.snapshot(&instrument) else {
                        thread::yield_now();
                        continue;
                    };
                    if snapshot.history.verify_invariants().is_err() {
                        torn.fetch_add(1, Ordering::Relaxed);
                    }
                    if snapshot.history.len() < seen {
                        regressions.fetch_add(1, Ordering::Relaxed);
                    }
                    seen = snapshot.history.len();

                    if let Some(latest) = snapshot.history.latest() {
                        let first = latest.boundaries().first().copied();
                        if let Some(legal) = first {
                            let _ = snapshot.resolve(legal, latest.horizon);
                        }
                    }
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        for t in 0..config.trial_threads {
            let engine = &engine;
            let (done, trials) = (&done, &trials);
            scope.spawn(move || {
                let instrument = InstrumentId::new(instrument_name(t % config.instruments.max(1)));
                while !done.load(Ordering::Acquire) {
                    if let Some(draft) = next_draft(engine, &instrument) {
                        if engine.run_trial(&instrument, vec![draft]).is_ok() {
                            trials.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    thread::yield_now();
                }
            });
        }

        for writer in writers {
            match writer.join() {
                Ok(Ok(n)) => report.accepted += n,
                Ok(Err(e)) => report.writer_errors.push(e.to_string()),
                Err(_) => report.writer_errors.push("writer panicked".to_string()),
            }
        }
        done.store(true, Ordering::Release);
    });

    report.reads = reads.load(Ordering::Relaxed);
    report.trials = trials.load(Ordering::Relaxed);
    report.torn_reads = torn.load(Ordering::Relaxed);
    report.regressions = regressions.load(Ordering::Relaxed);
    report
}

/// A draft that would follow the current last record of the first branch
fn next_draft(engine: &Engine, instrument: &InstrumentId) -> Option<AmendmentRecord> {
    let snapshot = engine.snapshot(instrument).ok()?;
    let branch = snapshot.ledger.registry().iter().next()?;
    let last = branch.records().last()?;
    let known = KnowledgeDate::new(last.record.known.date() + chrono::Duration::days(1));
    let effective = LegalDate::new(last.record.effective.date() + chrono::Duration::days(1));
    Some(AmendmentRecord::new(
        instrument.clone(),
        RecordKey::new(branch.id, branch.next_version()),
        effective,
        known,
        Change::content("trial"),
    ))
}
