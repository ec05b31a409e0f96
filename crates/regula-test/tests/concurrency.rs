//! Concurrent readers, writers and trials on one engine

use std::sync::Arc;
use std::thread;

use regula_core::{InstrumentId, KnowledgeDate, LegalDate, Resolution};
use regula_runtime::Engine;
use regula_test::{run_concurrent, ConcurrencyConfig, Scenario};

#[test]
fn test_default_concurrent_run_is_clean() {
    let config = ConcurrencyConfig::default();
    let report = run_concurrent(&config);

    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(
        report.accepted,
        config.instruments as u64 * u64::from(config.records_per_instrument)
    );
}

#[test]
fn test_instruments_are_independent() {
    let engine = Arc::new(Engine::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut s = Scenario::with_engine(engine, &format!("T{i}"));
                let b = s.branch("main").unwrap();
                s.amend(b, "2023-01-01", "2022-12-01", &format!("text {i}")).unwrap();
                s.amend(b, "2023-06-01", "2023-05-01", "shared").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.instruments().len(), 4);
    assert_eq!(engine.stats().records_accepted, 8);

    let legal: LegalDate = "2023-02-01".parse().unwrap();
    let known: KnowledgeDate = "2023-12-01".parse().unwrap();
    for i in 0..4 {
        let instrument = InstrumentId::new(format!("T{i}"));
        let Resolution::Known(state) = engine.resolve(&instrument, legal, known).unwrap() else {
            panic!("T{i} not known");
        };
        assert_eq!(state.content().map(|c| c.as_str()), Some(format!("text {i}").as_str()));
    }
}

#[test]
fn test_reader_keeps_its_snapshot() {
    let mut s = Scenario::new("X");
    let b = s.branch("main").unwrap();
    s.amend(b, "2023-01-01", "2022-12-01", "orig").unwrap();

    let held = s.engine.snapshot(&s.instrument).unwrap();
    let engine = Arc::clone(&s.engine);
    let instrument = s.instrument.clone();
    let writer = thread::spawn(move || {
        let mut s = s;
        s.amend(b, "2023-06-01", "2023-05-01", "amended").unwrap();
    });
    writer.join().unwrap();

    assert_eq!(held.history.len(), 1);
    assert_eq!(engine.snapshot(&instrument).unwrap().history.len(), 2);
}
