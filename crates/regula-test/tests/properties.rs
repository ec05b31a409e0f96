//! Property tests for ingestion order, time travel and trial isolation

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use regula_core::invariants::InvariantCompliant;
use regula_core::{Change, KnowledgeDate, LegalDate};
use regula_test::{properties, FuzzerConfig, OrderFuzzer, Scenario};

fn origin() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_else(|| panic!("invalid origin"))
}

fn day(offset: u32) -> NaiveDate {
    origin() + Duration::days(i64::from(offset))
}

/// One step of a single-branch history: how far effective and knowledge
/// dates advance, and whether the step repeals
#[derive(Clone, Debug)]
struct Step {
    effective_step: u32,
    known_step: u32,
    repeal: bool,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0u32..90, 0u32..60, prop::bool::weighted(0.15)).prop_map(
        |(effective_step, known_step, repeal)| Step {
            effective_step,
            known_step,
            repeal,
        },
    )
}

/// Ingest `steps` into a fresh single-branch instrument
fn build(steps: &[Step]) -> Scenario {
    let mut s = Scenario::new("P");
    let b = s
        .branch("main")
        .unwrap_or_else(|e| panic!("branch failed: {e}"));

    let (mut effective, mut known) = (0u32, 0u32);
    for (i, step) in steps.iter().enumerate() {
        effective += step.effective_step;
        known += step.known_step;
        let change = if step.repeal {
            Change::NotRegulated
        } else {
            Change::content(format!("text-{i}"))
        };
        let record = s
            .draft(b, &day(effective).to_string(), &day(known).to_string(), change)
            .unwrap_or_else(|e| panic!("draft failed: {e}"));
        s.submit(record)
            .unwrap_or_else(|e| panic!("step {i} rejected: {e}"));
    }
    s
}

fn fuzzer_config_strategy() -> impl Strategy<Value = FuzzerConfig> {
    (
        any::<u64>(),
        1usize..4,
        1usize..10,
        0.0f64..0.4,
        0.0f64..0.2,
        0.0f64..1.0,
    )
        .prop_map(
            |(seed, branch_count, records_per_branch, retroactive_prob, withdraw_prob, derive_prob)| {
                FuzzerConfig {
                    branch_count,
                    records_per_branch,
                    interleavings: 3,
                    retroactive_prob,
                    withdraw_prob,
                    repeal_prob: 0.05,
                    derive_prob,
                    seed,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_interleavings_agree(config in fuzzer_config_strategy()) {
        let result = OrderFuzzer::new(config).run();
        prop_assert!(result.is_valid(), "fuzz result: {:?}", result);
        prop_assert_eq!(result.interleavings, 3);
    }

    #[test]
    fn prop_derived_branches_agree_across_interleavings(
        seed in any::<u64>(),
        branch_count in 2usize..4,
        records_per_branch in 2usize..10,
    ) {
        let config = FuzzerConfig {
            branch_count,
            records_per_branch,
            interleavings: 3,
            withdraw_prob: 0.2,
            derive_prob: 1.0,
            seed,
            ..FuzzerConfig::light()
        };
        let result = OrderFuzzer::new(config).run();
        prop_assert!(result.is_valid(), "fuzz result: {:?}", result);
        prop_assert_eq!(result.derived_branches, branch_count - 1);
    }

    #[test]
    fn prop_history_is_well_formed(steps in prop::collection::vec(step_strategy(), 1..16)) {
        let s = build(&steps);
        let snapshot = s.engine.snapshot(&s.instrument).unwrap();
        prop_assert!(snapshot.history.verify_invariants().is_ok());
        prop_assert!(snapshot.history.len() <= steps.len());
    }

    #[test]
    fn prop_resolve_matches_legal_timeline(
        steps in prop::collection::vec(step_strategy(), 1..12),
        points in prop::collection::vec((0u32..1500, 0u32..900), 1..20),
    ) {
        let s = build(&steps);
        for (l, k) in points {
            let legal = LegalDate::new(day(l));
            let known = KnowledgeDate::new(day(k));

            let point = s.engine.resolve(&s.instrument, legal, known).unwrap();
            let timeline = s.engine.legal_timeline(&s.instrument, known).unwrap();
            prop_assert_eq!(point.is_known(), timeline.is_known());

            let via_timeline = timeline.into_known().and_then(|t| t.state_at(legal).cloned());
            prop_assert_eq!(point.into_known(), via_timeline);
        }
    }

    #[test]
    fn prop_knowledge_timeline_never_repeats(steps in prop::collection::vec(step_strategy(), 1..12)) {
        let s = build(&steps);
        let snapshot = s.engine.snapshot(&s.instrument).unwrap();
        let mut dates: Vec<LegalDate> = snapshot
            .history
            .timelines()
            .flat_map(|t| t.boundaries())
            .collect();
        dates.push(LegalDate::new(origin()));
        dates.sort_unstable();
        dates.dedup();

        for legal in dates {
            let entries = s.engine.knowledge_timeline(&s.instrument, legal).unwrap();
            prop_assert!(!entries.is_empty());
            prop_assert!(properties::knowledge_timeline_collapsed(&entries));
        }
    }

    #[test]
    fn prop_later_knowledge_leaves_stored_horizons(
        steps in prop::collection::vec(step_strategy(), 2..12),
    ) {
        let (head, tail) = steps.split_at(steps.len() - 1);
        let mut s = build(head);
        let before = s.engine.snapshot(&s.instrument).unwrap();

        let last_known: u32 = head.iter().map(|st| st.known_step).sum();
        let last_effective: u32 = head.iter().map(|st| st.effective_step).sum();
        let known = last_known + tail[0].known_step + 1;
        let effective = last_effective + tail[0].effective_step;
        let b = before.ledger.registry().iter().next().unwrap().id;
        s.amend(b, &day(effective).to_string(), &day(known).to_string(), "late")
            .unwrap();

        let after = s.engine.snapshot(&s.instrument).unwrap();
        prop_assert!(properties::prefix_unchanged(
            &before.history,
            &after.history,
            KnowledgeDate::new(day(known)),
        ));
    }

    #[test]
    fn prop_trial_never_publishes(
        steps in prop::collection::vec(step_strategy(), 1..10),
        draft_step in 0u32..60,
    ) {
        let s = build(&steps);
        let before = s.engine.snapshot(&s.instrument).unwrap();
        let horizons = s.engine.horizons(&s.instrument).unwrap();

        let effective: u32 = steps.iter().map(|st| st.effective_step).sum::<u32>() + draft_step;
        let known: u32 = steps.iter().map(|st| st.known_step).sum::<u32>() + 1;
        let b = before.ledger.registry().iter().next().unwrap().id;
        let draft = s
            .draft(b, &day(effective).to_string(), &day(known).to_string(), Change::content("trial"))
            .unwrap();

        let trial = s.engine.run_trial(&s.instrument, vec![draft]).unwrap();
        prop_assert!(trial.history.is_provisional());
        prop_assert!(Arc::ptr_eq(&before, &s.engine.snapshot(&s.instrument).unwrap()));
        prop_assert_eq!(horizons, s.engine.horizons(&s.instrument).unwrap());
    }
}
