//! End-to-end scenarios against the engine facade

use std::sync::Arc;

use regula_core::{
    Activity, BranchId, Change, ContentRef, ErrorClass, InstrumentId, KnowledgeDate, LegalDate,
    LegalInterval, RegulaError, Resolution, StateValue, VersionNumber, WorkflowState,
};
use regula_runtime::EngineConfig;
use regula_test::properties;
use regula_test::{amended_instrument, competing_branches, corrected_instrument, Scenario};

fn legal(s: &str) -> LegalDate {
    s.parse().unwrap()
}

fn known(s: &str) -> KnowledgeDate {
    s.parse().unwrap()
}

fn content(s: &Scenario, legal_date: &str, knowledge: &str) -> Option<String> {
    s.engine
        .resolve(&s.instrument, legal(legal_date), known(knowledge))
        .unwrap()
        .into_known()
        .and_then(|state| state.content().map(|c| c.as_str().to_string()))
}

// ============================================================================
// REFERENCE SCENARIOS
// ============================================================================

#[test]
fn test_amendment_resolves_by_legal_date() {
    let (s, _) = amended_instrument().unwrap();

    let state = s
        .engine
        .resolve(&s.instrument, legal("2023-03-01"), known("2023-12-01"))
        .unwrap()
        .into_known()
        .unwrap();
    assert_eq!(state.content(), Some(&ContentRef::new("orig")));
    assert_eq!(
        state.interval,
        LegalInterval::new(Some(legal("2023-01-01")), Some(legal("2023-06-01")))
    );

    let state = s
        .engine
        .resolve(&s.instrument, legal("2023-07-01"), known("2023-12-01"))
        .unwrap()
        .into_known()
        .unwrap();
    assert_eq!(state.content(), Some(&ContentRef::new("amended")));
    assert_eq!(state.interval, LegalInterval::starting(legal("2023-06-01")));
}

#[test]
fn test_earlier_knowledge_and_not_yet_known() {
    let (s, _) = amended_instrument().unwrap();

    assert_eq!(content(&s, "2023-03-01", "2023-01-15").as_deref(), Some("orig"));
    assert_eq!(
        s.engine
            .resolve(&s.instrument, legal("2023-03-01"), known("2022-11-01"))
            .unwrap(),
        Resolution::NotYetKnown
    );
}

#[test]
fn test_retroactive_correction_keeps_old_answers() {
    let (s, _) = amended_instrument().unwrap();
    let old = s.engine.snapshot(&s.instrument).unwrap();
    drop(s);

    let (s, _) = corrected_instrument().unwrap();

    // new horizon: the legal range splits at the correction
    let t = s
        .engine
        .legal_timeline(&s.instrument, known("2024-01-01"))
        .unwrap()
        .into_known()
        .unwrap();
    let values: Vec<_> = t
        .iter()
        .map(|st| (st.interval.from, st.content().map(|c| c.as_str().to_string())))
        .collect();
    assert_eq!(
        values,
        vec![
            (None, None),
            (Some(legal("2023-01-01")), Some("orig".to_string())),
            (Some(legal("2023-03-15")), Some("corrected".to_string())),
            (Some(legal("2023-06-01")), Some("amended".to_string())),
        ]
    );

    // old horizon: unchanged
    assert_eq!(content(&s, "2023-04-01", "2023-12-01").as_deref(), Some("orig"));
    let new = s.engine.snapshot(&s.instrument).unwrap();
    assert!(properties::same_history(
        &old.history,
        &new.history.prefix_before(known("2024-01-01"))
    ));
}

#[test]
fn test_competing_branches_need_priority() {
    let (mut s, b1, b2) = competing_branches().unwrap();

    let err = s.amend(b2, "2023-01-01", "2022-12-01", "other text").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Ambiguity);
    match err {
        RegulaError::AmbiguousState { branches, .. } => assert_eq!(branches, vec![b1, b2]),
        other => panic!("unexpected {other:?}"),
    }
    // committed timeline still answers with the main branch
    assert_eq!(content(&s, "2023-06-01", "2022-12-01").as_deref(), Some("main text"));

    s.set_priority(&[b2, b1]).unwrap();
    s.amend(b2, "2023-01-01", "2022-12-01", "other text").unwrap();
    assert_eq!(content(&s, "2023-06-01", "2022-12-01").as_deref(), Some("other text"));
    // b2 is open-ended, so it also outranks main's repeal
    assert_eq!(content(&s, "2024-02-01", "2022-12-01").as_deref(), Some("other text"));
}

// ============================================================================
// WORKFLOW
// ============================================================================

#[test]
fn test_workflow_lifecycle() {
    let (s, b1) = amended_instrument().unwrap();
    let engine = &s.engine;

    assert_eq!(engine.workflow_state(b1).unwrap(), WorkflowState::StartingSituationDetermined);
    assert!(matches!(
        engine.transition(b1, Activity::Exchange),
        Err(RegulaError::InvalidWorkflowTransition { .. })
    ));

    s.publish(b1).unwrap();
    assert!(matches!(
        engine.transition(b1, Activity::Publish),
        Err(RegulaError::InvalidWorkflowTransition { .. })
    ));
    engine.transition(b1, Activity::Exchange).unwrap();
    assert_eq!(engine.download(b1).unwrap().len(), 2);
    engine.transition(b1, Activity::Withdraw).unwrap();

    assert_eq!(engine.workflow_state(b1).unwrap(), WorkflowState::Withdrawn);
    let log = engine.activity_log(b1).unwrap();
    let activities: Vec<_> = log.iter().map(|e| e.activity).collect();
    assert_eq!(
        activities,
        vec![
            Activity::DetermineStartingSituation,
            Activity::Publish,
            Activity::Exchange,
            Activity::Download,
            Activity::Withdraw,
        ]
    );
}

#[test]
fn test_withdrawn_branch_rejects_records() {
    let (mut s, b1) = amended_instrument().unwrap();
    s.engine.transition(b1, Activity::Withdraw).unwrap();

    let err = s.amend(b1, "2023-09-01", "2023-08-01", "late").unwrap_err();
    assert_eq!(err.class(), ErrorClass::Workflow);
}

// ============================================================================
// INGESTION RULES
// ============================================================================

#[test]
fn test_duplicate_version_has_no_effect() {
    let (mut s, b1) = amended_instrument().unwrap();
    let before = s.engine.snapshot(&s.instrument).unwrap();

    let mut duplicate = s.draft(b1, "2023-06-01", "2023-05-01", Change::content("again")).unwrap();
    duplicate.version = VersionNumber::new(2);
    let err = s.submit(duplicate).unwrap_err();
    assert!(matches!(err, RegulaError::DuplicateVersion(_)));

    assert!(Arc::ptr_eq(&before, &s.engine.snapshot(&s.instrument).unwrap()));
}

#[test]
fn test_backdated_knowledge_depends_on_config() {
    let mut strict = Scenario::new("X");
    let b = strict.branch("main").unwrap();
    strict.amend(b, "2023-01-01", "2023-01-01", "a").unwrap();
    let err = strict.amend(b, "2023-02-01", "2022-06-01", "b").unwrap_err();
    assert!(matches!(err, RegulaError::MalformedRecord { .. }));

    let mut lenient = Scenario::with_config(EngineConfig::lenient(), "X");
    let b = lenient.branch("main").unwrap();
    lenient.amend(b, "2023-01-01", "2023-01-01", "a").unwrap();
    let accepted = lenient.amend(b, "2023-02-01", "2022-06-01", "b").unwrap();
    assert_eq!(accepted.report.rebuilt_from, known("2022-06-01"));
    assert_eq!(content(&lenient, "2023-03-01", "2022-07-01").as_deref(), Some("b"));
}

#[test]
fn test_repeal_is_explicit() {
    let (mut s, b1) = amended_instrument().unwrap();
    s.repeal(b1, "2024-01-01", "2023-10-01").unwrap();

    let state = s
        .engine
        .resolve(&s.instrument, legal("2024-05-01"), known("2023-10-01"))
        .unwrap()
        .into_known()
        .unwrap();
    assert_eq!(state.value, StateValue::NotRegulated);
    assert_eq!(state.sources.len(), 1);
}

#[test]
fn test_withdrawal_restores_previous_text() {
    let (mut s, b1) = amended_instrument().unwrap();
    let accepted = s.withdraw(b1, 2, "2023-08-01").unwrap();
    assert_eq!(accepted.report.affected_from, Some(legal("2023-06-01")));

    assert_eq!(content(&s, "2023-07-01", "2023-07-01").as_deref(), Some("amended"));
    assert_eq!(content(&s, "2023-07-01", "2023-08-01").as_deref(), Some("orig"));

    let entries = s
        .engine
        .knowledge_timeline(&s.instrument, legal("2023-07-01"))
        .unwrap();
    assert!(properties::knowledge_timeline_collapsed(&entries));
    let answers: Vec<_> = entries
        .iter()
        .map(|e| e.state.content().map(|c| c.as_str().to_string()))
        .collect();
    assert_eq!(
        answers,
        vec![
            Some("orig".to_string()),
            Some("amended".to_string()),
            Some("orig".to_string())
        ]
    );
}

// ============================================================================
// DERIVED BRANCHES AND TRIALS
// ============================================================================

#[test]
fn test_derived_branch_inherits_base() {
    let (mut s, b1) = amended_instrument().unwrap();
    let horizons = s.engine.horizons(&s.instrument).unwrap();

    let b2 = s.derived("feature", b1, 1).unwrap();
    assert_eq!(s.engine.horizons(&s.instrument).unwrap(), horizons);
    assert_eq!(
        s.engine.ancestry(b2).unwrap(),
        vec![(b2, None), (b1, Some(VersionNumber::FIRST))]
    );

    // feature only adds text from 2024; its inherited base disagrees with
    // main's amendment from 2023-06-01, so precedence is required
    let err = s.amend(b2, "2024-01-01", "2023-09-01", "feature").unwrap_err();
    assert!(matches!(err, RegulaError::AmbiguousState { .. }));

    s.set_priority(&[b1, b2]).unwrap();
    s.amend(b2, "2024-01-01", "2023-09-01", "feature").unwrap();
    assert_eq!(content(&s, "2023-07-01", "2023-09-01").as_deref(), Some("amended"));
    assert_eq!(content(&s, "2024-02-01", "2023-09-01").as_deref(), Some("amended"));

    s.set_priority(&[b2, b1]).unwrap();
    s.amend(b2, "2024-02-01", "2023-10-01", "feature 2").unwrap();
    assert_eq!(content(&s, "2024-03-01", "2023-10-01").as_deref(), Some("feature 2"));
    // horizons before the new record keep the precedence they were built with
    assert_eq!(content(&s, "2024-02-01", "2023-09-01").as_deref(), Some("amended"));
}

#[test]
fn test_backdated_record_rebuilds_under_current_priority() {
    let mut s = Scenario::with_config(EngineConfig::lenient(), "X");
    let b1 = s.branch("main").unwrap();
    let b2 = s.branch("other").unwrap();
    s.amend(b1, "2023-01-01", "2023-01-01", "a").unwrap();
    s.set_priority(&[b1, b2]).unwrap();
    s.amend(b2, "2023-01-01", "2023-02-01", "b").unwrap();
    assert_eq!(content(&s, "2023-06-01", "2023-02-01").as_deref(), Some("a"));

    s.set_priority(&[b2, b1]).unwrap();
    assert_eq!(content(&s, "2023-06-01", "2023-02-01").as_deref(), Some("a"));

    let accepted = s.amend(b1, "2024-01-01", "2023-01-15", "c").unwrap();
    assert_eq!(accepted.report.rebuilt_from, known("2023-01-15"));
    // the stored 2023-02-01 horizon is rebuilt with the new order
    assert_eq!(content(&s, "2023-06-01", "2023-02-01").as_deref(), Some("b"));
    assert_eq!(content(&s, "2023-06-01", "2023-01-15").as_deref(), Some("a"));
    assert_eq!(content(&s, "2023-06-01", "2023-01-01").as_deref(), Some("a"));
}

#[test]
fn test_parent_withdrawal_removes_inherited_record() {
    let mut s = Scenario::new("X");
    let b1 = s.branch("main").unwrap();
    s.amend(b1, "2023-01-01", "2022-12-01", "orig").unwrap();
    let b2 = s.derived("feature", b1, 1).unwrap();
    s.set_priority(&[b2, b1]).unwrap();
    s.amend(b2, "2023-09-01", "2023-08-01", "feature").unwrap();

    s.withdraw(b1, 1, "2024-01-01").unwrap();

    let state = s
        .engine
        .resolve(&s.instrument, legal("2023-03-01"), known("2024-06-01"))
        .unwrap()
        .into_known()
        .unwrap();
    assert_eq!(state.value, StateValue::NotRegulated);
    assert!(state.sources.is_empty());
    assert_eq!(content(&s, "2023-10-01", "2024-06-01").as_deref(), Some("feature"));

    // earlier horizons still carry the inherited text
    assert_eq!(content(&s, "2023-03-01", "2023-12-01").as_deref(), Some("orig"));
}

#[test]
fn test_derive_from_unknown_version() {
    let (mut s, b1) = amended_instrument().unwrap();
    let err = s.derived("feature", b1, 7).unwrap_err();
    assert!(matches!(err, RegulaError::UnknownParentVersion { .. }));
    assert_eq!(s.engine.list_branches(&s.instrument).unwrap().len(), 1);
}

#[test]
fn test_trial_isolation() {
    let (s, b1) = amended_instrument().unwrap();
    let before = s.engine.resolve(&s.instrument, legal("2023-07-01"), known("2024-06-01")).unwrap();

    let draft = s
        .draft(b1, "2023-09-01", "2024-01-01", Change::content("draft"))
        .unwrap();
    let trial = s.engine.run_trial(&s.instrument, vec![draft]).unwrap();

    let committed = s.engine.snapshot(&s.instrument).unwrap();
    assert_eq!(trial.differs_from(&committed.history), vec![known("2024-01-01")]);

    let after = s.engine.resolve(&s.instrument, legal("2023-07-01"), known("2024-06-01")).unwrap();
    assert_eq!(before, after);
    assert_eq!(s.engine.records(b1).unwrap().len(), 2);
}

#[test]
fn test_trial_surfaces_ambiguity() {
    let (s, _b1, b2) = competing_branches().unwrap();
    let draft = s
        .draft(b2, "2023-01-01", "2022-12-01", Change::content("other"))
        .unwrap();
    let err = s.engine.run_trial(&s.instrument, vec![draft]).unwrap_err();
    assert!(matches!(err, RegulaError::AmbiguousState { .. }));
}

#[test]
fn test_unknown_lookups() {
    let (s, _) = amended_instrument().unwrap();
    let err = s
        .engine
        .legal_timeline(&InstrumentId::new("missing"), known("2024-01-01"))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Lookup);
    assert!(s.engine.workflow_state(BranchId::new(999)).is_err());
}
