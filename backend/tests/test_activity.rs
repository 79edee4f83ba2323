//! Activity Model Tests
//!
//! Name parsing, initial state and the lifecycle as driven through the
//! knowledge base (transitions are not public on Activity itself).

use agrisim_core::decision::KnowledgeBase;
use agrisim_core::models::{Activity, ActivityKey, ActivityState, TemporalWindow};
use agrisim_core::{ConfigurationError, SimTime, StateError};

// ============================================================================
// Test Helpers
// ============================================================================

fn kb_with(names: &[&str]) -> KnowledgeBase {
    let mut kb = KnowledgeBase::default();
    for name in names {
        kb.add_activity(Activity::new(*name).unwrap()).unwrap();
    }
    kb
}

fn states(activity: &Activity) -> Vec<ActivityState> {
    activity.history().iter().map(|(state, _)| *state).collect()
}

// ============================================================================
// Name Parsing
// ============================================================================

#[test]
fn test_three_token_name() {
    let key = ActivityKey::parse("Harvest_WW_p12").unwrap();
    assert_eq!(key.operation, "Harvest");
    assert_eq!(key.crop, "WW");
    assert_eq!(key.plot, "p12");
    assert_eq!(key.index, None);
    assert_eq!(key.year, None);
}

#[test]
fn test_five_token_name() {
    let key = ActivityKey::parse("Seed_3_OSR_2013_p1").unwrap();
    assert_eq!(key.operation, "Seed");
    assert_eq!(key.index, Some(3));
    assert_eq!(key.crop, "OSR");
    assert_eq!(key.year, Some(2013));
    assert_eq!(key.plot, "p1");
}

#[test]
fn test_bad_names_are_configuration_errors() {
    for name in ["Seed", "Seed_WW", "Seed_1_WW_p0", "a_b_c_d_e_f", "Seed_x_WW_2013_p0", ""] {
        let err = Activity::new(name).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::BadActivityName { .. }),
            "{} gave {:?}",
            name,
            err
        );
    }
}

#[test]
fn test_new_activity_defaults() {
    let activity = Activity::new("Seed_WW_p0").unwrap();

    assert_eq!(activity.state(), ActivityState::Wait);
    assert!(activity.started_at().is_neg_infinity());
    assert!(activity.done_at().is_neg_infinity());
    assert!(activity.rules().is_empty());
    assert!(activity.constraints().is_empty());
    assert!(activity.earliest_start().is_neg_infinity());
    assert!(activity.latest_start().is_infinity());
    assert!(activity.latest_finish().is_infinity());
}

#[test]
fn test_builders() {
    let activity = Activity::new("Harvest_WW_p0")
        .unwrap()
        .with_rule("mature")
        .with_rule("mature")
        .with_constraint("Seed_WW_p0", 30.0)
        .with_window(TemporalWindow {
            earliest_start: Some(10.0),
            latest_start: None,
            latest_finish: Some(200.0),
        });

    assert_eq!(activity.rules().len(), 1);
    assert_eq!(activity.constraints()[0].other, "Seed_WW_p0");
    assert_eq!(activity.constraints()[0].min_delay, 30.0);
    assert_eq!(activity.earliest_start(), SimTime::new(10.0));
    assert_eq!(activity.latest_finish(), SimTime::new(200.0));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_started_then_done() {
    let mut kb = kb_with(&["Seed_WW_p0"]);

    kb.process_changes(SimTime::new(10.0)).unwrap();
    kb.set_activity_done("Seed_WW_p0", SimTime::new(15.0)).unwrap();

    let activity = kb.activity("Seed_WW_p0").unwrap();
    assert_eq!(activity.state(), ActivityState::Done);
    assert_eq!(activity.started_at(), SimTime::new(10.0));
    assert_eq!(activity.done_at(), SimTime::new(15.0));
    assert_eq!(
        states(activity),
        vec![ActivityState::Wait, ActivityState::Started, ActivityState::Done]
    );
}

#[test]
fn test_started_then_failed() {
    let mut kb = kb_with(&["Seed_WW_p0"]);

    kb.process_changes(SimTime::ZERO).unwrap();
    kb.set_activity_failed("Seed_WW_p0", SimTime::new(2.0)).unwrap();

    let activity = kb.activity("Seed_WW_p0").unwrap();
    assert_eq!(activity.state(), ActivityState::Failed);
    assert_eq!(activity.done_at(), SimTime::new(2.0));
}

#[test]
fn test_ack_before_start_rejected() {
    let mut kb = kb_with(&["Seed_WW_p0"]);

    let err = kb.set_activity_done("Seed_WW_p0", SimTime::ZERO).unwrap_err();
    assert_eq!(
        err,
        StateError::ActivityNotStarted {
            activity: "Seed_WW_p0".to_string(),
            state: "wait".to_string(),
        }
    );
    assert_eq!(
        kb.activity("Seed_WW_p0").unwrap().state(),
        ActivityState::Wait
    );
}

#[test]
fn test_second_ack_rejected() {
    let mut kb = kb_with(&["Seed_WW_p0"]);
    kb.process_changes(SimTime::ZERO).unwrap();
    kb.set_activity_done("Seed_WW_p0", SimTime::new(1.0)).unwrap();

    assert!(matches!(
        kb.set_activity_failed("Seed_WW_p0", SimTime::new(2.0)),
        Err(StateError::ActivityNotStarted { .. })
    ));
    assert_eq!(
        kb.activity("Seed_WW_p0").unwrap().done_at(),
        SimTime::new(1.0)
    );
}

#[test]
fn test_terminal_activity_never_restarts() {
    let mut kb = kb_with(&["Seed_WW_p0"]);
    kb.process_changes(SimTime::ZERO).unwrap();
    kb.set_activity_done("Seed_WW_p0", SimTime::new(1.0)).unwrap();
    kb.clear_latest();

    let result = kb.process_changes(SimTime::new(5.0)).unwrap();
    assert!(!result.has_immediate_change);
    assert!(kb.latest().started.is_empty());
    assert_eq!(
        states(kb.activity("Seed_WW_p0").unwrap()).len(),
        3,
        "no state entered after Done"
    );
}

#[test]
fn test_state_strings() {
    assert_eq!(ActivityState::Wait.to_string(), "wait");
    assert_eq!(ActivityState::Started.to_string(), "started");
    assert_eq!(ActivityState::Done.to_string(), "done");
    assert_eq!(ActivityState::Failed.to_string(), "failed");
    assert_eq!(ActivityState::FinishedByForce.to_string(), "ff");
    assert!(ActivityState::FinishedByForce.is_terminal());
    assert!(!ActivityState::Started.is_terminal());
}
