//! Knowledge Base Tests
//!
//! Plan loading and validation, rule evaluation against facts, and the
//! start/expiry/force passes of `process_changes`.

use agrisim_core::decision::{
    names, ActivityConfig, DecisionPlan, KnowledgeBase, PredicateRegistry,
};
use agrisim_core::models::{Activity, ActivityState, TemporalWindow};
use agrisim_core::{ConfigurationError, SimTime, SimulationError, StateError};

// ============================================================================
// Test Helpers
// ============================================================================

fn plan(json: &str) -> DecisionPlan {
    serde_json::from_str(json).unwrap()
}

fn kb(json: &str) -> KnowledgeBase {
    KnowledgeBase::from_plan(&plan(json), PredicateRegistry::farm()).unwrap()
}

fn state(kb: &KnowledgeBase, name: &str) -> ActivityState {
    kb.activity(name).unwrap().state()
}

const DRY_OR_MATURE: &str = r#"{
    "rules": [
        {"id": "dry", "predicates": [
            {"predicate": "penetrability",
             "params": {"penetrability_operator": "<", "penetrability_threshold": 30}}
        ]},
        {"id": "mature", "predicates": [{"predicate": "harvestable"}]}
    ],
    "activities": [
        {"name": "Seed_WW_p0", "rules": ["dry", "mature"]}
    ]
}"#;

// ============================================================================
// Plan Validation
// ============================================================================

#[test]
fn test_plan_keeps_declaration_order() {
    let kb = kb(r#"{
        "activities": [
            {"name": "Seed_WW_p1"},
            {"name": "Seed_WW_p0"},
            {"name": "Harvest_WW_p0", "precedences": [{"other": "Seed_WW_p0"}]}
        ]
    }"#);

    let names: Vec<&str> = kb.activities().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec!["Seed_WW_p1", "Seed_WW_p0", "Harvest_WW_p0"]);
    assert_eq!(
        kb.activity("Harvest_WW_p0").unwrap().constraints()[0].min_delay,
        0.0
    );
}

#[test]
fn test_unknown_predicate_rejected() {
    let result = KnowledgeBase::from_plan(
        &plan(r#"{"rules": [{"id": "r", "predicates": [{"predicate": "frost"}]}]}"#),
        PredicateRegistry::farm(),
    );
    assert_eq!(
        result.unwrap_err(),
        ConfigurationError::UnknownPredicate("frost".to_string())
    );
}

#[test]
fn test_unknown_rule_rejected() {
    let result = KnowledgeBase::from_plan(
        &plan(r#"{"activities": [{"name": "Seed_WW_p0", "rules": ["typo"]}]}"#),
        PredicateRegistry::farm(),
    );
    assert_eq!(
        result.unwrap_err(),
        ConfigurationError::UnknownRule {
            activity: "Seed_WW_p0".to_string(),
            rule: "typo".to_string(),
        }
    );
}

#[test]
fn test_unknown_constraint_target_rejected() {
    let result = KnowledgeBase::from_plan(
        &plan(
            r#"{"activities": [
                {"name": "Harvest_WW_p0", "precedences": [{"other": "Seed_WW_p0", "min_delay": 3}]}
            ]}"#,
        ),
        PredicateRegistry::farm(),
    );
    assert!(matches!(
        result,
        Err(ConfigurationError::UnknownConstraintTarget { .. })
    ));
}

#[test]
fn test_duplicate_rule_rejected() {
    let result = KnowledgeBase::from_plan(
        &plan(r#"{"rules": [{"id": "r"}, {"id": "r"}]}"#),
        PredicateRegistry::farm(),
    );
    assert!(matches!(result, Err(ConfigurationError::Duplicate(_))));
}

#[test]
fn test_bad_activity_name_rejected() {
    let result = KnowledgeBase::from_plan(
        &plan(r#"{"activities": [{"name": "Seed-WW-p0"}]}"#),
        PredicateRegistry::farm(),
    );
    assert!(matches!(
        result,
        Err(ConfigurationError::BadActivityName { .. })
    ));
}

#[test]
fn test_non_finite_window_rejected() {
    let mut kb = KnowledgeBase::new(PredicateRegistry::farm());

    let activity = Activity::new("Seed_WW_p0").unwrap().with_window(TemporalWindow {
        earliest_start: Some(f64::NAN),
        ..TemporalWindow::default()
    });
    assert!(matches!(
        kb.add_activity(activity),
        Err(ConfigurationError::Invalid(_))
    ));
    assert!(kb.activity("Seed_WW_p0").is_none());

    let config = ActivityConfig {
        name: "Harvest_WW_p0".to_string(),
        rules: Vec::new(),
        precedences: Vec::new(),
        window: TemporalWindow {
            latest_finish: Some(f64::INFINITY),
            ..TemporalWindow::default()
        },
    };
    assert!(matches!(config.build(), Err(ConfigurationError::Invalid(_))));

    let finite = Activity::new("Seed_WW_p0").unwrap().with_window(TemporalWindow {
        earliest_start: Some(2.0),
        latest_start: Some(60.0),
        latest_finish: None,
    });
    kb.add_activity(finite).unwrap();
    kb.process_changes(SimTime::new(0.0)).unwrap();
    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::Wait);
}

#[test]
fn test_non_finite_precedence_delay_rejected() {
    let mut kb = KnowledgeBase::new(PredicateRegistry::farm());
    let activity = Activity::new("Harvest_WW_p0")
        .unwrap()
        .with_constraint("Seed_WW_p0", f64::NAN);
    assert!(matches!(
        kb.add_activity(activity),
        Err(ConfigurationError::Invalid(_))
    ));
}

// ============================================================================
// Rules and Facts
// ============================================================================

#[test]
fn test_facts_do_not_start_activities_by_themselves() {
    let mut kb = kb(DRY_OR_MATURE);
    kb.apply_fact(names::ru("p0"), 10.0);
    kb.apply_fact(names::harvestable("p0"), false);

    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::Wait);
    assert!(!kb.has_latest());
    assert_eq!(kb.memory().number("ru.p0").unwrap(), 10.0);
}

#[test]
fn test_any_rule_may_start() {
    let mut kb = kb(DRY_OR_MATURE);
    kb.apply_fact(names::ru("p0"), 35.0);
    kb.apply_fact(names::harvestable("p0"), false);

    let result = kb.process_changes(SimTime::new(1.0)).unwrap();
    assert!(!result.has_immediate_change);
    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::Wait);

    kb.apply_fact(names::harvestable("p0"), true);
    let result = kb.process_changes(SimTime::new(2.0)).unwrap();
    assert!(result.has_immediate_change);
    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::Started);
}

#[test]
fn test_rule_predicates_are_a_conjunction() {
    let mut kb = kb(r#"{
        "rules": [
            {"id": "dry_and_mature", "predicates": [
                {"predicate": "harvestable"},
                {"predicate": "penetrability",
                 "params": {"penetrability_operator": "<", "penetrability_threshold": 30}}
            ]}
        ],
        "activities": [{"name": "Harvest_WW_p0", "rules": ["dry_and_mature"]}]
    }"#);
    kb.apply_fact(names::harvestable("p0"), true);
    kb.apply_fact(names::ru("p0"), 31.0);

    kb.process_changes(SimTime::ZERO).unwrap();
    assert_eq!(state(&kb, "Harvest_WW_p0"), ActivityState::Wait);

    kb.apply_fact(names::ru("p0"), 29.0);
    kb.process_changes(SimTime::new(1.0)).unwrap();
    assert_eq!(state(&kb, "Harvest_WW_p0"), ActivityState::Started);
}

#[test]
fn test_predicate_error_propagates() {
    let mut kb = kb(DRY_OR_MATURE);

    let err = kb.process_changes(SimTime::ZERO).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Configuration(ConfigurationError::MissingFact("ru.p0".to_string()))
    );
}

#[test]
fn test_rule_lookup() {
    let kb = kb(DRY_OR_MATURE);
    assert_eq!(kb.rule("dry").unwrap().predicates.len(), 1);
    assert!(kb.rule("wet").is_none());
}

// ============================================================================
// Windows, Precedences and Forced Ends
// ============================================================================

#[test]
fn test_precedence_delay_and_window_combined() {
    let mut kb = kb(r#"{
        "activities": [
            {"name": "Seed_WW_p0"},
            {"name": "Harvest_WW_p0",
             "precedences": [{"other": "Seed_WW_p0", "min_delay": 5}],
             "window": {"earliest_start": 8}}
        ]
    }"#);

    let result = kb.process_changes(SimTime::ZERO).unwrap();
    assert_eq!(result.next_check, SimTime::new(5.0));

    let result = kb.process_changes(SimTime::new(5.0)).unwrap();
    assert!(!result.has_immediate_change);
    assert_eq!(result.next_check, SimTime::new(8.0));

    kb.process_changes(SimTime::new(8.0)).unwrap();
    assert_eq!(state(&kb, "Harvest_WW_p0"), ActivityState::Started);
}

#[test]
fn test_waiting_on_failed_predecessor_expires() {
    let mut kb = kb(r#"{
        "rules": [{"id": "mature", "predicates": [{"predicate": "harvestable"}]}],
        "activities": [
            {"name": "Seed_WW_p0", "rules": ["mature"], "window": {"latest_start": 3}},
            {"name": "Harvest_WW_p0",
             "precedences": [{"other": "Seed_WW_p0"}],
             "window": {"latest_start": 6}}
        ]
    }"#);
    kb.apply_fact(names::harvestable("p0"), false);

    let result = kb.process_changes(SimTime::ZERO).unwrap();
    assert_eq!(result.next_check, SimTime::new(3.0));

    kb.process_changes(SimTime::new(3.0)).unwrap();
    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::Failed);

    let result = kb.process_changes(SimTime::new(6.0)).unwrap();
    assert!(result.has_immediate_change);
    assert_eq!(state(&kb, "Harvest_WW_p0"), ActivityState::Failed);
    assert!(kb.all_terminal());
    assert!(result.next_check.is_infinity());
}

#[test]
fn test_ack_after_forced_end_rejected() {
    let mut kb = kb(r#"{"activities": [{"name": "Seed_WW_p0", "window": {"latest_finish": 2}}]}"#);

    kb.process_changes(SimTime::ZERO).unwrap();
    kb.process_changes(SimTime::new(2.0)).unwrap();
    assert_eq!(state(&kb, "Seed_WW_p0"), ActivityState::FinishedByForce);

    assert!(matches!(
        kb.set_activity_done("Seed_WW_p0", SimTime::new(3.0)),
        Err(StateError::ActivityNotStarted { .. })
    ));
}

#[test]
fn test_latest_lists_accumulate_until_drained() {
    let mut kb = kb(r#"{"activities": [{"name": "Seed_WW_p0"}, {"name": "Seed_WW_p1"}]}"#);

    kb.process_changes(SimTime::ZERO).unwrap();
    kb.set_activity_done("Seed_WW_p0", SimTime::new(1.0)).unwrap();
    kb.set_activity_failed("Seed_WW_p1", SimTime::new(1.0)).unwrap();

    let latest = kb.take_latest();
    assert_eq!(latest.started.len(), 2);
    assert_eq!(latest.done, vec!["Seed_WW_p0".to_string()]);
    assert_eq!(latest.failed, vec!["Seed_WW_p1".to_string()]);
    assert!(latest.ended.is_empty());
    assert!(kb.latest().is_empty());
    assert!(kb.all_terminal());
}
