//! Farmer Model Tests
//!
//! The farmer is stepped by hand: every zero time-advance is fired (output
//! first, then the internal transition) until the model settles.

use agrisim_core::decision::names;
use agrisim_core::dynamics::{AtomicModel, FarmerConfig, FarmerModel, FarmerPhase, PlotConfig};
use agrisim_core::models::{ports, Ack, AckOrder, Order, ResourceCommand, WeatherObservation};
use agrisim_core::{
    ActivityState, ExternalEvent, ModelingError, RngManager, SimTime, SimulationError, StateError,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn t(value: f64) -> SimTime {
    SimTime::new(value)
}

fn farmer(plan: &str) -> FarmerModel {
    let mut plot = PlotConfig::new("p0");
    plot.area = 12.0;
    let mut config = FarmerConfig {
        plots: vec![plot, PlotConfig::new("p1")],
        history_capacity: 3,
        plan: serde_json::from_str(plan).unwrap(),
        ..FarmerConfig::default()
    };
    config.durations.speeds.insert("Seed".to_string(), 4.0);
    FarmerModel::new(&config, RngManager::new(7)).unwrap()
}

/// Fire every immediate internal transition at `now`, collecting commands
fn settle(model: &mut FarmerModel, now: SimTime) -> Vec<ResourceCommand> {
    let mut commands = Vec::new();
    for _ in 0..16 {
        if model.time_advance() != SimTime::ZERO {
            return commands;
        }
        for event in model.output(now) {
            assert!(event.on_port(ports::OS));
            commands.push(ResourceCommand::from_event(&event).unwrap());
        }
        model.internal_transition(now).unwrap();
    }
    panic!("farmer did not settle at {}", now);
}

fn ack(activity: &str, order: AckOrder) -> ExternalEvent {
    Ack {
        resource: Some("p0".to_string()),
        activity: activity.to_string(),
        order,
    }
    .to_event(ports::ACK)
}

fn state(model: &FarmerModel, name: &str) -> ActivityState {
    model.knowledge_base().activity(name).unwrap().state()
}

const SEED_ONLY: &str = r#"{"activities": [{"name": "Seed_WW_p0"}]}"#;

// ============================================================================
// Phases and Commands
// ============================================================================

#[test]
fn test_init_processes_immediately() {
    let mut model = farmer(SEED_ONLY);
    assert_eq!(model.init(t(0.0)).unwrap(), SimTime::ZERO);
    assert_eq!(model.phase(), FarmerPhase::Init);

    let commands = settle(&mut model, t(0.0));

    assert_eq!(model.phase(), FarmerPhase::Process);
    assert!(model.time_advance().is_infinity());
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].resource, "p0");
    assert_eq!(commands[0].order, Order::Sow);
    assert_eq!(commands[0].activity, "Seed_WW_p0");
    // 12 area units at 4 per day
    assert_eq!(commands[0].duration, 3.0);
}

#[test]
fn test_output_only_in_output_phase() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    assert!(model.output(t(0.0)).is_empty());
    model.internal_transition(t(0.0)).unwrap();
    assert_eq!(model.phase(), FarmerPhase::Process);
    assert!(model.output(t(0.0)).is_empty());

    model.internal_transition(t(0.0)).unwrap();
    assert_eq!(model.phase(), FarmerPhase::Output);
    assert_eq!(model.output(t(0.0)).len(), 1);
}

#[test]
fn test_default_duration_without_speed() {
    let mut model = farmer(r#"{"activities": [{"name": "Harvest_WW_p1"}]}"#);
    model.init(t(0.0)).unwrap();

    let commands = settle(&mut model, t(0.0));
    assert_eq!(commands[0].order, Order::Harvest);
    assert_eq!(commands[0].duration, 1.0);
}

#[test]
fn test_waits_until_next_check() {
    let mut model = farmer(r#"{"activities": [{"name": "Seed_WW_p0", "window": {"earliest_start": 5}}]}"#);
    model.init(t(0.0)).unwrap();

    assert!(settle(&mut model, t(0.0)).is_empty());
    assert_eq!(model.time_advance(), t(5.0));

    // Process fires at 5, re-evaluates in Output and starts the activity
    model.internal_transition(t(5.0)).unwrap();
    assert_eq!(model.phase(), FarmerPhase::Output);
    let commands = settle(&mut model, t(5.0));
    assert_eq!(commands.len(), 1);
    assert_eq!(state(&model, "Seed_WW_p0"), ActivityState::Started);
}

// ============================================================================
// Acknowledgements
// ============================================================================

#[test]
fn test_done_ack_sends_stop() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();
    settle(&mut model, t(0.0));

    model
        .external_transition(t(3.0), &[ack("Seed_WW_p0", AckOrder::Done)])
        .unwrap();
    assert_eq!(model.phase(), FarmerPhase::UpdateFact);
    assert_eq!(state(&model, "Seed_WW_p0"), ActivityState::Done);

    let commands = settle(&mut model, t(3.0));
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].order, Order::Stop);
    assert_eq!(commands[0].duration, 0.0);
    assert_eq!(model.observation("Seed_WW_p0"), Some("done".to_string()));
}

#[test]
fn test_fail_ack() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();
    settle(&mut model, t(0.0));

    model
        .external_transition(t(1.0), &[ack("Seed_WW_p0", AckOrder::Fail)])
        .unwrap();
    assert_eq!(state(&model, "Seed_WW_p0"), ActivityState::Failed);
}

#[test]
fn test_ack_for_unknown_activity() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    assert_eq!(
        model.external_transition(t(0.0), &[ack("Seed_WW_p1", AckOrder::Done)]),
        Err(SimulationError::State(StateError::UnknownActivity(
            "Seed_WW_p1".to_string()
        )))
    );
}

#[test]
fn test_ack_after_forced_finish_ignored() {
    let mut model =
        farmer(r#"{"activities": [{"name": "Seed_WW_p0", "window": {"latest_finish": 2}}]}"#);
    model.init(t(0.0)).unwrap();
    settle(&mut model, t(0.0));
    assert_eq!(model.time_advance(), t(2.0));

    model.internal_transition(t(2.0)).unwrap();
    let commands = settle(&mut model, t(2.0));
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].order, Order::Stop);
    assert_eq!(state(&model, "Seed_WW_p0"), ActivityState::FinishedByForce);

    model
        .external_transition(t(3.0), &[ack("Seed_WW_p0", AckOrder::Done)])
        .unwrap();
    assert_eq!(state(&model, "Seed_WW_p0"), ActivityState::FinishedByForce);
}

#[test]
fn test_malformed_ack_rejected() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    let event = ExternalEvent::new(ports::ACK)
        .with("activity", "Seed_WW_p0")
        .with("order", "maybe");
    assert_eq!(
        model.external_transition(t(0.0), &[event]),
        Err(SimulationError::Modeling(ModelingError::UnknownOrder(
            "maybe".to_string()
        )))
    );
}

// ============================================================================
// Facts from the environment
// ============================================================================

#[test]
fn test_weather_updates_forecasts_and_history() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    for (day, rain) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        let event = WeatherObservation { rain, etp: 0.5 }.to_event(ports::METEO);
        model.external_transition(t(day as f64), &[event]).unwrap();
    }

    let memory = model.knowledge_base().memory();
    assert_eq!(memory.number(names::RAIN).unwrap(), 4.0);
    assert_eq!(memory.number(names::ETP).unwrap(), 0.5);
    // Most recent first, capped at the history capacity
    assert_eq!(memory.series(names::RAIN_HISTORY).unwrap(), &[4.0, 3.0, 2.0]);
    assert_eq!(memory.series(names::RAIN_FORECAST).unwrap()[..2], [3.0, 4.0]);
    assert_eq!(model.rain_forecast().current(), 4.0);
    assert_eq!(model.etp_forecast().previous(), 0.5);
}

#[test]
fn test_plot_report_triggers_rule() {
    let mut model = farmer(
        r#"{
            "rules": [{"id": "mature", "predicates": [{"predicate": "harvestable"}]}],
            "activities": [{"name": "Harvest_WW_p0", "rules": ["mature"]}]
        }"#,
    );
    model.init(t(0.0)).unwrap();
    assert!(settle(&mut model, t(0.0)).is_empty());
    assert!(model.time_advance().is_infinity());

    let report = ExternalEvent::new("p0")
        .with("harvestable", true)
        .with("ru", 22.0);
    model.external_transition(t(40.0), &[report]).unwrap();

    let commands = settle(&mut model, t(40.0));
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].activity, "Harvest_WW_p0");
    assert_eq!(
        model.knowledge_base().memory().number("ru.p0").unwrap(),
        22.0
    );
}

#[test]
fn test_generic_fact_from_init_attribute() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    let event = ExternalEvent::new("irrigation").with("init", true);
    model.external_transition(t(0.0), &[event]).unwrap();
    assert!(model.knowledge_base().memory().flag("irrigation").unwrap());
}

#[test]
fn test_unconfigured_plot_rejected_whatever_the_payload() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    for event in [
        ExternalEvent::new("p9").with("value", 12.0),
        ExternalEvent::new("p9").with("ru", 12.0),
        ExternalEvent::new("p9"),
    ] {
        assert_eq!(
            model.external_transition(t(0.0), &[event]),
            Err(SimulationError::State(StateError::UnknownResource(
                "p9".to_string()
            )))
        );
    }
    assert!(model.knowledge_base().memory().number("p9").is_err());
}

#[test]
fn test_fact_port_without_value_rejected() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    let event = ExternalEvent::new("price");
    assert_eq!(
        model.external_transition(t(0.0), &[event]),
        Err(SimulationError::Modeling(ModelingError::NoValue(
            "price".to_string()
        )))
    );
}

#[test]
fn test_observation_ports() {
    let mut model = farmer(SEED_ONLY);
    model.init(t(0.0)).unwrap();

    assert_eq!(model.observation("phase"), Some("init".to_string()));
    assert_eq!(model.observation("Seed_WW_p0"), Some("wait".to_string()));
    assert_eq!(model.observation("Seed_WW_p9"), None);
}

#[test]
fn test_duplicate_plot_rejected() {
    let config = FarmerConfig {
        plots: vec![PlotConfig::new("p0"), PlotConfig::new("p0")],
        ..FarmerConfig::default()
    };
    assert!(FarmerModel::new(&config, RngManager::new(1)).is_err());
}
