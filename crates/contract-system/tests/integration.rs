//! End-to-end tests for the contract system

use contract_system::{
    BudgetScope, BudgetThresholds, CleanupOptions, ContractConfig, ContractSystem, FieldKind,
    FieldSpec, HealthStatus, LifecycleState, Metric, ObserverError, PerformanceSample,
    SchemaDefinition, ViolationEvent, ViolationKind,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn widget_schema() -> SchemaDefinition {
    SchemaDefinition::new("widget", "A dashboard widget")
        .field(FieldSpec::required("id").kind(FieldKind::String))
        .field(FieldSpec::required("size").kind(FieldKind::Number).range(Some(0.0), Some(100.0)))
        .field(FieldSpec::optional("theme").one_of([json!("light"), json!("dark")]))
}

#[test]
fn test_widget_scenario() {
    let system = ContractSystem::with_defaults().unwrap();
    system.register_schema(widget_schema()).unwrap();

    let ok = system
        .validate("widget", &json!({"id": "w1", "size": 10, "theme": "dark"}))
        .unwrap();
    assert!(ok.is_valid);
    assert!(ok.errors.is_empty());
    assert!(system.check_system_health().is_healthy());

    let bad = system.validate("widget", &json!({"theme": "neon"})).unwrap();
    assert!(!bad.is_valid);
    assert_eq!(bad.errors.len(), 3);
    assert_eq!(bad.errors_for("id").count(), 1);
    assert_eq!(bad.errors_for("size").count(), 1);
    assert_eq!(bad.errors_for("theme").count(), 1);

    let health = system.check_system_health();
    assert_eq!(health.overall, HealthStatus::Warning);
    assert_eq!(health.metrics.total_violations, 1);
    assert_eq!(health.metrics.validations.failed, 1);

    let event = &system.bus().history(Some(1))[0];
    assert_eq!(event.kind, ViolationKind::SchemaViolation);
    assert!(event.message.contains("widget"));
}

#[test]
fn test_duplicate_schema_keeps_first_definition() {
    let system = ContractSystem::with_defaults().unwrap();
    system.register_schema(widget_schema()).unwrap();

    let replacement = SchemaDefinition::new("widget", "other").field(FieldSpec::required("x"));
    assert!(system.register_schema(replacement).is_err());
    assert_eq!(system.get_schema("widget").unwrap().description, "A dashboard widget");
}

#[test]
fn test_unknown_schema_is_an_error() {
    let system = ContractSystem::with_defaults().unwrap();
    let err = system.validate("ghost", &json!({})).unwrap_err();
    assert!(err.is_lookup_error());
    assert!(system.bus().is_empty());
}

#[test]
fn test_violation_history_is_bounded() {
    let capacity = 5;
    let system = ContractSystem::new(ContractConfig::builder().violation_history(capacity).build())
        .unwrap();
    system.register_schema(widget_schema()).unwrap();

    for i in 0..capacity + 5 {
        system
            .validate("widget", &json!({"id": format!("w{}", i)}))
            .unwrap();
    }

    let history = system.bus().history(None);
    assert_eq!(history.len(), capacity);
    // Newest first: the last validation's violation leads
    assert!(history[0].timestamp >= history[capacity - 1].timestamp);
}

#[test]
fn test_failing_observer_does_not_block_others() {
    let system = ContractSystem::with_defaults().unwrap();
    system.register_schema(widget_schema()).unwrap();

    let received = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&received);

    let _failing = system.bus().subscribe(|_: &ViolationEvent| -> Result<(), ObserverError> {
        Err(ObserverError::new("observer offline"))
    });
    let _panicking = system
        .bus()
        .subscribe(|_: &ViolationEvent| -> Result<(), ObserverError> { panic!("observer bug") });
    let _counting = system.use_contract_monitor("all", move |_| {
        *counter.lock().unwrap() += 1;
    });

    system.validate("widget", &json!({})).unwrap();
    system.validate("widget", &json!({})).unwrap();

    assert_eq!(*received.lock().unwrap(), 2);
    assert_eq!(system.metrics().observer_failures(), 4.0);
}

#[test]
fn test_lifecycle_with_budgets() {
    let system = ContractSystem::new(
        ContractConfig::builder()
            .render_time_budget(10.0)
            .tolerance_factor(2.0)
            .build(),
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _monitor = system.use_contract_monitor("Chart", move |event| {
        sink.lock().unwrap().push(event.severity);
    });

    let chart = system.use_component_lifecycle("Chart", "chart");
    chart.mounted();
    chart.updated(&PerformanceSample::render_time(10.0));
    chart.updated(&PerformanceSample::render_time(20.0));
    chart.updated(&PerformanceSample::render_time(30.0));
    chart.updated(&PerformanceSample::render_time(30.0));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![HealthStatus::Warning, HealthStatus::Critical]
    );

    let report = system.budgets().get_budget_status(&BudgetScope::component("Chart"));
    assert_eq!(report.overall, HealthStatus::Critical);
    assert_eq!(system.check_system_health().overall, HealthStatus::Critical);

    chart.updated(&PerformanceSample::render_time(5.0));
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(system.check_system_health().budget_status, HealthStatus::Healthy);

    drop(chart);
    let instance = system.lifecycle().get_instance("Chart").unwrap();
    assert_eq!(instance.state, LifecycleState::Unmounted);
    assert_eq!(instance.update_count, 5);
}

#[test]
fn test_budget_health_follows_reconfiguration_and_unmount() {
    let system = ContractSystem::with_defaults().unwrap();
    let hero = BudgetScope::component("Hero");
    system.budgets().sample(hero.clone(), Metric::RenderTime, 30.0).unwrap();
    assert_eq!(system.check_system_health().budget_status, HealthStatus::Critical);

    // Loosening the global budget reclassifies the stored sample
    system
        .initialize(ContractConfig::builder().render_time_budget(100.0).build())
        .unwrap();
    assert_eq!(system.budgets().get_budget_status(&hero).overall, HealthStatus::Healthy);
    assert_eq!(system.check_system_health().budget_status, HealthStatus::Healthy);

    let chart = system.use_component_lifecycle("Chart", "chart");
    chart.mounted();
    chart.updated(&PerformanceSample::render_time(400.0));
    assert_eq!(system.check_system_health().overall, HealthStatus::Critical);
    drop(chart);

    for event in system.bus().history(None) {
        system.bus().resolve(event.id);
    }
    let health = system.check_system_health();
    assert_eq!(health.metrics.active_instances, 0);
    assert_eq!(health.budget_status, HealthStatus::Healthy);
    assert_eq!(health.overall, HealthStatus::Healthy);
}

#[test]
fn test_lifecycle_ordering_is_enforced() {
    let system = ContractSystem::with_defaults().unwrap();
    let lifecycle = system.lifecycle();

    lifecycle.register("Nav", "navigation").unwrap();
    assert!(lifecycle
        .mark_updated("Nav", &PerformanceSample::default())
        .is_err());
    lifecycle.mark_mounted("Nav").unwrap();
    lifecycle
        .mark_updated("Nav", &PerformanceSample::default())
        .unwrap();
    lifecycle.mark_unmounted("Nav").unwrap();
    assert!(lifecycle.mark_mounted("Nav").is_err());

    // An unmounted name can be registered again
    lifecycle.register("Nav", "navigation").unwrap();
    assert_eq!(lifecycle.get_instance("Nav").unwrap().state, LifecycleState::Registered);
}

#[test]
fn test_fps_is_a_floor() {
    let system = ContractSystem::with_defaults().unwrap();
    let perf = system
        .use_performance_monitoring("Canvas", Some(&BudgetThresholds::new().with(Metric::Fps, 60.0)))
        .unwrap();

    assert_eq!(perf.sample(Metric::Fps, 60.0), Some(HealthStatus::Healthy));
    assert_eq!(perf.sample(Metric::Fps, 45.0), Some(HealthStatus::Warning));
    assert_eq!(perf.sample(Metric::Fps, 20.0), Some(HealthStatus::Critical));
}

#[test]
fn test_cleanup_is_idempotent() {
    let system = ContractSystem::with_defaults().unwrap();
    system.register_schema(widget_schema()).unwrap();
    system.validate("widget", &json!({})).unwrap();

    let options = CleanupOptions {
        clear_validation_history: true,
        ..Default::default()
    };
    system.cleanup_contract_system(&options);
    let first = system.check_system_health();
    system.cleanup_contract_system(&options);
    let second = system.check_system_health();

    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.metrics.total_violations, 0);
    assert!(second.is_healthy());
}

#[test]
fn test_initialize_twice_matches_once() {
    let config = ContractConfig::builder()
        .debug_mode(true)
        .memory_budget(64.0)
        .build();

    let once = ContractSystem::with_defaults().unwrap();
    once.initialize(config.clone()).unwrap();

    let twice = ContractSystem::with_defaults().unwrap();
    twice.initialize(config.clone()).unwrap();
    twice.initialize(config).unwrap();

    assert_eq!(once.config(), twice.config());
    assert_eq!(once.bus().subscriber_count(), twice.bus().subscriber_count());
    assert_eq!(
        once.budgets().get_budget_status(&BudgetScope::Global),
        twice.budgets().get_budget_status(&BudgetScope::Global)
    );
}

#[test]
fn test_config_from_toml() {
    let config = ContractConfig::from_toml_str(
        r#"
        enableDebugMode = true
        toleranceFactor = 2.0

        [performanceBudgets]
        renderTime = 8.0
        "#,
    )
    .unwrap();
    let system = ContractSystem::new(config).unwrap();

    let global = system.budgets().get_budget_status(&BudgetScope::Global);
    let render = global
        .budgets
        .iter()
        .find(|b| b.metric == Metric::RenderTime)
        .unwrap();
    assert_eq!(render.threshold, 8.0);
    assert_eq!(system.budgets().tolerance(), 2.0);
}

#[test]
fn test_debug_and_export_round_trip_through_json() {
    let system = ContractSystem::with_defaults().unwrap();
    system.register_schema(widget_schema()).unwrap();
    let nav = system.use_component_lifecycle("Nav", "navigation");
    nav.mounted();
    nav.validate("widget", &json!({"id": 7}));

    let snapshot: serde_json::Value =
        serde_json::from_str(&system.debug_contract_system("Nav").to_json().unwrap()).unwrap();
    assert_eq!(snapshot["scope"], "Nav");
    assert_eq!(snapshot["instances"][0]["state"], "mounted");
    assert_eq!(snapshot["violations"][0]["type"], "schema-violation");
    assert_eq!(snapshot["schemas"][0]["name"], "widget");

    let export: serde_json::Value =
        serde_json::from_str(&system.export_metrics().unwrap().to_json().unwrap()).unwrap();
    assert_eq!(export["health"]["overall"], "warning");
    assert_eq!(export["violations"].as_array().unwrap().len(), 1);
}

#[test]
fn test_concurrent_publishers() {
    let system = Arc::new(ContractSystem::with_defaults().unwrap());
    system.register_schema(widget_schema()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let system = Arc::clone(&system);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    system.validate("widget", &json!({})).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(system.bus().len(), 40);
    assert_eq!(system.validator().stats().failed, 40);
}
