//! System health aggregation
//!
//! Health is computed on demand from the live components and never stored.
//! `overall` is the worst of the worst sampled budget status and the
//! severities of violations that have not been resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::budget::BudgetMonitor;
use crate::lifecycle::LifecycleTracker;
use crate::monitor::{MonitorBus, ViolationEvent};
use crate::schema::SchemaRegistry;
use crate::status::HealthStatus;
use crate::validation::{ValidationEngine, ValidationStats};

/// Counts behind a health check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub total_schemas: usize,
    pub active_instances: usize,
    pub tracked_instances: usize,
    pub active_subscriptions: usize,
    pub total_violations: usize,
    pub unresolved_violations: usize,
    pub critical_violations: usize,
    pub budget_scopes: usize,
    pub validations: ValidationStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub budget_status: HealthStatus,
    pub metrics: HealthMetrics,
    pub checked_at: DateTime<Utc>,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.overall.is_healthy()
    }
}

/// Worst status implied by a budget status and retained violations
pub fn overall_status(budget_status: HealthStatus, violations: &[ViolationEvent]) -> HealthStatus {
    violations
        .iter()
        .filter(|e| !e.resolved)
        .map(|e| e.severity)
        .fold(budget_status, HealthStatus::worst)
}

/// Read-only view over the components that feed a health check
pub struct HealthAggregator {
    registry: Arc<SchemaRegistry>,
    lifecycle: Arc<LifecycleTracker>,
    budgets: Arc<BudgetMonitor>,
    validation: Arc<ValidationEngine>,
    bus: MonitorBus,
}

impl HealthAggregator {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        lifecycle: Arc<LifecycleTracker>,
        budgets: Arc<BudgetMonitor>,
        validation: Arc<ValidationEngine>,
        bus: MonitorBus,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            budgets,
            validation,
            bus,
        }
    }

    pub fn check_health(&self) -> SystemHealth {
        let violations = self.bus.history(None);
        let budget_status = self.budgets.worst_status();
        let unresolved: Vec<&ViolationEvent> = violations.iter().filter(|e| !e.resolved).collect();

        let metrics = HealthMetrics {
            total_schemas: self.registry.len(),
            active_instances: self.lifecycle.active_count(),
            tracked_instances: self.lifecycle.len(),
            active_subscriptions: self.bus.subscriber_count(),
            total_violations: violations.len(),
            unresolved_violations: unresolved.len(),
            critical_violations: unresolved
                .iter()
                .filter(|e| e.severity == HealthStatus::Critical)
                .count(),
            budget_scopes: self.budgets.scope_count(),
            validations: self.validation.stats(),
        };

        SystemHealth {
            overall: overall_status(budget_status, &violations),
            budget_status,
            metrics,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{BudgetScope, BudgetThresholds, Metric};
    use crate::monitor::{Violation, ViolationKind};
    use crate::schema::{FieldSpec, SchemaDefinition};
    use crate::telemetry::ContractMetrics;

    struct Fixture {
        aggregator: HealthAggregator,
        registry: Arc<SchemaRegistry>,
        lifecycle: Arc<LifecycleTracker>,
        budgets: Arc<BudgetMonitor>,
        bus: MonitorBus,
    }

    fn fixture() -> Fixture {
        let metrics = Arc::new(ContractMetrics::new().unwrap());
        let bus = MonitorBus::new(20, Arc::clone(&metrics));
        let registry = Arc::new(SchemaRegistry::new());
        let budgets = Arc::new(BudgetMonitor::new(1.5, bus.clone(), Arc::clone(&metrics)));
        let lifecycle = Arc::new(LifecycleTracker::new(Arc::clone(&budgets), Arc::clone(&metrics)));
        let validation = Arc::new(ValidationEngine::new(
            Arc::clone(&registry),
            bus.clone(),
            metrics,
            10,
        ));
        Fixture {
            aggregator: HealthAggregator::new(
                Arc::clone(&registry),
                Arc::clone(&lifecycle),
                Arc::clone(&budgets),
                validation,
                bus.clone(),
            ),
            registry,
            lifecycle,
            budgets,
            bus,
        }
    }

    #[test]
    fn test_empty_system_is_healthy() {
        let f = fixture();
        let health = f.aggregator.check_health();
        assert!(health.is_healthy());
        assert_eq!(health.metrics, HealthMetrics::default());
    }

    #[test]
    fn test_counts() {
        let f = fixture();
        f.registry
            .register(SchemaDefinition::new("a", "").field(FieldSpec::required("x")))
            .unwrap();
        f.lifecycle.register("Nav", "widget").unwrap();
        f.lifecycle.register("Old", "widget").unwrap();
        f.lifecycle.mark_unmounted("Old").unwrap();
        let _sub = f.bus.subscribe(
            |_: &ViolationEvent| -> Result<(), crate::error::ObserverError> { Ok(()) },
        );

        let metrics = f.aggregator.check_health().metrics;
        assert_eq!(metrics.total_schemas, 1);
        assert_eq!(metrics.active_instances, 1);
        assert_eq!(metrics.tracked_instances, 2);
        assert_eq!(metrics.active_subscriptions, 1);
    }

    #[test]
    fn test_warning_violation_degrades_health() {
        let f = fixture();
        let event = f.bus.publish(Violation::new(
            ViolationKind::SchemaViolation,
            HealthStatus::Warning,
            "bad props",
        ));
        assert_eq!(f.aggregator.check_health().overall, HealthStatus::Warning);

        f.bus.resolve(event.id);
        let health = f.aggregator.check_health();
        assert_eq!(health.overall, HealthStatus::Healthy);
        assert_eq!(health.metrics.total_violations, 1);
        assert_eq!(health.metrics.unresolved_violations, 0);
    }

    #[test]
    fn test_critical_budget_is_critical() {
        let f = fixture();
        f.budgets
            .configure_budgets(
                BudgetScope::Global,
                &BudgetThresholds::new().with(Metric::MemoryUsage, 50.0),
            )
            .unwrap();
        f.budgets
            .sample(BudgetScope::component("Chart"), Metric::MemoryUsage, 200.0)
            .unwrap();

        let health = f.aggregator.check_health();
        assert_eq!(health.overall, HealthStatus::Critical);
        assert_eq!(health.budget_status, HealthStatus::Critical);
        assert_eq!(health.metrics.critical_violations, 1);

        // Samples drive budget status even once the breach event is resolved
        let breach = f.bus.history(Some(1)).remove(0);
        f.bus.resolve(breach.id);
        assert_eq!(f.aggregator.check_health().overall, HealthStatus::Critical);
    }

    #[test]
    fn test_overall_status_helper() {
        assert_eq!(overall_status(HealthStatus::Healthy, &[]), HealthStatus::Healthy);
        assert_eq!(overall_status(HealthStatus::Warning, &[]), HealthStatus::Warning);
    }
}
