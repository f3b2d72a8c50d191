//! Prometheus metrics for the contract system
//!
//! - `contract_system_validations_total` (counter) - validation runs by schema and result
//! - `contract_system_violations_total` (counter) - published violations by kind and severity
//! - `contract_system_budget_samples_total` (counter) - budget samples by metric and status
//! - `contract_system_lifecycle_transitions_total` (counter) - transitions by component type and state
//! - `contract_system_observer_failures_total` (counter) - observers that errored or panicked
//! - `contract_system_active_instances` (gauge)
//! - `contract_system_active_subscriptions` (gauge)
//! - `contract_system_registered_schemas` (gauge)
//!
//! Each [`ContractMetrics`] owns its own registry so separate systems never
//! collide on metric names.

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::error::{ContractError, Result};

const NAMESPACE: &str = "contract_system";

pub struct ContractMetrics {
    registry: Registry,
    validations_total: CounterVec,
    violations_total: CounterVec,
    budget_samples_total: CounterVec,
    lifecycle_transitions_total: CounterVec,
    observer_failures_total: Counter,
    active_instances: Gauge,
    active_subscriptions: Gauge,
    registered_schemas: Gauge,
}

impl ContractMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let validations_total = CounterVec::new(
            Opts::new("validations_total", "Total number of contract validations").namespace(NAMESPACE),
            &["schema", "result"],
        )?;

        let violations_total = CounterVec::new(
            Opts::new("violations_total", "Total number of published contract violations")
                .namespace(NAMESPACE),
            &["kind", "severity"],
        )?;

        let budget_samples_total = CounterVec::new(
            Opts::new("budget_samples_total", "Total number of performance budget samples")
                .namespace(NAMESPACE),
            &["metric", "status"],
        )?;

        let lifecycle_transitions_total = CounterVec::new(
            Opts::new(
                "lifecycle_transitions_total",
                "Total number of component lifecycle transitions",
            )
            .namespace(NAMESPACE),
            &["component_type", "state"],
        )?;

        let observer_failures_total = Counter::with_opts(
            Opts::new(
                "observer_failures_total",
                "Total number of violation observers that failed during notification",
            )
            .namespace(NAMESPACE),
        )?;

        let active_instances = Gauge::with_opts(
            Opts::new("active_instances", "Number of component instances not yet unmounted")
                .namespace(NAMESPACE),
        )?;

        let active_subscriptions = Gauge::with_opts(
            Opts::new("active_subscriptions", "Number of active violation subscriptions")
                .namespace(NAMESPACE),
        )?;

        let registered_schemas = Gauge::with_opts(
            Opts::new("registered_schemas", "Number of registered contract schemas")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(validations_total.clone()))?;
        registry.register(Box::new(violations_total.clone()))?;
        registry.register(Box::new(budget_samples_total.clone()))?;
        registry.register(Box::new(lifecycle_transitions_total.clone()))?;
        registry.register(Box::new(observer_failures_total.clone()))?;
        registry.register(Box::new(active_instances.clone()))?;
        registry.register(Box::new(active_subscriptions.clone()))?;
        registry.register(Box::new(registered_schemas.clone()))?;

        Ok(Self {
            registry,
            validations_total,
            violations_total,
            budget_samples_total,
            lifecycle_transitions_total,
            observer_failures_total,
            active_instances,
            active_subscriptions,
            registered_schemas,
        })
    }

    pub fn record_validation(&self, schema: &str, valid: bool) {
        let result = if valid { "valid" } else { "invalid" };
        self.validations_total
            .with_label_values(&[schema, result])
            .inc();
    }

    pub fn record_violation(&self, kind: &str, severity: &str) {
        self.violations_total
            .with_label_values(&[kind, severity])
            .inc();
    }

    pub fn record_budget_sample(&self, metric: &str, status: &str) {
        self.budget_samples_total
            .with_label_values(&[metric, status])
            .inc();
    }

    pub fn record_transition(&self, component_type: &str, state: &str) {
        self.lifecycle_transitions_total
            .with_label_values(&[component_type, state])
            .inc();
    }

    pub fn record_observer_failure(&self) {
        self.observer_failures_total.inc();
    }

    pub fn set_active_instances(&self, count: usize) {
        self.active_instances.set(count as f64);
    }

    pub fn set_active_subscriptions(&self, count: usize) {
        self.active_subscriptions.set(count as f64);
    }

    pub fn set_registered_schemas(&self, count: usize) {
        self.registered_schemas.set(count as f64);
    }

    /// Total validations recorded for a schema and result label
    pub fn validation_count(&self, schema: &str, valid: bool) -> f64 {
        let result = if valid { "valid" } else { "invalid" };
        self.validations_total
            .with_label_values(&[schema, result])
            .get()
    }

    pub fn observer_failures(&self) -> f64 {
        self.observer_failures_total.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode every metric in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| ContractError::invalid_config(format!("metrics output is not UTF-8: {}", e)))
    }
}
