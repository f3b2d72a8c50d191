//! The contract system context
//!
//! [`ContractSystem`] owns every component and wires them together: the
//! validation engine and budget monitor publish into the shared bus, the
//! lifecycle tracker forwards samples to the budget monitor, and the health
//! aggregator reads from all of them. Nothing here is global; a host creates
//! one system and hands out references, and tests create as many as they like.

use serde_json::json;
use std::sync::{Arc, Mutex, RwLock};

use crate::budget::{BudgetMonitor, BudgetScope};
use crate::config::ContractConfig;
use crate::error::{ContractError, Result};
use crate::health::{HealthAggregator, SystemHealth};
use crate::lifecycle::LifecycleTracker;
use crate::monitor::{LoggingObserver, MonitorBus, Subscription, Violation, ViolationKind};
use crate::schema::{SchemaDefinition, SchemaRegistry};
use crate::status::HealthStatus;
use crate::sync;
use crate::telemetry::ContractMetrics;
use crate::validation::{ValidationEngine, ValidationResult};

pub struct ContractSystem {
    config: RwLock<ContractConfig>,
    metrics: Arc<ContractMetrics>,
    registry: Arc<SchemaRegistry>,
    bus: MonitorBus,
    budgets: Arc<BudgetMonitor>,
    lifecycle: Arc<LifecycleTracker>,
    validation: Arc<ValidationEngine>,
    health: HealthAggregator,
    debug_subscription: Mutex<Option<Subscription>>,
}

impl ContractSystem {
    /// Build a system and apply `config`
    pub fn new(config: ContractConfig) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(ContractMetrics::new()?);
        let registry = Arc::new(SchemaRegistry::new());
        let bus = MonitorBus::new(config.violation_history_capacity, Arc::clone(&metrics));
        let budgets = Arc::new(BudgetMonitor::new(
            config.tolerance_factor,
            bus.clone(),
            Arc::clone(&metrics),
        ));
        let lifecycle = Arc::new(LifecycleTracker::new(
            Arc::clone(&budgets),
            Arc::clone(&metrics),
        ));
        let validation = Arc::new(ValidationEngine::new(
            Arc::clone(&registry),
            bus.clone(),
            Arc::clone(&metrics),
            config.validation_history_capacity,
        ));
        let health = HealthAggregator::new(
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            Arc::clone(&budgets),
            Arc::clone(&validation),
            bus.clone(),
        );

        let system = Self {
            config: RwLock::new(config.clone()),
            metrics,
            registry,
            bus,
            budgets,
            lifecycle,
            validation,
            health,
            debug_subscription: Mutex::new(None),
        };
        system.apply(&config)?;
        Ok(system)
    }

    /// Build a system with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ContractConfig::default())
    }

    /// Apply a new configuration.
    ///
    /// Safe to call repeatedly: global budgets are overwritten rather than
    /// added, and at most one debug logging observer is ever attached.
    /// Registered schemas, tracked instances and history are kept.
    pub fn initialize(&self, config: ContractConfig) -> Result<()> {
        config.validate()?;
        self.apply(&config)?;
        *sync::write(&self.config) = config;
        tracing::info!("Contract system initialized");
        Ok(())
    }

    fn apply(&self, config: &ContractConfig) -> Result<()> {
        self.budgets.set_tolerance(config.tolerance_factor)?;
        self.budgets
            .configure_budgets(BudgetScope::Global, &config.performance_budgets.to_thresholds())?;
        self.budgets.set_enabled(config.enable_performance_monitoring);
        self.bus.set_capacity(config.violation_history_capacity);
        self.validation
            .set_history_capacity(config.validation_history_capacity);

        let mut debug = sync::lock(&self.debug_subscription);
        match (config.enable_debug_mode, debug.is_some()) {
            (true, false) => *debug = Some(self.bus.subscribe(LoggingObserver)),
            (false, true) => *debug = None,
            _ => {}
        }
        Ok(())
    }

    pub fn config(&self) -> ContractConfig {
        sync::read(&self.config).clone()
    }

    /// Crate-internal so every registration goes through `register_schema`
    /// and keeps the schema gauge current
    pub(crate) fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn validator(&self) -> &ValidationEngine {
        &self.validation
    }

    pub fn lifecycle(&self) -> &LifecycleTracker {
        &self.lifecycle
    }

    pub fn budgets(&self) -> &BudgetMonitor {
        &self.budgets
    }

    pub fn bus(&self) -> &MonitorBus {
        &self.bus
    }

    pub fn metrics(&self) -> &ContractMetrics {
        &self.metrics
    }

    /// Register a schema; duplicates and malformed definitions are errors
    pub fn register_schema(&self, definition: SchemaDefinition) -> Result<Arc<SchemaDefinition>> {
        let schema = self.registry.register(definition)?;
        self.metrics.set_registered_schemas(self.registry.len());
        Ok(schema)
    }

    pub fn get_schema(&self, name: &str) -> Result<Arc<SchemaDefinition>> {
        self.registry.get(name)
    }

    pub fn list_schemas(&self) -> Vec<Arc<SchemaDefinition>> {
        self.registry.list()
    }

    pub fn validate(&self, schema_name: &str, data: &serde_json::Value) -> Result<ValidationResult> {
        self.validation.validate(schema_name, data)
    }

    pub fn check_system_health(&self) -> SystemHealth {
        self.health.check_health()
    }

    /// Log an error from a hook path and publish it as a violation
    pub(crate) fn report_error(&self, source: Option<&str>, error: &ContractError) {
        tracing::warn!(component = ?source, error = %error, "Contract hook error downgraded to violation");
        let mut violation =
            Violation::new(ViolationKind::ContractError, HealthStatus::Warning, error.to_string())
                .with_details(json!({
                    "lookup": error.is_lookup_error(),
                    "configuration": error.is_configuration_error(),
                }));
        if let Some(source) = source {
            violation = violation.with_source(source);
        }
        self.bus.publish(violation);
    }
}
