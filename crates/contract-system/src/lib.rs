//! Contract System
//!
//! An in-process governance layer for UI components: named schemas describe
//! the shape of component props and state, live data is validated against
//! them, component lifecycles are tracked against performance budgets, and
//! every failure lands on a bounded violation feed that drives system health.
//!
//! ## Features
//!
//! - **Schema Registry**: Named schemas with typed field validators
//! - **Validation Engine**: Field-level results that never short-circuit
//! - **Lifecycle Tracking**: registered → mounted → updated → unmounted
//! - **Performance Budgets**: Render time, memory, bundle size and frame rate
//!   thresholds with a tolerance band between warning and critical
//! - **Violation Monitoring**: Ordered fan-out to isolated observers with a
//!   bounded rolling history
//! - **Health and Control**: On-demand health, debug snapshots, JSON export
//!   and selective cleanup
//! - **Telemetry**: Prometheus counters and structured `tracing` logs
//!
//! ## Architecture
//!
//! 1. **Schema** (`schema`): Definitions, field validators and the registry.
//!
//! 2. **Validation** (`validation`): Checks data against registered schemas
//!    and publishes schema violations.
//!
//! 3. **Budget** (`budget`): Thresholds per scope, sample classification and
//!    breach events.
//!
//! 4. **Lifecycle** (`lifecycle`): Component instance state machine; update
//!    samples feed the budget monitor.
//!
//! 5. **Monitor** (`monitor`): The violation bus and its subscriptions.
//!
//! 6. **Health** (`health`) and **Control** (`control`): Aggregation, debug
//!    snapshots, export and cleanup.
//!
//! 7. **Hooks** (`hooks`): The calls host components bind to.
//!
//! All components are owned by a [`ContractSystem`]; nothing is global.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contract_system::{
//!     CleanupOptions, ContractConfig, ContractSystem, FieldKind, FieldSpec, PerformanceSample,
//!     SchemaDefinition,
//! };
//! use serde_json::json;
//!
//! fn main() -> contract_system::Result<()> {
//!     contract_system::telemetry::init_tracing(false);
//!
//!     let system = ContractSystem::new(ContractConfig::from_env())?;
//!     system.register_schema(
//!         SchemaDefinition::new("nav-props", "Navigation bar props")
//!             .field(FieldSpec::required("title").kind(FieldKind::String).min_length(1))
//!             .field(FieldSpec::optional("links").kind(FieldKind::Array)),
//!     )?;
//!
//!     let _monitor = system.use_contract_monitor("all", |event| {
//!         println!("{}: {}", event.kind, event.message);
//!     });
//!
//!     let nav = system.use_component_lifecycle("Nav", "navigation");
//!     nav.mounted();
//!     nav.validate("nav-props", &json!({ "title": "" }));
//!     nav.updated(&PerformanceSample::render_time(12.0));
//!
//!     let health = system.check_system_health();
//!     println!("overall: {}", health.overall);
//!
//!     println!("{}", system.export_metrics()?.to_json()?);
//!     system.cleanup(&CleanupOptions::all());
//!     Ok(())
//! }
//! ```

pub mod budget;
pub mod config;
pub mod control;
pub mod error;
pub mod health;
pub mod hooks;
pub mod lifecycle;
pub mod monitor;
pub mod schema;
pub mod status;
pub mod system;
pub mod telemetry;
pub mod validation;

mod sync;

pub use budget::{Budget, BudgetMonitor, BudgetReport, BudgetScope, BudgetThresholds, Metric};
pub use config::{ContractConfig, ContractConfigBuilder, PerformanceBudgetConfig};
pub use control::{CleanupOptions, CleanupReport, DebugScope, DebugSnapshot, MetricsExport};
pub use error::{ContractError, ObserverError, Result};
pub use health::{HealthMetrics, SystemHealth};
pub use hooks::{ComponentLifecycle, PerformanceHandle};
pub use lifecycle::{ComponentInstance, LifecycleState, LifecycleTracker, PerformanceSample};
pub use monitor::{
    LoggingObserver, MonitorBus, Subscription, Violation, ViolationEvent, ViolationKind,
    ViolationObserver,
};
pub use schema::{FieldKind, FieldSpec, FieldValidator, SchemaDefinition, SchemaRegistry};
pub use status::HealthStatus;
pub use system::ContractSystem;
pub use validation::{FieldError, ValidationEngine, ValidationResult, ValidationStats};
