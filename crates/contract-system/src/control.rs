//! Control surface: debug snapshots, metrics export and cleanup
//!
//! Snapshots and exports are plain data; turning them into a file is the
//! caller's concern. Cleanup is selective and idempotent, and the next
//! [`ContractSystem::check_system_health`] call reflects whatever it removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::budget::{BudgetReport, BudgetScope};
use crate::config::ContractConfig;
use crate::error::Result;
use crate::health::SystemHealth;
use crate::lifecycle::ComponentInstance;
use crate::monitor::{ViolationEvent, ViolationKind, ALL_SCOPES};
use crate::schema::SchemaDefinition;
use crate::system::ContractSystem;
use crate::validation::{ValidationRecord, ValidationStats};

/// Which part of the system a debug snapshot covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugScope {
    All,
    Component(String),
}

impl DebugScope {
    pub fn component(name: impl Into<String>) -> Self {
        DebugScope::Component(name.into())
    }
}

impl From<&str> for DebugScope {
    fn from(s: &str) -> Self {
        match s {
            ALL_SCOPES => DebugScope::All,
            name => DebugScope::Component(name.to_string()),
        }
    }
}

impl FromStr for DebugScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl fmt::Display for DebugScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugScope::All => f.write_str(ALL_SCOPES),
            DebugScope::Component(name) => f.write_str(name),
        }
    }
}

/// Structured view of the system for one scope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub scope: String,
    pub generated_at: DateTime<Utc>,
    pub config: ContractConfig,
    pub health: SystemHealth,
    pub schemas: Vec<SchemaDefinition>,
    pub instances: Vec<ComponentInstance>,
    pub violations: Vec<ViolationEvent>,
    pub budgets: Vec<BudgetReport>,
    pub validations: Vec<ValidationRecord>,
}

impl DebugSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Serializable snapshot intended for external persistence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    pub exported_at: DateTime<Utc>,
    pub health: SystemHealth,
    pub budgets: Vec<BudgetReport>,
    pub violations: Vec<ViolationEvent>,
    pub schemas: Vec<String>,
    pub validation: ValidationStats,
    /// Prometheus text exposition of the system's counters
    pub prometheus: String,
}

impl MetricsExport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// What a cleanup call should clear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanupOptions {
    /// Validation records and the schema violations they raised
    pub clear_validation_history: bool,
    /// Budget samples and breach events; thresholds are kept
    pub clear_performance_metrics: bool,
    /// The whole violation history
    pub clear_monitoring_data: bool,
    pub purge_unmounted_instances: bool,
    pub clear_schemas: bool,
}

impl CleanupOptions {
    pub fn all() -> Self {
        Self {
            clear_validation_history: true,
            clear_performance_metrics: true,
            clear_monitoring_data: true,
            purge_unmounted_instances: true,
            clear_schemas: true,
        }
    }
}

/// Counts removed by a cleanup call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub validation_records: usize,
    pub performance_samples: usize,
    pub violations: usize,
    pub instances: usize,
    pub schemas: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.validation_records + self.performance_samples + self.violations + self.instances + self.schemas
    }
}

impl ContractSystem {
    /// Snapshot schemas, instances, violations and budgets for a scope
    pub fn debug(&self, scope: impl Into<DebugScope>) -> DebugSnapshot {
        let scope = scope.into();
        let schemas = self.registry().list().iter().map(|s| (**s).clone()).collect();

        let (instances, violations, budgets, validations) = match &scope {
            DebugScope::All => (
                self.lifecycle().list_instances(None),
                self.bus().history(None),
                self.budgets().all_reports(),
                self.validator().history(None),
            ),
            DebugScope::Component(name) => (
                self.lifecycle().get_instance(name).into_iter().collect(),
                self.bus().history_for(name, None),
                vec![self.budgets().get_budget_status(&BudgetScope::component(name.as_str()))],
                self.validator()
                    .history(None)
                    .into_iter()
                    .filter(|r| r.source.as_deref() == Some(name.as_str()))
                    .collect(),
            ),
        };

        tracing::debug!(scope = %scope, "Generated debug snapshot");

        DebugSnapshot {
            scope: scope.to_string(),
            generated_at: Utc::now(),
            config: self.config(),
            health: self.check_system_health(),
            schemas,
            instances,
            violations,
            budgets,
            validations,
        }
    }

    /// Alias of [`ContractSystem::debug`] for dashboard callers
    pub fn debug_contract_system(&self, scope: impl Into<DebugScope>) -> DebugSnapshot {
        self.debug(scope)
    }

    /// Health, budgets and recent violations as exportable data
    pub fn export_metrics(&self) -> Result<MetricsExport> {
        Ok(MetricsExport {
            exported_at: Utc::now(),
            health: self.check_system_health(),
            budgets: self.budgets().all_reports(),
            violations: self.bus().history(None),
            schemas: self.registry().names(),
            validation: self.validator().stats(),
            prometheus: self.metrics().render()?,
        })
    }

    /// Clear the parts of the system selected by `options`
    pub fn cleanup(&self, options: &CleanupOptions) -> CleanupReport {
        let mut report = CleanupReport::default();

        if options.clear_validation_history {
            report.validation_records = self.validator().clear_history();
            report.violations += self.bus().clear_kind(ViolationKind::SchemaViolation);
        }
        if options.clear_performance_metrics {
            report.performance_samples = self.budgets().reset_samples();
            report.violations += self.bus().clear_kind(ViolationKind::BudgetBreach);
        }
        if options.clear_monitoring_data {
            report.violations += self.bus().clear();
        }
        if options.purge_unmounted_instances {
            report.instances = self.lifecycle().purge_unmounted();
        }
        if options.clear_schemas {
            report.schemas = self.registry().clear();
            self.metrics().set_registered_schemas(0);
        }

        tracing::info!(
            validation_records = report.validation_records,
            performance_samples = report.performance_samples,
            violations = report.violations,
            instances = report.instances,
            schemas = report.schemas,
            "Contract system cleanup"
        );
        report
    }

    /// Alias of [`ContractSystem::cleanup`] for dashboard callers
    pub fn cleanup_contract_system(&self, options: &CleanupOptions) -> CleanupReport {
        self.cleanup(options)
    }
}
