//! Consumer hooks
//!
//! Host UI components bind to the contract system through these calls. Hook
//! paths never fail a component: lookup and lifecycle errors are logged and
//! published as `contract-error` violations instead of being returned.
//! Configuration errors (a bad budget) are still returned.

use std::time::Instant;

use crate::budget::{BudgetReport, BudgetScope, BudgetThresholds, Metric};
use crate::error::{ObserverError, Result};
use crate::lifecycle::{LifecycleState, PerformanceSample};
use crate::monitor::{Subscription, ViolationEvent};
use crate::status::HealthStatus;
use crate::system::ContractSystem;
use crate::validation::ValidationResult;

/// Lifecycle registration held by a component; unmounts on drop
#[must_use = "dropping the guard unmounts the component"]
pub struct ComponentLifecycle<'a> {
    system: &'a ContractSystem,
    name: String,
    tracked: bool,
}

impl<'a> ComponentLifecycle<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this guard owns a tracked instance.
    ///
    /// False when registration failed, e.g. another live instance already
    /// uses the same name.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    pub fn state(&self) -> Option<LifecycleState> {
        self.system
            .lifecycle()
            .get_instance(&self.name)
            .ok()
            .map(|i| i.state)
    }

    pub fn mounted(&self) {
        if !self.tracked {
            return;
        }
        if let Err(e) = self.system.lifecycle().mark_mounted(&self.name) {
            self.system.report_error(Some(&self.name), &e);
        }
    }

    pub fn updated(&self, sample: &PerformanceSample) {
        if !self.tracked {
            return;
        }
        if let Err(e) = self.system.lifecycle().mark_updated(&self.name, sample) {
            self.system.report_error(Some(&self.name), &e);
        }
    }

    /// Validate data on behalf of this component
    pub fn validate(&self, schema_name: &str, data: &serde_json::Value) -> Option<ValidationResult> {
        match self
            .system
            .validator()
            .validate_from(Some(&self.name), schema_name, data)
        {
            Ok(result) => Some(result),
            Err(e) => {
                self.system.report_error(Some(&self.name), &e);
                None
            }
        }
    }

    /// Unmount now instead of at drop
    pub fn release(self) {}
}

impl Drop for ComponentLifecycle<'_> {
    fn drop(&mut self) {
        if !self.tracked {
            return;
        }
        if let Err(e) = self.system.lifecycle().mark_unmounted(&self.name) {
            self.system.report_error(Some(&self.name), &e);
        }
    }
}

/// Budget sampling bound to one component scope
pub struct PerformanceHandle<'a> {
    system: &'a ContractSystem,
    scope: BudgetScope,
}

impl std::fmt::Debug for PerformanceHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceHandle")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<'a> PerformanceHandle<'a> {
    /// Record a sample; invalid values are reported rather than returned
    pub fn sample(&self, metric: Metric, value: f64) -> Option<HealthStatus> {
        match self.system.budgets().sample(self.scope.clone(), metric, value) {
            Ok(status) => status,
            Err(e) => {
                self.system.report_error(self.scope.source(), &e);
                None
            }
        }
    }

    /// Run `render`, sampling its wall-clock time as `renderTime` in milliseconds
    pub fn measure_render<F, R>(&self, render: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let output = render();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.sample(Metric::RenderTime, elapsed_ms);
        output
    }

    pub fn status(&self) -> BudgetReport {
        self.system.budgets().get_budget_status(&self.scope)
    }
}

impl ContractSystem {
    /// Register a component instance for the lifetime of the returned guard
    pub fn use_component_lifecycle(&self, name: &str, component_type: &str) -> ComponentLifecycle<'_> {
        let tracked = match self.lifecycle().register(name, component_type) {
            Ok(_) => true,
            Err(e) => {
                self.report_error(Some(name), &e);
                false
            }
        };
        ComponentLifecycle {
            system: self,
            name: name.to_string(),
            tracked,
        }
    }

    /// Bind budget sampling to a component, optionally overriding thresholds
    pub fn use_performance_monitoring(
        &self,
        name: &str,
        budgets: Option<&BudgetThresholds>,
    ) -> Result<PerformanceHandle<'_>> {
        let scope = BudgetScope::component(name);
        if let Some(budgets) = budgets {
            self.budgets().configure_budgets(scope.clone(), budgets)?;
        }
        Ok(PerformanceHandle {
            system: self,
            scope,
        })
    }

    /// Validate `data`, returning `None` when the schema is unknown.
    ///
    /// The reported `contract-error` carries no source since no component is
    /// bound here; use `ComponentLifecycle::validate` to attribute it.
    pub fn use_contract_validation(
        &self,
        schema_name: &str,
        data: &serde_json::Value,
    ) -> Option<ValidationResult> {
        match self.validate(schema_name, data) {
            Ok(result) => Some(result),
            Err(e) => {
                self.report_error(None, &e);
                None
            }
        }
    }

    /// Call `on_violation` for each event under `scope` until the subscription drops
    pub fn use_contract_monitor<F>(&self, scope: &str, on_violation: F) -> Subscription
    where
        F: Fn(&ViolationEvent) + Send + Sync + 'static,
    {
        self.bus()
            .subscribe_scoped(scope, move |event: &ViolationEvent| -> std::result::Result<(), ObserverError> {
                on_violation(event);
                Ok(())
            })
    }
}
