//! Component lifecycle tracking
//!
//! State machine: `registered -> mounted -> updated* -> unmounted`.
//! `unmounted` is terminal; an instance may also be unmounted straight from
//! `registered` when a component is torn down before it mounts. Unmounted
//! records stay queryable until purged by cleanup, and registering the same
//! name again starts a fresh record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::budget::{BudgetMonitor, BudgetScope, Metric};
use crate::error::{ContractError, Result};
use crate::sync;
use crate::telemetry::ContractMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Registered,
    Mounted,
    Updated,
    Unmounted,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Registered => "registered",
            LifecycleState::Mounted => "mounted",
            LifecycleState::Updated => "updated",
            LifecycleState::Unmounted => "unmounted",
        }
    }

    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Registered, Mounted)
                | (Mounted, Updated)
                | (Updated, Updated)
                | (Registered, Unmounted)
                | (Mounted, Unmounted)
                | (Updated, Unmounted)
        )
    }

    pub fn is_active(self) -> bool {
        self != LifecycleState::Unmounted
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics reported with an update; absent values are not sampled
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

impl PerformanceSample {
    pub fn render_time(ms: f64) -> Self {
        Self {
            render_time: Some(ms),
            ..Self::default()
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    fn values(&self) -> impl Iterator<Item = (Metric, f64)> {
        [
            (Metric::RenderTime, self.render_time),
            (Metric::MemoryUsage, self.memory_usage),
            (Metric::Fps, self.fps),
        ]
        .into_iter()
        .filter_map(|(m, v)| v.map(|v| (m, v)))
    }

    /// Fold a newer sample over this one
    fn merge(&mut self, newer: &PerformanceSample) {
        self.render_time = newer.render_time.or(self.render_time);
        self.memory_usage = newer.memory_usage.or(self.memory_usage);
        self.fps = newer.fps.or(self.fps);
    }
}

/// Tracked record of one component instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstance {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub state: LifecycleState,
    /// Last known metric values
    pub performance: PerformanceSample,
    pub update_count: u64,
    pub registered_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}

/// Records lifecycle transitions for named component instances
pub struct LifecycleTracker {
    instances: Mutex<HashMap<String, ComponentInstance>>,
    budgets: Arc<BudgetMonitor>,
    metrics: Arc<ContractMetrics>,
}

impl LifecycleTracker {
    pub fn new(budgets: Arc<BudgetMonitor>, metrics: Arc<ContractMetrics>) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            budgets,
            metrics,
        }
    }

    /// Start tracking an instance in the `registered` state.
    ///
    /// Replacing an unmounted record drops the samples its predecessor left
    /// under the component's budget scope.
    pub fn register(&self, name: &str, component_type: &str) -> Result<ComponentInstance> {
        let mut instances = sync::lock(&self.instances);
        match instances.get(name) {
            Some(existing) if existing.state.is_active() => {
                return Err(ContractError::DuplicateInstance(name.to_string()));
            }
            Some(_) => {
                self.budgets.clear_scope_samples(&BudgetScope::component(name));
            }
            None => {}
        }

        let now = Utc::now();
        let instance = ComponentInstance {
            name: name.to_string(),
            component_type: component_type.to_string(),
            state: LifecycleState::Registered,
            performance: PerformanceSample::default(),
            update_count: 0,
            registered_at: now,
            last_transition_at: now,
        };
        instances.insert(name.to_string(), instance.clone());
        self.after_transition(&instances, &instance);
        tracing::debug!(component = %name, component_type = %component_type, "Registered component");
        Ok(instance)
    }

    pub fn mark_mounted(&self, name: &str) -> Result<ComponentInstance> {
        self.transition(name, LifecycleState::Mounted, None)
    }

    /// Record an update and forward any metric values to the budget monitor
    pub fn mark_updated(&self, name: &str, sample: &PerformanceSample) -> Result<ComponentInstance> {
        for (metric, value) in sample.values() {
            if !value.is_finite() || value < 0.0 {
                return Err(ContractError::InvalidSample { metric, value });
            }
        }

        let instance = self.transition(name, LifecycleState::Updated, Some(sample))?;

        let scope = BudgetScope::component(name);
        for (metric, value) in sample.values() {
            self.budgets.sample(scope.clone(), metric, value)?;
        }
        Ok(instance)
    }

    /// Unmount an instance and drop its budget samples; overrides are kept
    pub fn mark_unmounted(&self, name: &str) -> Result<ComponentInstance> {
        let instance = self.transition(name, LifecycleState::Unmounted, None)?;
        self.budgets.clear_scope_samples(&BudgetScope::component(name));
        Ok(instance)
    }

    fn transition(
        &self,
        name: &str,
        next: LifecycleState,
        sample: Option<&PerformanceSample>,
    ) -> Result<ComponentInstance> {
        let mut instances = sync::lock(&self.instances);
        let instance = instances
            .get_mut(name)
            .ok_or_else(|| ContractError::InstanceNotFound(name.to_string()))?;

        if !instance.state.can_transition_to(next) {
            return Err(ContractError::InvalidTransition {
                name: name.to_string(),
                from: instance.state,
                to: next,
            });
        }

        instance.state = next;
        instance.last_transition_at = Utc::now();
        if next == LifecycleState::Updated {
            instance.update_count += 1;
        }
        if let Some(sample) = sample {
            instance.performance.merge(sample);
        }

        let snapshot = instance.clone();
        self.after_transition(&instances, &snapshot);
        tracing::trace!(component = %name, state = %next, "Lifecycle transition");
        Ok(snapshot)
    }

    fn after_transition(&self, instances: &HashMap<String, ComponentInstance>, instance: &ComponentInstance) {
        self.metrics
            .record_transition(&instance.component_type, instance.state.as_str());
        self.metrics
            .set_active_instances(instances.values().filter(|i| i.state.is_active()).count());
    }

    pub fn get_instance(&self, name: &str) -> Result<ComponentInstance> {
        sync::lock(&self.instances)
            .get(name)
            .cloned()
            .ok_or_else(|| ContractError::InstanceNotFound(name.to_string()))
    }

    /// Instances sorted by name, optionally restricted to one type
    pub fn list_instances(&self, component_type: Option<&str>) -> Vec<ComponentInstance> {
        let instances = sync::lock(&self.instances);
        let mut list: Vec<ComponentInstance> = instances
            .values()
            .filter(|i| component_type.map_or(true, |t| i.component_type == t))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn active_count(&self) -> usize {
        sync::lock(&self.instances)
            .values()
            .filter(|i| i.state.is_active())
            .count()
    }

    pub fn len(&self) -> usize {
        sync::lock(&self.instances).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget unmounted instances; returns how many were removed
    pub fn purge_unmounted(&self) -> usize {
        let mut instances = sync::lock(&self.instances);
        let before = instances.len();
        instances.retain(|_, i| i.state.is_active());
        before - instances.len()
    }
}
