//! Performance budget monitor
//!
//! Thresholds are configured globally or per component. A component without
//! an override for a metric inherits the global threshold. Each sample is
//! classified against the effective threshold and a tolerance factor:
//!
//! | metric kind | healthy | warning | critical |
//! |---|---|---|---|
//! | ceiling (render time, memory, bundle size) | `v <= t` | `v <= t * f` | otherwise |
//! | floor (fps) | `v >= t` | `v >= t / f` | otherwise |
//!
//! Only the latest value of each metric is stored. Its status is derived
//! against the thresholds and tolerance in force when it is read, so
//! reconfiguring a budget reclassifies existing samples.
//!
//! A `budget-breach` violation is published only when a metric's status
//! changes to warning or critical, never on repeated samples in the same state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ContractError, Result};
use crate::monitor::{MonitorBus, Violation, ViolationKind};
use crate::status::HealthStatus;
use crate::sync;
use crate::telemetry::ContractMetrics;

/// A budgeted performance metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    /// Milliseconds per render
    RenderTime,
    /// Megabytes of heap
    MemoryUsage,
    /// Kilobytes shipped
    BundleSize,
    /// Frames per second
    Fps,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::RenderTime,
        Metric::MemoryUsage,
        Metric::BundleSize,
        Metric::Fps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::RenderTime => "renderTime",
            Metric::MemoryUsage => "memoryUsage",
            Metric::BundleSize => "bundleSize",
            Metric::Fps => "fps",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::RenderTime => "ms",
            Metric::MemoryUsage => "MB",
            Metric::BundleSize => "KB",
            Metric::Fps => "fps",
        }
    }

    /// Floors are breached by going below the threshold
    pub fn is_floor(self) -> bool {
        matches!(self, Metric::Fps)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a value against its threshold.
///
/// `tolerance` is the width of the warning band, as a ratio of the threshold.
pub fn classify(metric: Metric, value: f64, threshold: f64, tolerance: f64) -> HealthStatus {
    if metric.is_floor() {
        if value >= threshold {
            HealthStatus::Healthy
        } else if value >= threshold / tolerance {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    } else if value <= threshold {
        HealthStatus::Healthy
    } else if value <= threshold * tolerance {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

/// Where a threshold applies
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "scope", content = "name")]
pub enum BudgetScope {
    Global,
    Component(String),
}

impl BudgetScope {
    pub fn component(name: impl Into<String>) -> Self {
        BudgetScope::Component(name.into())
    }

    /// Component name, if any
    pub fn source(&self) -> Option<&str> {
        match self {
            BudgetScope::Global => None,
            BudgetScope::Component(name) => Some(name),
        }
    }
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetScope::Global => f.write_str("global"),
            BudgetScope::Component(name) => f.write_str(name),
        }
    }
}

impl From<&str> for BudgetScope {
    fn from(value: &str) -> Self {
        if value == "global" {
            BudgetScope::Global
        } else {
            BudgetScope::Component(value.to_string())
        }
    }
}

/// A partial set of thresholds; `None` leaves a metric unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BudgetThresholds {
    pub render_time: Option<f64>,
    pub memory_usage: Option<f64>,
    pub bundle_size: Option<f64>,
    pub fps: Option<f64>,
}

impl BudgetThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: Metric, threshold: f64) -> Self {
        *self.slot(metric) = Some(threshold);
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::RenderTime => self.render_time,
            Metric::MemoryUsage => self.memory_usage,
            Metric::BundleSize => self.bundle_size,
            Metric::Fps => self.fps,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::RenderTime => &mut self.render_time,
            Metric::MemoryUsage => &mut self.memory_usage,
            Metric::BundleSize => &mut self.bundle_size,
            Metric::Fps => &mut self.fps,
        }
    }

    /// Configured metrics and their thresholds
    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(move |m| self.get(m).map(|t| (m, t)))
    }
}

/// Snapshot of one metric's budget within a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub metric: Metric,
    pub threshold: f64,
    /// Whether the threshold comes from this scope rather than the global default
    pub overridden: bool,
    pub current: Option<f64>,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_at: Option<DateTime<Utc>>,
    pub sample_count: u64,
}

/// Every budget tracked under a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetReport {
    pub scope: BudgetScope,
    pub overall: HealthStatus,
    pub budgets: Vec<Budget>,
}

#[derive(Debug, Clone)]
struct MetricSample {
    current: f64,
    sampled_at: DateTime<Utc>,
    count: u64,
    /// Status when sampled; only used to detect transitions
    last_status: HealthStatus,
}

#[derive(Debug, Default)]
struct ScopeState {
    thresholds: BTreeMap<Metric, f64>,
    samples: BTreeMap<Metric, MetricSample>,
}

struct MonitorState {
    scopes: HashMap<BudgetScope, ScopeState>,
    tolerance: f64,
}

impl MonitorState {
    fn threshold(&self, scope: &BudgetScope, metric: Metric) -> Option<(f64, bool)> {
        let local = self
            .scopes
            .get(scope)
            .and_then(|s| s.thresholds.get(&metric).copied());
        match local {
            Some(t) if *scope != BudgetScope::Global => Some((t, true)),
            Some(t) => Some((t, false)),
            None => self
                .scopes
                .get(&BudgetScope::Global)
                .and_then(|s| s.thresholds.get(&metric).copied())
                .map(|t| (t, false)),
        }
    }

    fn status_of(&self, scope: &BudgetScope, metric: Metric, sample: &MetricSample) -> HealthStatus {
        self.threshold(scope, metric)
            .map_or(HealthStatus::Healthy, |(t, _)| classify(metric, sample.current, t, self.tolerance))
    }

    fn report(&self, scope: &BudgetScope) -> BudgetReport {
        let samples = self.scopes.get(scope).map(|s| &s.samples);
        let mut overall = HealthStatus::Healthy;
        let mut budgets = Vec::new();

        for metric in Metric::ALL {
            let Some((threshold, overridden)) = self.threshold(scope, metric) else {
                continue;
            };
            let sample = samples.and_then(|s| s.get(&metric));
            let status = sample.map_or(HealthStatus::Healthy, |s| {
                classify(metric, s.current, threshold, self.tolerance)
            });
            overall = overall.worst(status);
            budgets.push(Budget {
                metric,
                threshold,
                overridden,
                current: sample.map(|s| s.current),
                status,
                sampled_at: sample.map(|s| s.sampled_at),
                sample_count: sample.map_or(0, |s| s.count),
            });
        }

        BudgetReport {
            scope: scope.clone(),
            overall,
            budgets,
        }
    }
}

/// Tracks budget thresholds and samples per scope
pub struct BudgetMonitor {
    state: Mutex<MonitorState>,
    enabled: AtomicBool,
    bus: MonitorBus,
    metrics: Arc<ContractMetrics>,
}

impl BudgetMonitor {
    pub fn new(tolerance: f64, bus: MonitorBus, metrics: Arc<ContractMetrics>) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                scopes: HashMap::new(),
                tolerance,
            }),
            enabled: AtomicBool::new(true),
            bus,
            metrics,
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn tolerance(&self) -> f64 {
        sync::lock(&self.state).tolerance
    }

    pub fn set_tolerance(&self, tolerance: f64) -> Result<()> {
        if !tolerance.is_finite() || tolerance < 1.0 {
            return Err(ContractError::invalid_config(format!(
                "tolerance factor must be at least 1.0, got {}",
                tolerance
            )));
        }
        sync::lock(&self.state).tolerance = tolerance;
        Ok(())
    }

    /// Set thresholds for a scope; metrics left as `None` keep their value
    pub fn configure_budgets(&self, scope: BudgetScope, budgets: &BudgetThresholds) -> Result<()> {
        for (metric, threshold) in budgets.iter() {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ContractError::InvalidBudget {
                    scope: scope.to_string(),
                    metric,
                    reason: format!("threshold must be a positive number, got {}", threshold),
                });
            }
        }

        let mut state = sync::lock(&self.state);
        let entry = state.scopes.entry(scope.clone()).or_default();
        for (metric, threshold) in budgets.iter() {
            entry.thresholds.insert(metric, threshold);
        }
        tracing::debug!(scope = %scope, metrics = budgets.iter().count(), "Configured budgets");
        Ok(())
    }

    /// Record a sample and return its status.
    ///
    /// Returns `Ok(None)` when monitoring is disabled or no threshold applies.
    pub fn sample(&self, scope: BudgetScope, metric: Metric, value: f64) -> Result<Option<HealthStatus>> {
        if !value.is_finite() || value < 0.0 {
            return Err(ContractError::InvalidSample { metric, value });
        }
        if !self.is_enabled() {
            return Ok(None);
        }

        let (threshold, previous, status) = {
            let mut state = sync::lock(&self.state);
            let Some((threshold, _)) = state.threshold(&scope, metric) else {
                tracing::debug!(scope = %scope, metric = %metric, "No budget configured, sample ignored");
                return Ok(None);
            };
            let status = classify(metric, value, threshold, state.tolerance);
            let samples = &mut state.scopes.entry(scope.clone()).or_default().samples;
            let previous = samples.get(&metric).map_or(HealthStatus::Healthy, |s| s.last_status);
            let count = samples.get(&metric).map_or(0, |s| s.count) + 1;
            samples.insert(
                metric,
                MetricSample {
                    current: value,
                    sampled_at: Utc::now(),
                    count,
                    last_status: status,
                },
            );
            (threshold, previous, status)
        };

        self.metrics.record_budget_sample(metric.as_str(), status.as_str());

        if status != previous {
            if status.is_healthy() {
                tracing::info!(scope = %scope, metric = %metric, value, "Budget recovered");
            } else {
                self.publish_breach(&scope, metric, value, threshold, previous, status);
            }
        }

        Ok(Some(status))
    }

    fn publish_breach(
        &self,
        scope: &BudgetScope,
        metric: Metric,
        value: f64,
        threshold: f64,
        previous: HealthStatus,
        status: HealthStatus,
    ) {
        let comparison = if metric.is_floor() { "below" } else { "over" };
        let message = format!(
            "{} {} budget: {}{} {} threshold {}{}",
            scope,
            metric,
            value,
            metric.unit(),
            comparison,
            threshold,
            metric.unit()
        );

        let mut violation = Violation::new(ViolationKind::BudgetBreach, status, message)
            .with_details(serde_json::json!({
                "scope": scope.to_string(),
                "metric": metric,
                "value": value,
                "threshold": threshold,
                "previousStatus": previous,
                "status": status,
            }));
        if let Some(source) = scope.source() {
            violation = violation.with_source(source);
        }
        self.bus.publish(violation);
    }

    /// Current budgets under a scope
    pub fn get_budget_status(&self, scope: &BudgetScope) -> BudgetReport {
        sync::lock(&self.state).report(scope)
    }

    /// Reports for every scope with thresholds or samples, global first
    pub fn all_reports(&self) -> Vec<BudgetReport> {
        let state = sync::lock(&self.state);
        let mut scopes: Vec<&BudgetScope> = state.scopes.keys().collect();
        scopes.sort();
        scopes.into_iter().map(|s| state.report(s)).collect()
    }

    /// Worst status of any sampled metric under current thresholds
    pub fn worst_status(&self) -> HealthStatus {
        let state = sync::lock(&self.state);
        state
            .scopes
            .iter()
            .flat_map(|(scope, s)| s.samples.iter().map(move |(metric, sample)| (scope, *metric, sample)))
            .map(|(scope, metric, sample)| state.status_of(scope, metric, sample))
            .max()
            .unwrap_or_default()
    }

    pub fn scope_count(&self) -> usize {
        sync::lock(&self.state).scopes.len()
    }

    /// Drop the samples of one scope, keeping its thresholds
    pub fn clear_scope_samples(&self, scope: &BudgetScope) -> usize {
        let mut state = sync::lock(&self.state);
        let Some(entry) = state.scopes.get_mut(scope) else {
            return 0;
        };
        let removed = entry.samples.len();
        entry.samples.clear();
        if entry.thresholds.is_empty() {
            state.scopes.remove(scope);
        }
        removed
    }

    /// Drop every sample, keeping thresholds; returns samples removed
    pub fn reset_samples(&self) -> usize {
        let mut state = sync::lock(&self.state);
        let mut removed = 0;
        for scope in state.scopes.values_mut() {
            removed += scope.samples.len();
            scope.samples.clear();
        }
        state.scopes.retain(|_, s| !s.thresholds.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ViolationEvent;

    fn monitor() -> (BudgetMonitor, MonitorBus) {
        let metrics = Arc::new(ContractMetrics::new().unwrap());
        let bus = MonitorBus::new(50, Arc::clone(&metrics));
        let monitor = BudgetMonitor::new(1.5, bus.clone(), metrics);
        monitor
            .configure_budgets(
                BudgetScope::Global,
                &BudgetThresholds::new().with(Metric::RenderTime, 16.0),
            )
            .unwrap();
        (monitor, bus)
    }

    fn breaches(bus: &MonitorBus) -> Vec<ViolationEvent> {
        bus.history(None)
            .into_iter()
            .filter(|e| e.kind == ViolationKind::BudgetBreach)
            .collect()
    }

    #[test]
    fn test_classification_thresholds() {
        let (monitor, _bus) = monitor();
        let scope = BudgetScope::component("Hero");

        assert_eq!(
            monitor.sample(scope.clone(), Metric::RenderTime, 10.0).unwrap(),
            Some(HealthStatus::Healthy)
        );
        assert_eq!(
            monitor.sample(scope.clone(), Metric::RenderTime, 20.0).unwrap(),
            Some(HealthStatus::Warning)
        );
        assert_eq!(
            monitor.sample(scope, Metric::RenderTime, 30.0).unwrap(),
            Some(HealthStatus::Critical)
        );
    }

    #[test]
    fn test_fps_is_a_floor() {
        assert_eq!(classify(Metric::Fps, 60.0, 30.0, 1.5), HealthStatus::Healthy);
        assert_eq!(classify(Metric::Fps, 25.0, 30.0, 1.5), HealthStatus::Warning);
        assert_eq!(classify(Metric::Fps, 10.0, 30.0, 1.5), HealthStatus::Critical);
    }

    #[test]
    fn test_breach_emitted_on_transition_only() {
        let (monitor, bus) = monitor();
        let scope = BudgetScope::component("Navbar");

        monitor.sample(scope.clone(), Metric::RenderTime, 20.0).unwrap();
        monitor.sample(scope.clone(), Metric::RenderTime, 21.0).unwrap();
        monitor.sample(scope.clone(), Metric::RenderTime, 22.0).unwrap();
        assert_eq!(breaches(&bus).len(), 1);

        monitor.sample(scope.clone(), Metric::RenderTime, 40.0).unwrap();
        assert_eq!(breaches(&bus).len(), 2);
        assert_eq!(breaches(&bus)[0].severity, HealthStatus::Critical);
        assert_eq!(breaches(&bus)[0].source.as_deref(), Some("Navbar"));

        // Recovery is not a breach; a later relapse is
        monitor.sample(scope.clone(), Metric::RenderTime, 5.0).unwrap();
        assert_eq!(breaches(&bus).len(), 2);
        monitor.sample(scope, Metric::RenderTime, 20.0).unwrap();
        assert_eq!(breaches(&bus).len(), 3);
    }

    #[test]
    fn test_component_override_applies_to_component_only() {
        let (monitor, _bus) = monitor();
        monitor
            .configure_budgets(
                BudgetScope::component("Dashboard"),
                &BudgetThresholds::new().with(Metric::RenderTime, 50.0),
            )
            .unwrap();

        assert_eq!(
            monitor
                .sample(BudgetScope::component("Dashboard"), Metric::RenderTime, 40.0)
                .unwrap(),
            Some(HealthStatus::Healthy)
        );
        assert_eq!(
            monitor
                .sample(BudgetScope::component("Footer"), Metric::RenderTime, 40.0)
                .unwrap(),
            Some(HealthStatus::Critical)
        );

        let report = monitor.get_budget_status(&BudgetScope::component("Dashboard"));
        let render = &report.budgets[0];
        assert_eq!(render.threshold, 50.0);
        assert!(render.overridden);
        assert_eq!(render.current, Some(40.0));
    }

    #[test]
    fn test_unbudgeted_metric_is_ignored() {
        let (monitor, bus) = monitor();
        let status = monitor
            .sample(BudgetScope::Global, Metric::BundleSize, 9_000.0)
            .unwrap();
        assert_eq!(status, None);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (monitor, _bus) = monitor();
        assert!(monitor
            .sample(BudgetScope::Global, Metric::RenderTime, f64::NAN)
            .is_err());
        assert!(monitor
            .sample(BudgetScope::Global, Metric::RenderTime, -1.0)
            .is_err());

        let err = monitor
            .configure_budgets(
                BudgetScope::Global,
                &BudgetThresholds::new().with(Metric::MemoryUsage, 0.0),
            )
            .unwrap_err();
        assert!(err.is_configuration_error());
        assert!(monitor.set_tolerance(0.5).is_err());
    }

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let (monitor, bus) = monitor();
        monitor.set_enabled(false);
        let status = monitor
            .sample(BudgetScope::Global, Metric::RenderTime, 100.0)
            .unwrap();
        assert_eq!(status, None);
        assert!(bus.is_empty());
        assert_eq!(monitor.worst_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_reset_samples_keeps_thresholds() {
        let (monitor, _bus) = monitor();
        monitor
            .sample(BudgetScope::component("Hero"), Metric::RenderTime, 100.0)
            .unwrap();
        assert_eq!(monitor.worst_status(), HealthStatus::Critical);

        assert_eq!(monitor.reset_samples(), 1);
        assert_eq!(monitor.worst_status(), HealthStatus::Healthy);
        assert_eq!(monitor.scope_count(), 1);

        let report = monitor.get_budget_status(&BudgetScope::Global);
        assert_eq!(report.budgets[0].threshold, 16.0);
        assert_eq!(report.budgets[0].current, None);
    }

    #[test]
    fn test_reconfigure_is_idempotent() {
        let (monitor, _bus) = monitor();
        let thresholds = BudgetThresholds::new().with(Metric::RenderTime, 16.0);
        monitor.configure_budgets(BudgetScope::Global, &thresholds).unwrap();
        monitor.configure_budgets(BudgetScope::Global, &thresholds).unwrap();

        let report = monitor.get_budget_status(&BudgetScope::Global);
        assert_eq!(report.budgets.len(), 1);
        assert_eq!(monitor.all_reports().len(), 1);
    }

    #[test]
    fn test_reconfigure_reclassifies_existing_samples() {
        let (monitor, _bus) = monitor();
        let hero = BudgetScope::component("Hero");
        monitor.sample(hero.clone(), Metric::RenderTime, 30.0).unwrap();
        assert_eq!(monitor.worst_status(), HealthStatus::Critical);

        monitor
            .configure_budgets(
                BudgetScope::Global,
                &BudgetThresholds::new().with(Metric::RenderTime, 100.0),
            )
            .unwrap();
        let report = monitor.get_budget_status(&hero);
        assert_eq!(report.budgets[0].threshold, 100.0);
        assert_eq!(report.budgets[0].current, Some(30.0));
        assert_eq!(report.budgets[0].status, HealthStatus::Healthy);
        assert_eq!(report.overall, HealthStatus::Healthy);
        assert_eq!(monitor.worst_status(), HealthStatus::Healthy);

        // A wider tolerance band also applies retroactively
        monitor
            .configure_budgets(
                BudgetScope::Global,
                &BudgetThresholds::new().with(Metric::RenderTime, 16.0),
            )
            .unwrap();
        assert_eq!(monitor.worst_status(), HealthStatus::Critical);
        monitor.set_tolerance(2.0).unwrap();
        assert_eq!(monitor.worst_status(), HealthStatus::Warning);
    }

    #[test]
    fn test_clear_scope_samples() {
        let (monitor, bus) = monitor();
        let hero = BudgetScope::component("Hero");
        monitor.sample(hero.clone(), Metric::RenderTime, 100.0).unwrap();
        monitor
            .sample(BudgetScope::component("Nav"), Metric::RenderTime, 20.0)
            .unwrap();

        assert_eq!(monitor.clear_scope_samples(&hero), 1);
        assert_eq!(monitor.worst_status(), HealthStatus::Warning);
        assert_eq!(monitor.clear_scope_samples(&hero), 0);

        // With no previous status left, the next breach is published again
        monitor.sample(hero, Metric::RenderTime, 100.0).unwrap();
        assert_eq!(breaches(&bus).len(), 3);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!(BudgetScope::from("global"), BudgetScope::Global);
        assert_eq!(BudgetScope::from("Hero"), BudgetScope::component("Hero"));
        assert_eq!(BudgetScope::component("Hero").to_string(), "Hero");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ceiling_status_is_monotonic(
                threshold in 1.0f64..1_000.0,
                a in 0.0f64..5_000.0,
                b in 0.0f64..5_000.0,
            ) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let lo_status = classify(Metric::RenderTime, lo, threshold, 1.5);
                let hi_status = classify(Metric::RenderTime, hi, threshold, 1.5);
                prop_assert!(lo_status <= hi_status);
            }

            #[test]
            fn floor_status_is_antitonic(
                threshold in 1.0f64..240.0,
                a in 0.0f64..500.0,
                b in 0.0f64..500.0,
            ) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let lo_status = classify(Metric::Fps, lo, threshold, 1.5);
                let hi_status = classify(Metric::Fps, hi, threshold, 1.5);
                prop_assert!(lo_status >= hi_status);
            }
        }
    }
}
