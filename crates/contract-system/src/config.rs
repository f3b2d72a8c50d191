//! Configuration for the contract system
//!
//! The serialized form uses camelCase keys, so a host can pass the same
//! `{ enablePerformanceMonitoring, enableDebugMode, performanceBudgets }`
//! object it already uses for its UI layer.

use serde::{Deserialize, Serialize};

use crate::budget::BudgetThresholds;
use crate::error::{ContractError, Result};

pub const DEFAULT_RENDER_TIME_MS: f64 = 16.0;
pub const DEFAULT_MEMORY_USAGE_MB: f64 = 50.0;
pub const DEFAULT_BUNDLE_SIZE_KB: f64 = 250.0;
pub const DEFAULT_MIN_FPS: f64 = 30.0;
pub const DEFAULT_TOLERANCE_FACTOR: f64 = 1.5;
pub const DEFAULT_VIOLATION_HISTORY: usize = 100;
pub const DEFAULT_VALIDATION_HISTORY: usize = 100;

/// Global performance budgets applied to every component without an override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceBudgetConfig {
    /// Render time ceiling in milliseconds
    pub render_time: f64,
    /// Memory ceiling in megabytes
    pub memory_usage: f64,
    /// Bundle size ceiling in kilobytes
    pub bundle_size: f64,
    /// Frame rate floor
    pub fps: f64,
}

impl Default for PerformanceBudgetConfig {
    fn default() -> Self {
        Self {
            render_time: DEFAULT_RENDER_TIME_MS,
            memory_usage: DEFAULT_MEMORY_USAGE_MB,
            bundle_size: DEFAULT_BUNDLE_SIZE_KB,
            fps: DEFAULT_MIN_FPS,
        }
    }
}

impl PerformanceBudgetConfig {
    pub fn to_thresholds(&self) -> BudgetThresholds {
        BudgetThresholds {
            render_time: Some(self.render_time),
            memory_usage: Some(self.memory_usage),
            bundle_size: Some(self.bundle_size),
            fps: Some(self.fps),
        }
    }
}

/// Contract system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractConfig {
    /// Record performance samples and evaluate budgets
    pub enable_performance_monitoring: bool,

    /// Log every violation with its full payload
    pub enable_debug_mode: bool,

    /// Global budget thresholds
    pub performance_budgets: PerformanceBudgetConfig,

    /// Ratio above a ceiling (or below a floor) still classified as warning
    pub tolerance_factor: f64,

    /// Maximum number of violation events retained
    pub violation_history_capacity: usize,

    /// Maximum number of validation runs retained
    pub validation_history_capacity: usize,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            enable_performance_monitoring: true,
            enable_debug_mode: false,
            performance_budgets: PerformanceBudgetConfig::default(),
            tolerance_factor: DEFAULT_TOLERANCE_FACTOR,
            violation_history_capacity: DEFAULT_VIOLATION_HISTORY,
            validation_history_capacity: DEFAULT_VALIDATION_HISTORY,
        }
    }
}

impl ContractConfig {
    /// Create a new config builder
    pub fn builder() -> ContractConfigBuilder {
        ContractConfigBuilder::new()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enable_performance_monitoring: env_or(
                "CONTRACT_ENABLE_PERFORMANCE_MONITORING",
                defaults.enable_performance_monitoring,
            ),
            enable_debug_mode: env_or("CONTRACT_ENABLE_DEBUG_MODE", defaults.enable_debug_mode),
            performance_budgets: PerformanceBudgetConfig {
                render_time: env_or(
                    "CONTRACT_BUDGET_RENDER_TIME_MS",
                    defaults.performance_budgets.render_time,
                ),
                memory_usage: env_or(
                    "CONTRACT_BUDGET_MEMORY_MB",
                    defaults.performance_budgets.memory_usage,
                ),
                bundle_size: env_or(
                    "CONTRACT_BUDGET_BUNDLE_KB",
                    defaults.performance_budgets.bundle_size,
                ),
                fps: env_or("CONTRACT_BUDGET_FPS", defaults.performance_budgets.fps),
            },
            tolerance_factor: env_or("CONTRACT_TOLERANCE_FACTOR", defaults.tolerance_factor),
            violation_history_capacity: env_or(
                "CONTRACT_VIOLATION_HISTORY",
                defaults.violation_history_capacity,
            ),
            validation_history_capacity: env_or(
                "CONTRACT_VALIDATION_HISTORY",
                defaults.validation_history_capacity,
            ),
        }
    }

    /// Parse a JSON config object; missing keys take their defaults
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ContractError::invalid_config(format!("JSON error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the monitor cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_factor.is_finite() || self.tolerance_factor < 1.0 {
            return Err(ContractError::invalid_config(format!(
                "toleranceFactor must be at least 1.0, got {}",
                self.tolerance_factor
            )));
        }
        if self.violation_history_capacity == 0 {
            return Err(ContractError::invalid_config(
                "violationHistoryCapacity must be greater than zero",
            ));
        }
        if self.validation_history_capacity == 0 {
            return Err(ContractError::invalid_config(
                "validationHistoryCapacity must be greater than zero",
            ));
        }
        let budgets = &self.performance_budgets;
        for (key, value) in [
            ("renderTime", budgets.render_time),
            ("memoryUsage", budgets.memory_usage),
            ("bundleSize", budgets.bundle_size),
            ("fps", budgets.fps),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ContractError::invalid_config(format!(
                    "performanceBudgets.{} must be a positive number, got {}",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.trim().parse().unwrap_or(default),
        Err(_) => default,
    }
}

/// Builder for ContractConfig
pub struct ContractConfigBuilder {
    config: ContractConfig,
}

impl ContractConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            config: ContractConfig::default(),
        }
    }

    pub fn performance_monitoring(mut self, enabled: bool) -> Self {
        self.config.enable_performance_monitoring = enabled;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.enable_debug_mode = enabled;
        self
    }

    pub fn render_time_budget(mut self, ms: f64) -> Self {
        self.config.performance_budgets.render_time = ms;
        self
    }

    pub fn memory_budget(mut self, mb: f64) -> Self {
        self.config.performance_budgets.memory_usage = mb;
        self
    }

    pub fn tolerance_factor(mut self, factor: f64) -> Self {
        self.config.tolerance_factor = factor;
        self
    }

    pub fn violation_history(mut self, capacity: usize) -> Self {
        self.config.violation_history_capacity = capacity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContractConfig {
        self.config
    }
}

impl Default for ContractConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContractConfig::default();
        assert!(config.enable_performance_monitoring);
        assert!(!config.enable_debug_mode);
        assert_eq!(config.performance_budgets.render_time, 16.0);
        assert_eq!(config.tolerance_factor, 1.5);
        assert_eq!(config.violation_history_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ContractConfig::builder()
            .performance_monitoring(false)
            .debug_mode(true)
            .render_time_budget(8.0)
            .memory_budget(128.0)
            .tolerance_factor(2.0)
            .violation_history(10)
            .build();

        assert!(!config.enable_performance_monitoring);
        assert!(config.enable_debug_mode);
        assert_eq!(config.performance_budgets.render_time, 8.0);
        assert_eq!(config.performance_budgets.memory_usage, 128.0);
        assert_eq!(config.tolerance_factor, 2.0);
        assert_eq!(config.violation_history_capacity, 10);
    }

    #[test]
    fn test_from_json_camel_case() {
        let config = ContractConfig::from_json_str(
            r#"{
                "enablePerformanceMonitoring": false,
                "enableDebugMode": true,
                "performanceBudgets": { "renderTime": 12, "memoryUsage": 64, "bundleSize": 300 }
            }"#,
        )
        .unwrap();

        assert!(!config.enable_performance_monitoring);
        assert!(config.enable_debug_mode);
        assert_eq!(config.performance_budgets.render_time, 12.0);
        assert_eq!(config.performance_budgets.memory_usage, 64.0);
        assert_eq!(config.performance_budgets.bundle_size, 300.0);
        // Unspecified keys fall back to defaults
        assert_eq!(config.performance_budgets.fps, DEFAULT_MIN_FPS);
        assert_eq!(config.tolerance_factor, DEFAULT_TOLERANCE_FACTOR);
    }

    #[test]
    fn test_from_toml() {
        let config = ContractConfig::from_toml_str(
            r#"
            enableDebugMode = true
            toleranceFactor = 1.25

            [performanceBudgets]
            renderTime = 33.0
            "#,
        )
        .unwrap();

        assert!(config.enable_debug_mode);
        assert_eq!(config.tolerance_factor, 1.25);
        assert_eq!(config.performance_budgets.render_time, 33.0);
        assert_eq!(config.performance_budgets.memory_usage, DEFAULT_MEMORY_USAGE_MB);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ContractConfig::builder().tolerance_factor(0.5).build();
        assert!(config.validate().is_err());

        let config = ContractConfig::builder().violation_history(0).build();
        assert!(config.validate().is_err());

        let config = ContractConfig::builder().render_time_budget(-1.0).build();
        assert!(config.validate().is_err());

        let err = ContractConfig::from_json_str(r#"{"toleranceFactor": 0.9}"#).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_to_thresholds() {
        let thresholds = PerformanceBudgetConfig::default().to_thresholds();
        assert_eq!(thresholds.render_time, Some(16.0));
        assert_eq!(thresholds.fps, Some(30.0));
    }
}
