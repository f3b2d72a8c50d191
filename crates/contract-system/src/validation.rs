//! Validation engine
//!
//! Checks component data against registered schemas. Every field is checked
//! and every failure is reported, so a caller sees the complete error set in
//! one pass. Checks are structural (kind, shape, bounds, custom predicates),
//! never deep equality against an expected value.
//!
//! An invalid result also publishes a `schema-violation` event whose message
//! is the first error and whose details carry the full error list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::monitor::{MonitorBus, Violation, ViolationKind};
use crate::schema::{FieldSpec, FieldValidator, SchemaDefinition, SchemaRegistry};
use crate::status::HealthStatus;
use crate::sync;
use crate::telemetry::ContractMetrics;

/// Path reported for errors about the data as a whole
pub const ROOT_FIELD: &str = "$";

/// One failed check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of a validation operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: FieldError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Errors reported against one field
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }
}

/// Check `data` against `schema` without side effects
pub fn check_schema(schema: &SchemaDefinition, data: &serde_json::Value) -> ValidationResult {
    let mut result = ValidationResult::valid();
    let empty = serde_json::Map::new();

    let object = match data {
        serde_json::Value::Object(map) => map,
        other => {
            result.add_error(FieldError::new(
                ROOT_FIELD,
                format!(
                    "expected an object but found {}",
                    crate::schema::json_type_name(other)
                ),
            ));
            &empty
        }
    };

    for field in &schema.fields {
        match object.get(&field.name) {
            None | Some(serde_json::Value::Null) => {
                if field.required {
                    result.add_error(FieldError::new(
                        &field.name,
                        format!("'{}' is required", field.name),
                    ));
                }
            }
            Some(value) => check_field(field, value, &mut result),
        }
    }

    if schema.strict {
        for key in object.keys() {
            if schema.get_field(key).is_none() {
                result.add_error(FieldError::new(
                    key,
                    format!("'{}' is not declared in schema '{}'", key, schema.name),
                ));
            }
        }
    }

    result
}

fn check_field(field: &FieldSpec, value: &serde_json::Value, result: &mut ValidationResult) {
    for validator in &field.validators {
        if let Err(message) = apply_validator(validator, value) {
            result.add_error(FieldError::new(&field.name, message));
        }
    }
}

fn apply_validator(validator: &FieldValidator, value: &serde_json::Value) -> std::result::Result<(), String> {
    use serde_json::Value;

    match validator {
        FieldValidator::TypeCheck { expected } => expected.check(value),
        FieldValidator::MinLength { min } => match length_of(value) {
            Some(len) if len < *min => Err(format!("length {} is less than minimum {}", len, min)),
            _ => Ok(()),
        },
        FieldValidator::MaxLength { max } => match length_of(value) {
            Some(len) if len > *max => Err(format!("length {} exceeds maximum {}", len, max)),
            _ => Ok(()),
        },
        FieldValidator::Range { min, max } => {
            let Some(num) = value.as_f64() else {
                return Ok(());
            };
            if let Some(min) = min {
                if num < *min {
                    return Err(format!("value {} is less than minimum {}", num, min));
                }
            }
            if let Some(max) = max {
                if num > *max {
                    return Err(format!("value {} exceeds maximum {}", num, max));
                }
            }
            Ok(())
        }
        FieldValidator::Pattern { pattern, compiled } => match value {
            Value::String(s) => {
                let matched = match compiled {
                    Some(re) => re.is_match(s),
                    None => regex::Regex::new(pattern)
                        .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?
                        .is_match(s),
                };
                if matched {
                    Ok(())
                } else {
                    Err(format!("value does not match pattern '{}'", pattern))
                }
            }
            _ => Ok(()),
        },
        FieldValidator::OneOf { values } => {
            if values.contains(value) {
                Ok(())
            } else {
                let allowed: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                Err(format!("value must be one of: {}", allowed.join(", ")))
            }
        }
        FieldValidator::Custom(custom) => custom
            .check(value)
            .map_err(|message| format!("{} ({})", message, custom.name())),
    }
}

fn length_of(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::String(s) => Some(s.chars().count()),
        serde_json::Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// A retained record of one validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub is_valid: bool,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Totals over the retained validation history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Validates data against registered schemas and reports failures
pub struct ValidationEngine {
    registry: Arc<SchemaRegistry>,
    bus: MonitorBus,
    metrics: Arc<ContractMetrics>,
    history: Mutex<VecDeque<ValidationRecord>>,
    capacity: Mutex<usize>,
}

impl ValidationEngine {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        bus: MonitorBus,
        metrics: Arc<ContractMetrics>,
        history_capacity: usize,
    ) -> Self {
        Self {
            registry,
            bus,
            metrics,
            history: Mutex::new(VecDeque::new()),
            capacity: Mutex::new(history_capacity.max(1)),
        }
    }

    /// Validate `data` against the schema named `schema_name`
    pub fn validate(&self, schema_name: &str, data: &serde_json::Value) -> Result<ValidationResult> {
        self.validate_from(None, schema_name, data)
    }

    /// Validate on behalf of a component, tagging any violation with its name
    pub fn validate_from(
        &self,
        source: Option<&str>,
        schema_name: &str,
        data: &serde_json::Value,
    ) -> Result<ValidationResult> {
        let schema = self.registry.get(schema_name)?;
        let result = check_schema(&schema, data);

        self.metrics.record_validation(schema_name, result.is_valid);
        self.record(ValidationRecord {
            schema: schema_name.to_string(),
            source: source.map(str::to_string),
            is_valid: result.is_valid,
            error_count: result.errors.len(),
            timestamp: Utc::now(),
        });

        if !result.is_valid {
            self.report_violation(source, schema_name, &result);
        }
        Ok(result)
    }

    fn report_violation(&self, source: Option<&str>, schema_name: &str, result: &ValidationResult) {
        let summary = result
            .errors
            .first()
            .map(|e| format!("{}: {}", e.field, e.message))
            .unwrap_or_default();

        tracing::debug!(
            schema = %schema_name,
            errors = result.errors.len(),
            "Schema validation failed"
        );

        let mut violation = Violation::new(
            ViolationKind::SchemaViolation,
            HealthStatus::Warning,
            format!("Schema '{}' violated: {}", schema_name, summary),
        )
        .with_details(serde_json::json!({
            "schema": schema_name,
            "errors": result.errors,
        }));
        if let Some(source) = source {
            violation = violation.with_source(source);
        }
        self.bus.publish(violation);
    }

    fn record(&self, record: ValidationRecord) {
        let capacity = *sync::lock(&self.capacity);
        let mut history = sync::lock(&self.history);
        sync::retain_newest(&mut *history, capacity - 1);
        history.push_back(record);
    }

    /// Most recent validation runs, newest first
    pub fn history(&self, limit: Option<usize>) -> Vec<ValidationRecord> {
        let history = sync::lock(&self.history);
        history
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> ValidationStats {
        let history = sync::lock(&self.history);
        let passed = history.iter().filter(|r| r.is_valid).count();
        ValidationStats {
            total: history.len(),
            passed,
            failed: history.len() - passed,
        }
    }

    pub fn set_history_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        *sync::lock(&self.capacity) = capacity;
        let mut history = sync::lock(&self.history);
        sync::retain_newest(&mut *history, capacity);
    }

    /// Forget every validation record; returns how many were removed
    pub fn clear_history(&self) -> usize {
        let mut history = sync::lock(&self.history);
        let count = history.len();
        history.clear();
        count
    }
}
