//! Error types for the contract system
//!
//! Configuration errors are raised at setup time and are meant to fail loud.
//! Lookup errors are recoverable; the consumer hooks downgrade them to logged
//! violations so a governance failure never breaks the component it watches.

use thiserror::Error;

use crate::budget::Metric;
use crate::lifecycle::LifecycleState;

/// Main error type for contract system operations
#[derive(Error, Debug)]
pub enum ContractError {
    /// Schema definition is empty or malformed
    #[error("Invalid schema '{name}': {reason}")]
    InvalidSchema { name: String, reason: String },

    /// A schema with this name is already registered
    #[error("Schema '{0}' is already registered")]
    DuplicateSchema(String),

    /// No schema registered under this name
    #[error("Schema '{0}' not found")]
    SchemaNotFound(String),

    /// An active instance with this name is already tracked
    #[error("Component instance '{0}' is already registered")]
    DuplicateInstance(String),

    /// No instance tracked under this name
    #[error("Component instance '{0}' not found")]
    InstanceNotFound(String),

    /// Lifecycle transition not allowed by the state machine
    #[error("Component instance '{name}' cannot move from {from} to {to}")]
    InvalidTransition {
        name: String,
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Budget threshold is not a positive finite number
    #[error("Invalid {metric} budget for scope '{scope}': {reason}")]
    InvalidBudget {
        scope: String,
        metric: Metric,
        reason: String,
    },

    /// Sampled metric value is negative or not finite
    #[error("Invalid {metric} sample: {value}")]
    InvalidSample { metric: Metric, value: f64 },

    /// Configuration value out of range or unparsable
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Prometheus registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContractError {
    /// Create an invalid schema error
    pub fn invalid_schema(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ContractError::InvalidSchema {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        ContractError::InvalidConfig(msg.into())
    }

    /// Setup-time errors that indicate a programming mistake
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ContractError::InvalidSchema { .. }
                | ContractError::DuplicateSchema(_)
                | ContractError::InvalidBudget { .. }
                | ContractError::InvalidConfig(_)
        )
    }

    /// References to names that were never registered
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            ContractError::SchemaNotFound(_) | ContractError::InstanceNotFound(_)
        )
    }
}

impl From<toml::de::Error> for ContractError {
    fn from(err: toml::de::Error) -> Self {
        ContractError::InvalidConfig(format!("TOML error: {}", err))
    }
}

/// Error returned by a violation observer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl ObserverError {
    pub fn new(msg: impl Into<String>) -> Self {
        ObserverError(msg.into())
    }
}

/// Result type alias for contract system operations
pub type Result<T> = std::result::Result<T, ContractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContractError::SchemaNotFound("widget".to_string());
        assert_eq!(err.to_string(), "Schema 'widget' not found");

        let err = ContractError::InvalidTransition {
            name: "Navbar".to_string(),
            from: LifecycleState::Unmounted,
            to: LifecycleState::Mounted,
        };
        assert_eq!(
            err.to_string(),
            "Component instance 'Navbar' cannot move from unmounted to mounted"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(ContractError::DuplicateSchema("a".to_string()).is_configuration_error());
        assert!(ContractError::invalid_schema("a", "no fields").is_configuration_error());
        assert!(!ContractError::SchemaNotFound("a".to_string()).is_configuration_error());

        assert!(ContractError::SchemaNotFound("a".to_string()).is_lookup_error());
        assert!(ContractError::InstanceNotFound("a".to_string()).is_lookup_error());
        assert!(!ContractError::DuplicateInstance("a".to_string()).is_lookup_error());
    }

    #[test]
    fn test_toml_error_conversion() {
        let err: ContractError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, ContractError::InvalidConfig(_)));
    }
}
