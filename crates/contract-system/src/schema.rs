//! Schema definitions and the schema registry
//!
//! A schema names the fields a component's props or state must carry. Each
//! field holds a list of [`FieldValidator`]s, a closed tagged union, so the
//! validation engine can match on every variant instead of calling into an
//! opaque bag of callbacks. Arbitrary logic still fits through
//! [`FieldValidator::Custom`].

use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{ContractError, Result};
use crate::sync;

/// Structural kind of a JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Any,
    String,
    /// Any JSON number
    Number,
    /// A number without a fractional part
    Integer,
    Boolean,
    Array,
    /// An object carrying at least these keys
    Object {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        keys: Vec<String>,
    },
    Null,
}

impl FieldKind {
    /// Object kind that must carry the given keys
    pub fn object_with<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Object {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Any => "any",
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Array => "array",
            FieldKind::Object { .. } => "object",
            FieldKind::Null => "null",
        }
    }

    /// Check the shape of `value`, returning a message on mismatch
    pub fn check(&self, value: &serde_json::Value) -> std::result::Result<(), String> {
        use serde_json::Value;

        let matches = match (self, value) {
            (FieldKind::Any, _) => true,
            (FieldKind::String, Value::String(_)) => true,
            (FieldKind::Number, Value::Number(_)) => true,
            (FieldKind::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            (FieldKind::Boolean, Value::Bool(_)) => true,
            (FieldKind::Array, Value::Array(_)) => true,
            (FieldKind::Object { keys }, Value::Object(map)) => {
                let missing: Vec<&str> = keys
                    .iter()
                    .filter(|k| !map.contains_key(k.as_str()))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(format!("object is missing keys: {}", missing.join(", ")));
                }
                true
            }
            (FieldKind::Null, Value::Null) => true,
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(format!(
                "expected {} but found {}",
                self.name(),
                json_type_name(value)
            ))
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Get the JSON type name
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

type ValidatorFn = dyn Fn(&serde_json::Value) -> std::result::Result<(), String> + Send + Sync;

/// A named user-supplied check
#[derive(Clone)]
pub struct CustomValidator {
    name: String,
    check: Arc<ValidatorFn>,
}

impl CustomValidator {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&serde_json::Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, value: &serde_json::Value) -> std::result::Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// Only the name survives serialization; the closure stays in-process.
impl Serialize for CustomValidator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CustomValidator", 1)?;
        state.serialize_field("name", &self.name)?;
        state.end()
    }
}

/// A single constraint applied to a present field value
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldValidator {
    /// Structural type/shape check
    TypeCheck { expected: FieldKind },
    /// Minimum length of a string (chars) or array (items)
    MinLength { min: usize },
    /// Maximum length of a string (chars) or array (items)
    MaxLength { max: usize },
    /// Inclusive numeric range
    Range {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// String must match this regular expression
    Pattern {
        pattern: String,
        /// Filled at construction or registration so validation never recompiles
        #[serde(skip)]
        compiled: Option<Regex>,
    },
    /// Value must equal one of these
    OneOf { values: Vec<serde_json::Value> },
    /// User-supplied check
    Custom(CustomValidator),
}

/// Declaration of one field in a schema
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub validators: Vec<FieldValidator>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: None,
            validators: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            description: None,
            validators: Vec::new(),
        }
    }

    /// Add a type check
    pub fn kind(self, expected: FieldKind) -> Self {
        self.validator(FieldValidator::TypeCheck { expected })
    }

    pub fn min_length(self, min: usize) -> Self {
        self.validator(FieldValidator::MinLength { min })
    }

    pub fn max_length(self, max: usize) -> Self {
        self.validator(FieldValidator::MaxLength { max })
    }

    pub fn range(self, min: Option<f64>, max: Option<f64>) -> Self {
        self.validator(FieldValidator::Range { min, max })
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = Regex::new(&pattern).ok();
        self.validator(FieldValidator::Pattern { pattern, compiled })
    }

    pub fn one_of<I>(self, values: I) -> Self
    where
        I: IntoIterator<Item = serde_json::Value>,
    {
        self.validator(FieldValidator::OneOf {
            values: values.into_iter().collect(),
        })
    }

    pub fn custom<F>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&serde_json::Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validator(FieldValidator::Custom(CustomValidator::new(name, check)))
    }

    pub fn validator(mut self, validator: FieldValidator) -> Self {
        self.validators.push(validator);
        self
    }
}

/// Named description of a component's data shape
#[derive(Debug, Clone, Serialize)]
pub struct SchemaDefinition {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
    /// Reject keys that are not declared in `fields`
    pub strict: bool,
}

impl SchemaDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            fields: Vec::new(),
            strict: false,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that the definition is well formed
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ContractError::invalid_schema(&self.name, "schema name is empty"));
        }
        if self.fields.is_empty() {
            return Err(ContractError::invalid_schema(&self.name, "schema declares no fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ContractError::invalid_schema(&self.name, "field name is empty"));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ContractError::invalid_schema(
                    &self.name,
                    format!("field '{}' is declared more than once", field.name),
                ));
            }
            for validator in &field.validators {
                check_validator(&self.name, &field.name, validator)?;
            }
        }
        Ok(())
    }

    fn compile_patterns(&mut self) {
        for validator in self.fields.iter_mut().flat_map(|f| f.validators.iter_mut()) {
            if let FieldValidator::Pattern { pattern, compiled } = validator {
                if compiled.is_none() {
                    *compiled = Regex::new(pattern).ok();
                }
            }
        }
    }
}

fn check_validator(schema: &str, field: &str, validator: &FieldValidator) -> Result<()> {
    let invalid = |reason: String| ContractError::invalid_schema(schema, format!("field '{}': {}", field, reason));

    match validator {
        FieldValidator::Range { min, max } => {
            if min.is_none() && max.is_none() {
                return Err(invalid("range has neither min nor max".to_string()));
            }
            if min.map_or(false, |v| !v.is_finite()) || max.map_or(false, |v| !v.is_finite()) {
                return Err(invalid("range bounds must be finite".to_string()));
            }
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    return Err(invalid(format!("range min {} exceeds max {}", lo, hi)));
                }
            }
        }
        FieldValidator::Pattern {
            pattern,
            compiled: None,
        } => {
            Regex::new(pattern).map_err(|e| invalid(format!("invalid pattern '{}': {}", pattern, e)))?;
        }
        FieldValidator::OneOf { values } if values.is_empty() => {
            return Err(invalid("one-of has no allowed values".to_string()));
        }
        FieldValidator::TypeCheck {
            expected: FieldKind::Object { keys },
        } if keys.iter().any(|k| k.is_empty()) => {
            return Err(invalid("object kind lists an empty key".to_string()));
        }
        FieldValidator::Custom(custom) if custom.name().is_empty() => {
            return Err(invalid("custom validator has no name".to_string()));
        }
        _ => {}
    }
    Ok(())
}

/// Registry of named schemas, unique per session
pub struct SchemaRegistry {
    schemas: RwLock<BTreeMap<String, Arc<SchemaDefinition>>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a schema under its own name.
    ///
    /// Fails with [`ContractError::DuplicateSchema`] when the name is taken;
    /// the first definition is kept.
    pub fn register(&self, mut definition: SchemaDefinition) -> Result<Arc<SchemaDefinition>> {
        definition.validate()?;
        definition.compile_patterns();

        let mut schemas = sync::write(&self.schemas);
        if schemas.contains_key(&definition.name) {
            return Err(ContractError::DuplicateSchema(definition.name));
        }

        let name = definition.name.clone();
        let definition = Arc::new(definition);
        schemas.insert(name.clone(), Arc::clone(&definition));
        tracing::debug!(schema = %name, fields = definition.fields.len(), "Registered schema");
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> Result<Arc<SchemaDefinition>> {
        sync::read(&self.schemas)
            .get(name)
            .cloned()
            .ok_or_else(|| ContractError::SchemaNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        sync::read(&self.schemas).contains_key(name)
    }

    /// Snapshot of every registered schema, ordered by name
    pub fn list(&self) -> Vec<Arc<SchemaDefinition>> {
        sync::read(&self.schemas).values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        sync::read(&self.schemas).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        sync::read(&self.schemas).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every schema, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut schemas = sync::write(&self.schemas);
        let count = schemas.len();
        schemas.clear();
        count
    }
}
