//! Declarative parameter schemas and the validator that runs before any
//! handler sees its arguments.
//!
//! Validation collects every violation rather than stopping at the first one,
//! so a client gets a complete report in a single round trip. Each violation
//! is keyed to a parameter path (`location.latitude`, `tags[1]`).

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use serde_json::{json, Map, Value};

use crate::types::ValidatedArgs;

/// Shape a parameter's value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Object(ParameterSchema),
    Array(Box<ParamKind>),
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Self::Object(schema) => schema.to_json_schema(),
            Self::Array(items) => json!({"type": "array", "items": items.to_json_schema()}),
            other => json!({"type": other.type_name()}),
        }
    }
}

/// Extra constraint on top of the type check. Each one renders to a JSON
/// Schema keyword, so what `tools/list` advertises is exactly what is enforced.
#[derive(Debug, Clone, PartialEq)]
pub enum Refinement {
    /// String must contain something other than whitespace.
    NonEmpty,
    MinLength(usize),
    MaxLength(usize),
    Minimum(f64),
    Maximum(f64),
}

impl Refinement {
    fn annotate(&self, schema: &mut Map<String, Value>) {
        match self {
            Self::NonEmpty => {
                schema.entry("minLength").or_insert(json!(1));
                schema.insert("pattern".into(), json!(r"\S"));
            }
            Self::MinLength(n) => {
                schema.insert("minLength".into(), json!(n));
            }
            Self::MaxLength(n) => {
                schema.insert("maxLength".into(), json!(n));
            }
            Self::Minimum(n) => {
                schema.insert("minimum".into(), json!(n));
            }
            Self::Maximum(n) => {
                schema.insert("maximum".into(), json!(n));
            }
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
    pub required: bool,
    pub refinements: Vec<Refinement>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
            refinements: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn object(name: impl Into<String>, schema: ParameterSchema) -> Self {
        Self::new(name, ParamKind::Object(schema))
    }

    pub fn array(name: impl Into<String>, items: ParamKind) -> Self {
        Self::new(name, ParamKind::Array(Box::new(items)))
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinements.push(refinement);
        self
    }

    pub fn non_empty(self) -> Self {
        self.refine(Refinement::NonEmpty)
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = match self.kind.to_json_schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(ref description) = self.description {
            schema.insert("description".into(), json!(description));
        }
        for refinement in &self.refinements {
            refinement.annotate(&mut schema);
        }
        Value::Object(schema)
    }
}

/// Ordered set of parameters a tool accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchema {
    params: Vec<Param>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// JSON Schema rendering for `tools/list`. The validator checks against
    /// this same document.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `raw` against this schema. Pure: no handler runs, nothing is
    /// mutated. `null` is treated as an empty argument object, `null` members
    /// count as absent, and undeclared members are dropped before checking.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedArgs, ValidationError> {
        let args = match raw {
            Value::Object(map) => Value::Object(self.prune(map)),
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };

        let validator = jsonschema::validator_for(&self.to_json_schema()).map_err(|e| {
            ValidationError::single("arguments", format!("schema does not compile: {e}"))
        })?;
        let mut violations: Vec<Violation> = validator
            .iter_errors(&args)
            .map(|e| Violation::from_error(&e, &args))
            .collect();
        violations.sort_by(|a, b| a.param.cmp(&b.param));

        match args {
            Value::Object(map) if violations.is_empty() => Ok(ValidatedArgs::new(map)),
            _ if violations.is_empty() => Err(ValidationError::single(
                "arguments",
                "arguments must be an object",
            )),
            _ => Err(ValidationError { violations }),
        }
    }

    /// Keep declared, non-null members only, recursing into nested objects.
    fn prune(&self, object: &Map<String, Value>) -> Map<String, Value> {
        self.params
            .iter()
            .filter_map(|param| {
                let value = param.kind.prune(object.get(&param.name)?)?;
                Some((param.name.clone(), value))
            })
            .collect()
    }
}

impl ParamKind {
    fn prune(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => None,
            (Self::Object(schema), Value::Object(map)) => Some(Value::Object(schema.prune(map))),
            // Null items stay so the item check reports them by index.
            (Self::Array(items), Value::Array(values)) => Some(Value::Array(
                values
                    .iter()
                    .map(|v| items.prune(v).unwrap_or(Value::Null))
                    .collect(),
            )),
            _ => Some(value.clone()),
        }
    }
}

/// `/location/latitude` -> `location.latitude`, `/tags/1` -> `tags[1]`.
/// The instance decides whether a segment is a member or an index.
fn param_path(pointer: &str, instance: &Value) -> String {
    let mut path = String::new();
    let mut current = Some(instance);

    for segment in pointer.split('/').skip(1) {
        let key = segment.replace("~1", "/").replace("~0", "~");
        match current {
            Some(Value::Array(items)) => {
                current = key.parse::<usize>().ok().and_then(|i| items.get(i));
                path.push_str(&format!("[{key}]"));
            }
            other => {
                current = other.and_then(|v| v.get(&key));
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(&key);
            }
        }
    }
    path
}

/// A single schema violation, keyed to the offending parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub param: String,
    pub message: String,
}

impl Violation {
    fn from_error(error: &jsonschema::ValidationError<'_>, instance: &Value) -> Self {
        let mut param = param_path(&error.instance_path.to_string(), instance);
        // `required` is reported against the parent object.
        if let ValidationErrorKind::Required {
            property: Value::String(name),
        } = &error.kind
        {
            if !param.is_empty() {
                param.push('.');
            }
            param.push_str(name);
        }
        if param.is_empty() {
            param = "arguments".into();
        }

        Self {
            param,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter '{}': {}", self.param, self.message)
    }
}

/// All violations found in one argument set. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid arguments: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn single(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation {
                param: param.into(),
                message: message.into(),
            }],
        }
    }

    pub fn params(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.param.as_str()).collect()
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
