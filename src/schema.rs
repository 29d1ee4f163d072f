//! Schema capability used by the validation stage.
//!
//! A [`Schema`] validates a JSON value and returns a coerced replacement, or
//! every problem it found as an ordered list of [`Issue`]s. Three
//! implementations ship with the crate:
//!
//! - [`ObjectSchema`]: declarative field rules with string-to-number and
//!   string-to-bool coercion, defaults and optional fields. Suited to query
//!   strings and path parameters, which always arrive as strings.
//! - [`SerdeSchema`]: round-trips through a serde type, so `#[serde(default)]`
//!   and friends do the coercion.
//! - Any `Fn(&Value) -> Result<Value, Vec<Issue>>`.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tollgate::schema::{FieldRule, ObjectSchema, Schema};
//!
//! let schema = ObjectSchema::new()
//!     .field("id", FieldRule::integer().min(1))
//!     .field("flag", FieldRule::string().default(json!("yes")));
//!
//! let parsed = schema.safe_parse(&json!({"id": "42"})).unwrap();
//! assert_eq!(parsed, json!({"id": 42, "flag": "yes"}));
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step in the path to an offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl Issue {
    pub fn new(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Issue about the value as a whole.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self
            .path
            .iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Index(index) => index.to_string(),
            })
            .collect();
        if path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", path.join("."), self.message)
        }
    }
}

/// Validates and coerces a JSON value without panicking on bad input.
pub trait Schema: Send + Sync {
    fn safe_parse(&self, input: &Value) -> Result<Value, Vec<Issue>>;
}

impl<F> Schema for F
where
    F: Fn(&Value) -> Result<Value, Vec<Issue>> + Send + Sync,
{
    fn safe_parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        self(input)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
enum FieldKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Boolean,
    Array(Box<FieldRule>),
    Object(ObjectSchema),
    Any,
}

/// Rule for one field of an [`ObjectSchema`].
#[derive(Debug, Clone)]
pub struct FieldRule {
    kind: FieldKind,
    optional: bool,
    default: Option<Value>,
}

impl FieldRule {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            optional: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String {
            min_len: None,
            max_len: None,
        })
    }

    /// Integer field. Numeric strings such as `"42"` are coerced.
    pub fn integer() -> Self {
        Self::of(FieldKind::Integer {
            min: None,
            max: None,
        })
    }

    /// Number field. Numeric strings are coerced.
    pub fn number() -> Self {
        Self::of(FieldKind::Number {
            min: None,
            max: None,
        })
    }

    /// Boolean field. `"true"` and `"false"` are coerced.
    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn array(items: FieldRule) -> Self {
        Self::of(FieldKind::Array(Box::new(items)))
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::of(FieldKind::Object(schema))
    }

    pub fn any() -> Self {
        Self::of(FieldKind::Any)
    }

    /// Minimum length in characters. Ignored for non-string rules.
    pub fn min_len(mut self, n: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(n);
        }
        self
    }

    /// Maximum length in characters. Ignored for non-string rules.
    pub fn max_len(mut self, n: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(n);
        }
        self
    }

    /// Inclusive lower bound. Ignored for non-numeric rules.
    pub fn min(mut self, n: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { min, .. } => *min = Some(n),
            FieldKind::Number { min, .. } => *min = Some(n as f64),
            _ => {}
        }
        self
    }

    /// Inclusive upper bound. Ignored for non-numeric rules.
    pub fn max(mut self, n: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { max, .. } => *max = Some(n),
            FieldKind::Number { max, .. } => *max = Some(n as f64),
            _ => {}
        }
        self
    }

    /// A missing or null value is omitted from the output.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// A missing or null value is replaced by `value`.
    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    fn check(&self, value: &Value, path: &[PathSegment], issues: &mut Vec<Issue>) -> Option<Value> {
        let mismatch = |expected: &str, issues: &mut Vec<Issue>| -> Option<Value> {
            issues.push(Issue::new(
                path.to_vec(),
                format!("Expected {expected}, received {}", type_name(value)),
            ));
            None
        };

        match &self.kind {
            FieldKind::Any => Some(value.clone()),
            FieldKind::String { min_len, max_len } => {
                let Value::String(s) = value else {
                    return mismatch("string", issues);
                };
                let len = s.chars().count();
                if let Some(min) = min_len
                    && len < *min
                {
                    issues.push(Issue::new(
                        path.to_vec(),
                        format!("String must contain at least {min} character(s)"),
                    ));
                    return None;
                }
                if let Some(max) = max_len
                    && len > *max
                {
                    issues.push(Issue::new(
                        path.to_vec(),
                        format!("String must contain at most {max} character(s)"),
                    ));
                    return None;
                }
                Some(value.clone())
            }
            FieldKind::Integer { min, max } => {
                let parsed = match value {
                    Value::Number(n) => n.as_i64().or_else(|| {
                        n.as_f64()
                            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                            .map(|f| f as i64)
                    }),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(n) = parsed else {
                    return mismatch("integer", issues);
                };
                check_bounds(n as f64, min.map(|m| m as f64), max.map(|m| m as f64), path, issues)?;
                Some(Value::from(n))
            }
            FieldKind::Number { min, max } => {
                let parsed = match value {
                    Value::Number(n) => Some(value.clone()).zip(n.as_f64()),
                    Value::String(s) => {
                        let s = s.trim();
                        if let Ok(i) = s.parse::<i64>() {
                            Some((Value::from(i), i as f64))
                        } else {
                            s.parse::<f64>()
                                .ok()
                                .filter(|f| f.is_finite())
                                .map(|f| (Value::from(f), f))
                        }
                    }
                    _ => None,
                };
                let Some((coerced, n)) = parsed else {
                    return mismatch("number", issues);
                };
                check_bounds(n, *min, *max, path, issues)?;
                Some(coerced)
            }
            FieldKind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) if s == "true" => Some(Value::Bool(true)),
                Value::String(s) if s == "false" => Some(Value::Bool(false)),
                _ => mismatch("boolean", issues),
            },
            FieldKind::Array(items) => {
                let Value::Array(elements) = value else {
                    return mismatch("array", issues);
                };
                let before = issues.len();
                let mut out = Vec::with_capacity(elements.len());
                for (index, element) in elements.iter().enumerate() {
                    let mut item_path = path.to_vec();
                    item_path.push(PathSegment::Index(index));
                    // Optional items keep their slot so indexes stay stable
                    match items.resolve(Some(element), &item_path, issues) {
                        Ok(Some(v)) => out.push(v),
                        Ok(None) => out.push(Value::Null),
                        Err(()) => {}
                    }
                }
                (issues.len() == before).then_some(Value::Array(out))
            }
            FieldKind::Object(schema) => schema.check(value, path, issues),
        }
    }

    /// Apply presence rules (`optional`, `default`) and then the type rule.
    /// `Ok(None)` means the field is intentionally absent from the output.
    fn resolve(
        &self,
        value: Option<&Value>,
        path: &[PathSegment],
        issues: &mut Vec<Issue>,
    ) -> Result<Option<Value>, ()> {
        match value {
            None | Some(Value::Null) => {
                if let Some(default) = &self.default {
                    Ok(Some(default.clone()))
                } else if self.optional {
                    Ok(None)
                } else {
                    issues.push(Issue::new(path.to_vec(), "Required"));
                    Err(())
                }
            }
            Some(value) => self.check(value, path, issues).map(Some).ok_or(()),
        }
    }
}

fn check_bounds(
    n: f64,
    min: Option<f64>,
    max: Option<f64>,
    path: &[PathSegment],
    issues: &mut Vec<Issue>,
) -> Option<()> {
    if let Some(min) = min
        && n < min
    {
        issues.push(Issue::new(
            path.to_vec(),
            format!("Number must be greater than or equal to {min}"),
        ));
        return None;
    }
    if let Some(max) = max
        && n > max
    {
        issues.push(Issue::new(
            path.to_vec(),
            format!("Number must be less than or equal to {max}"),
        ));
        return None;
    }
    Some(())
}

/// Object schema built from per-field rules.
///
/// Fields are checked in declaration order and every failing field is
/// reported. Keys without a rule are dropped from the output.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: Vec<(String, FieldRule)>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    fn check(&self, value: &Value, path: &[PathSegment], issues: &mut Vec<Issue>) -> Option<Value> {
        let Value::Object(input) = value else {
            issues.push(Issue::new(
                path.to_vec(),
                format!("Expected object, received {}", type_name(value)),
            ));
            return None;
        };

        let before = issues.len();
        let mut out = Map::new();
        for (name, rule) in &self.fields {
            let mut field_path = path.to_vec();
            field_path.push(PathSegment::Key(name.clone()));
            if let Ok(Some(v)) = rule.resolve(input.get(name), &field_path, issues) {
                out.insert(name.clone(), v);
            }
        }

        (issues.len() == before).then_some(Value::Object(out))
    }
}

impl Schema for ObjectSchema {
    fn safe_parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let mut issues = Vec::new();
        match self.check(input, &[], &mut issues) {
            Some(value) if issues.is_empty() => Ok(value),
            _ => Err(issues),
        }
    }
}

/// Schema backed by a serde type.
///
/// The input is deserialized into `T` and serialized back, so the output
/// carries whatever defaults and renames `T` declares. Deserialization
/// errors become one issue at the root path.
pub struct SerdeSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for SerdeSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn safe_parse(&self, input: &Value) -> Result<Value, Vec<Issue>> {
        let typed = T::deserialize(input).map_err(|e| vec![Issue::root(e.to_string())])?;
        serde_json::to_value(typed).map_err(|e| vec![Issue::root(e.to_string())])
    }
}
