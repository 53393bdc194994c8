//! Whole-record validation against an entity schema.

use crate::error::AppError;
use crate::schema::{Document, EntitySchema, FieldRule, FieldType, Pattern};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::fmt;

/// The rule a field broke.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    Required,
    Type(&'static str),
    Unique,
    Enum(Vec<Value>),
    MinLength(u32),
    MaxLength(u32),
    Pattern,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub field: String,
    pub rule: Rule,
}

impl Violation {
    pub fn new(field: &str, rule: Rule) -> Self {
        Violation {
            field: field.to_string(),
            rule,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.rule {
            Rule::Required => write!(f, "{} is required", field),
            Rule::Type(expected) => write!(f, "{} must be of type {}", field, expected),
            Rule::Unique => write!(f, "{} already exists", field),
            Rule::Enum(allowed) => write!(
                f,
                "{} must be one of: {}",
                field,
                Value::Array(allowed.clone())
            ),
            Rule::MinLength(n) => write!(f, "{} must be at least {} characters", field, n),
            Rule::MaxLength(n) => write!(f, "{} must be at most {} characters", field, n),
            Rule::Pattern => write!(f, "{} does not match required pattern", field),
        }
    }
}

/// Every violation found in one record, in schema field order.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new(violations: Vec<Violation>) -> Self {
        ValidationErrors { violations }
    }

    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate and normalize `input`. Defaults fill absent fields before any
    /// rule runs; an explicit `null` on an optional field is kept as null and
    /// skips the remaining rules. Fields not declared by the schema (including
    /// `id` and the timestamps) are dropped. All rules are checked, not just
    /// the first.
    ///
    /// A field pattern that does not compile is a schema fault and comes back
    /// as [`AppError::Internal`] before any input is looked at.
    pub fn validate(schema: &EntitySchema, input: &Document) -> Result<Document, AppError> {
        check_patterns(schema)?;
        let mut out = Document::new();
        let mut violations = Vec::new();
        for (name, rule) in &schema.fields {
            let value = match input.get(name) {
                Some(Value::Null) if rule.required => {
                    violations.push(Violation::new(name, Rule::Required));
                    continue;
                }
                Some(Value::Null) => {
                    out.insert(name.clone(), Value::Null);
                    continue;
                }
                Some(v) => Some(v.clone()),
                None => rule.default.clone(),
            };
            if let Some(v) = check_field(name, value, rule, &mut violations) {
                out.insert(name.clone(), v);
            }
        }
        if violations.is_empty() {
            Ok(out)
        } else {
            Err(ValidationErrors::new(violations).into())
        }
    }
}

fn check_patterns(schema: &EntitySchema) -> Result<(), AppError> {
    for (name, rule) in &schema.fields {
        if let Some(Pattern {
            source,
            compiled: Err(e),
        }) = &rule.pattern
        {
            return Err(AppError::Internal(format!(
                "invalid pattern {:?} for {}.{}: {}",
                source, schema.name, name, e
            )));
        }
    }
    Ok(())
}

fn check_field(
    name: &str,
    value: Option<Value>,
    rule: &FieldRule,
    violations: &mut Vec<Violation>,
) -> Option<Value> {
    let Some(raw) = value else {
        if rule.required {
            violations.push(Violation::new(name, Rule::Required));
        }
        return None;
    };
    let Some(mut v) = cast(raw, &rule.field_type) else {
        violations.push(Violation::new(name, Rule::Type(rule.field_type.name())));
        return None;
    };
    if rule.trim {
        if let Value::String(s) = &v {
            v = Value::String(s.trim().to_string());
        }
    }
    if rule.required && v.as_str() == Some("") {
        violations.push(Violation::new(name, Rule::Required));
        return None;
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(&v, a)) {
            violations.push(Violation::new(name, Rule::Enum(allowed.clone())));
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(min) = rule.min_length {
            if len < min as usize {
                violations.push(Violation::new(name, Rule::MinLength(min)));
            }
        }
        if let Some(max) = rule.max_length {
            if len > max as usize {
                violations.push(Violation::new(name, Rule::MaxLength(max)));
            }
        }
        if let Some(Ok(re)) = rule.pattern.as_ref().map(|p| &p.compiled) {
            if !re.is_match(s) {
                violations.push(Violation::new(name, Rule::Pattern));
            }
        }
    }
    Some(v)
}

/// Coerce a JSON value to the field type, or None on mismatch.
fn cast(v: Value, field_type: &FieldType) -> Option<Value> {
    match field_type {
        FieldType::String => match v {
            Value::String(s) => Some(Value::String(s)),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Integer => match &v {
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    n.as_i64().map(Value::from)
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| Value::from(f as i64))
                }
            }
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        FieldType::Timestamp => {
            let parsed: Option<DateTime<Utc>> = match &v {
                Value::String(s) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|d| d.with_timezone(&Utc)),
                Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
                _ => None,
            };
            parsed.map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        FieldType::Reference { .. } => match &v {
            Value::String(s) if !s.trim().is_empty() => Some(Value::String(s.trim().to_string())),
            _ => None,
        },
    }
}

pub(crate) fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
