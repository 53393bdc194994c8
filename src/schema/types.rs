//! Entity schema definitions: fields, per-field rules, references and timestamps.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A stored record: field name to JSON value. Always carries `id` once persisted.
pub type Document = Map<String, Value>;

/// Field holding the backend-assigned identifier.
pub const ID_FIELD: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Timestamp,
    /// Identifier of another entity; resolved on read, never owned.
    Reference { entity: String },
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Timestamp => "timestamp",
            FieldType::Reference { .. } => "reference",
        }
    }
}

/// A field pattern, compiled once when the rule is declared. A pattern that
/// fails to compile is kept so validation can report it as a schema fault.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub source: String,
    pub compiled: Result<Regex, regex::Error>,
}

impl Pattern {
    pub fn new(source: &str) -> Self {
        Pattern {
            source: source.to_string(),
            compiled: Regex::new(source),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldRule {
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub trim: bool,
    /// Applied only when the field is absent from the input.
    pub default: Option<Value>,
    pub allowed: Option<Vec<Value>>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<Pattern>,
}

impl FieldRule {
    pub fn of(field_type: FieldType) -> Self {
        FieldRule {
            field_type,
            required: false,
            unique: false,
            trim: false,
            default: None,
            allowed: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldType::String)
    }

    pub fn integer() -> Self {
        Self::of(FieldType::Integer)
    }

    pub fn timestamp() -> Self {
        Self::of(FieldType::Timestamp)
    }

    pub fn reference(entity: &str) -> Self {
        Self::of(FieldType::Reference {
            entity: entity.to_string(),
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn default_value(mut self, v: impl Into<Value>) -> Self {
        self.default = Some(v.into());
        self
    }

    pub fn allowed<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(Pattern::new(pattern));
        self
    }
}

/// A reference field expanded on `find_one` into a projection of the target.
#[derive(Clone, Debug)]
pub struct Reference {
    pub field: String,
    pub entity: String,
    /// Target fields copied into the expanded value. Nothing else leaks.
    pub projection: Vec<String>,
}

/// System-managed timestamp field names.
#[derive(Clone, Debug)]
pub struct Timestamps {
    pub created: String,
    pub updated: String,
}

#[derive(Clone, Debug)]
pub struct EntitySchema {
    pub name: String,
    /// Declaration order is the validation and reporting order.
    pub fields: Vec<(String, FieldRule)>,
    pub references: Vec<Reference>,
    pub timestamps: Option<Timestamps>,
    /// Field names stripped from all API responses.
    pub sensitive: HashSet<String>,
}

impl EntitySchema {
    pub fn new(name: &str) -> Self {
        EntitySchema {
            name: name.to_string(),
            fields: Vec::new(),
            references: Vec::new(),
            timestamps: None,
            sensitive: HashSet::new(),
        }
    }

    pub fn field(mut self, name: &str, rule: FieldRule) -> Self {
        self.fields.push((name.to_string(), rule));
        self
    }

    pub fn reference(mut self, field: &str, entity: &str, projection: &[&str]) -> Self {
        self.references.push(Reference {
            field: field.to_string(),
            entity: entity.to_string(),
            projection: projection.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn timestamps(mut self, created: &str, updated: &str) -> Self {
        self.timestamps = Some(Timestamps {
            created: created.to_string(),
            updated: updated.to_string(),
        });
        self
    }

    pub fn sensitive(mut self, field: &str) -> Self {
        self.sensitive.insert(field.to_string());
        self
    }

    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|(n, _)| n == field).map(|(_, r)| r)
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, r)| r.unique)
            .map(|(n, _)| n.as_str())
    }

    /// True for `id` and the timestamp fields: never taken from client input.
    pub fn is_system_field(&self, field: &str) -> bool {
        field == ID_FIELD
            || self
                .timestamps
                .as_ref()
                .map(|t| t.created == field || t.updated == field)
                .unwrap_or(false)
    }

    /// Copy of `doc` without sensitive fields.
    pub fn public_view(&self, doc: &Document) -> Document {
        doc.iter()
            .filter(|(k, _)| !self.sensitive.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
