//! HTTP adapters: pick the fields a schema expects from the request, call the
//! service, reply with the public view.

pub mod article;
pub mod user;

use crate::error::AppError;
use crate::middleware::ParsedBody;
use crate::schema::{Document, EntitySchema, FieldType};
use crate::store::Page;
use serde_json::Value;
use std::collections::HashMap;

fn body_object(ParsedBody(body): ParsedBody) -> Result<Document, AppError> {
    match body {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Only `fields` survive; everything else on the request is ignored.
fn pick(body: &Document, fields: &[&str]) -> Document {
    fields
        .iter()
        .filter_map(|f| body.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

/// Declared, client-writable fields of `schema`.
fn writable_fields(schema: &EntitySchema) -> Vec<&str> {
    schema
        .fields
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| !schema.is_system_field(n))
        .collect()
}

/// Split list query parameters into exact-match filters and a page. Unknown and
/// sensitive fields are ignored; values are cast by field type.
fn list_params(
    schema: &EntitySchema,
    params: HashMap<String, String>,
) -> (Vec<(String, Value)>, Page) {
    let mut limit = None;
    let mut offset = None;
    let mut filters = Vec::new();
    for (k, v) in params {
        match k.as_str() {
            "limit" => limit = v.parse().ok(),
            "offset" => offset = v.parse().ok(),
            _ if schema.sensitive.contains(&k) => {}
            "id" => filters.push((k, Value::String(v))),
            _ => {
                if let Some(rule) = schema.rule(&k) {
                    let value = query_value_for_field(&rule.field_type, &v);
                    filters.push((k, value));
                }
            }
        }
    }
    filters.sort_by(|a, b| a.0.cmp(&b.0));
    (filters, Page::new(limit, offset))
}

fn query_value_for_field(field_type: &FieldType, s: &str) -> Value {
    if *field_type == FieldType::Integer {
        if let Ok(n) = s.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{article, user};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn list_params_cast_and_ignore() {
        let (filters, page) = list_params(
            &article(),
            params(&[("status", "2"), ("title", "hi"), ("bogus", "x"), ("limit", "10")]),
        );
        assert_eq!(
            filters,
            vec![("status".to_string(), json!(2)), ("title".to_string(), json!("hi"))]
        );
        assert_eq!(page, Page { limit: 10, offset: 0 });
    }

    #[test]
    fn sensitive_fields_are_not_filterable() {
        let (filters, _) = list_params(&user(), params(&[("password", "abcdef"), ("name", "Ann")]));
        assert_eq!(filters, vec![("name".to_string(), json!("Ann"))]);
    }

    #[test]
    fn pick_drops_extra_fields() {
        let body = json!({ "email": "a@b.com", "isAdmin": true }).as_object().cloned().unwrap();
        let picked = pick(&body, &["email", "password"]);
        assert_eq!(Value::Object(picked), json!({ "email": "a@b.com" }));
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(
            body_object(ParsedBody(json!([1, 2]))),
            Err(AppError::BadRequest(_))
        ));
    }
}
