//! Expands reference fields into a projection of the referenced document.

use crate::error::AppError;
use crate::schema::{Document, EntitySchema, Reference};
use crate::store::DocumentStore;
use serde_json::{json, Value};
use std::sync::Arc;

/// Stands in for a reference whose target no longer exists.
pub fn unresolved_marker(id: &str) -> Value {
    json!({ "id": id, "unresolved": true })
}

#[derive(Clone)]
pub struct RelationResolver {
    store: Arc<dyn DocumentStore>,
}

impl RelationResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        RelationResolver { store }
    }

    /// Resolve every reference the schema declares, in declaration order.
    pub async fn resolve_all(
        &self,
        schema: &EntitySchema,
        doc: &mut Document,
    ) -> Result<(), AppError> {
        for reference in &schema.references {
            self.resolve(doc, reference).await?;
        }
        Ok(())
    }

    /// Replace the raw id in `reference.field` with the projected target, or with
    /// [`unresolved_marker`] when the target is gone. Absent or null ids are left alone.
    /// Store failures still propagate.
    pub async fn resolve(&self, doc: &mut Document, reference: &Reference) -> Result<(), AppError> {
        let Some(id) = doc.get(&reference.field).and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let expanded = match self.store.get_by_id(&reference.entity, &id).await? {
            Some(target) => Value::Object(project(&target, &reference.projection)),
            None => {
                tracing::warn!(
                    entity = %reference.entity,
                    id = %id,
                    field = %reference.field,
                    "dangling reference"
                );
                unresolved_marker(&id)
            }
        };
        doc.insert(reference.field.clone(), expanded);
        Ok(())
    }
}

fn project(target: &Document, fields: &[String]) -> Document {
    fields
        .iter()
        .filter_map(|f| target.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}
