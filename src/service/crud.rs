//! Generic CRUD over one entity schema. Article and user are this service
//! bound to different schemas; resource logic is layered on top by running
//! [`CrudService::validate_new`] and [`CrudService::insert_validated`] separately.

use crate::error::AppError;
use crate::schema::{Document, EntitySchema, Rule, SchemaValidator, Violation, ID_FIELD};
use crate::service::RelationResolver;
use crate::store::{DocumentStore, Filter, Page};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;

fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Clone)]
pub struct CrudService {
    schema: Arc<EntitySchema>,
    store: Arc<dyn DocumentStore>,
    resolver: RelationResolver,
}

impl CrudService {
    pub fn new(schema: Arc<EntitySchema>, store: Arc<dyn DocumentStore>) -> Self {
        let resolver = RelationResolver::new(store.clone());
        CrudService {
            schema,
            store,
            resolver,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Copy of `doc` safe to return to clients.
    pub fn public(&self, doc: &Document) -> Document {
        self.schema.public_view(doc)
    }

    /// Validate, stamp timestamps and persist. Returns the stored document with its `id`.
    pub async fn create(&self, record: &Document) -> Result<Document, AppError> {
        let doc = self.validate_new(record).await?;
        self.insert_validated(doc).await
    }

    /// First half of [`create`](Self::create): schema rules and the unique pre-check.
    pub async fn validate_new(&self, record: &Document) -> Result<Document, AppError> {
        let doc = SchemaValidator::validate(&self.schema, record)?;
        self.check_unique(&doc, None).await?;
        Ok(doc)
    }

    /// Second half of [`create`](Self::create): stamp timestamps and write. `doc`
    /// must come from [`validate_new`](Self::validate_new).
    pub async fn insert_validated(&self, mut doc: Document) -> Result<Document, AppError> {
        if let Some(ts) = &self.schema.timestamps {
            let now = now_timestamp();
            doc.insert(ts.created.clone(), now.clone());
            doc.insert(ts.updated.clone(), now);
        }
        let stored = self.store.insert(&self.schema.name, doc).await?;
        tracing::info!(entity = %self.schema.name, id = ?stored.get(ID_FIELD), "created");
        Ok(stored)
    }

    /// Documents matching `filter` (exact match; empty matches all).
    pub async fn find(&self, filter: &Filter, page: Page) -> Result<Vec<Document>, AppError> {
        tracing::debug!(entity = %self.schema.name, filter = ?filter, ?page, "find");
        Ok(self.store.query(&self.schema.name, filter, page).await?)
    }

    /// First match with references resolved.
    pub async fn find_one(&self, filter: &Filter) -> Result<Document, AppError> {
        let mut doc = self
            .store
            .query(&self.schema.name, filter, Page::first())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::NotFound(format!("{} matching {}", self.schema.name, describe(filter)))
            })?;
        self.resolver.resolve_all(&self.schema, &mut doc).await?;
        Ok(doc)
    }

    /// Document by id with references resolved.
    pub async fn find_by_id(&self, id: &str) -> Result<Document, AppError> {
        let mut doc = self.get_raw(id).await?;
        self.resolver.resolve_all(&self.schema, &mut doc).await?;
        Ok(doc)
    }

    /// Merge `patch` into the stored document and re-validate the whole record.
    /// `createDate` is kept, `updateDate` reassigned.
    pub async fn update(&self, id: &str, patch: &Document) -> Result<Document, AppError> {
        let existing = self.get_raw(id).await?;
        let mut merged = existing.clone();
        for (k, v) in patch {
            if !self.schema.is_system_field(k) {
                merged.insert(k.clone(), v.clone());
            }
        }
        let mut doc = SchemaValidator::validate(&self.schema, &merged)?;
        self.check_unique(&doc, Some(id)).await?;
        if let Some(ts) = &self.schema.timestamps {
            if let Some(created) = existing.get(&ts.created) {
                doc.insert(ts.created.clone(), created.clone());
            }
            doc.insert(ts.updated.clone(), now_timestamp());
        }
        let stored = self
            .store
            .update(&self.schema.name, id, doc)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(entity = %self.schema.name, id = %id, "updated");
        Ok(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<Document, AppError> {
        let removed = self
            .store
            .delete(&self.schema.name, id)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(entity = %self.schema.name, id = %id, "deleted");
        Ok(removed)
    }

    async fn get_raw(&self, id: &str) -> Result<Document, AppError> {
        self.store
            .get_by_id(&self.schema.name, id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} {}", self.schema.name, id))
    }

    /// Fast-path uniqueness check reporting every taken field. The store's
    /// write-time constraint is what actually decides; this only avoids a doomed write.
    async fn check_unique(&self, doc: &Document, skip_id: Option<&str>) -> Result<(), AppError> {
        let mut taken = Vec::new();
        for field in self.schema.unique_fields() {
            let Some(value) = doc.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let filter = [(field.to_string(), value.clone())];
            let in_use = self
                .store
                .query(&self.schema.name, &filter, Page { limit: 2, offset: 0 })
                .await?
                .iter()
                .any(|d| d.get(ID_FIELD).and_then(Value::as_str) != skip_id);
            if in_use {
                taken.push(Violation::new(field, Rule::Unique).to_string());
            }
        }
        if taken.is_empty() {
            Ok(())
        } else {
            Err(AppError::Conflict(taken.join("; ")))
        }
    }
}

fn describe(filter: &Filter) -> String {
    if filter.is_empty() {
        return "{}".to_string();
    }
    filter
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
