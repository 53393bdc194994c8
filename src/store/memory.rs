//! In-process document store. Unique constraints are checked and the write
//! applied under one write lock, so concurrent inserts cannot both win.

use crate::schema::{value_eq, Document, EntitySchema, ID_FIELD};
use crate::store::{DocumentStore, Filter, Page, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Default)]
struct Collection {
    docs: Vec<Document>,
    unique: Vec<String>,
}

pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            collections: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Every operation sleeps this long first.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// While false, every operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    async fn enter(&self) -> Result<(), StoreError> {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

fn doc_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

fn matches_filter(doc: &Document, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(k, v)| doc.get(k).map(|d| value_eq(d, v)).unwrap_or(false))
}

/// First unique field of `doc` already taken by another document.
fn conflicting_field(col: &Collection, doc: &Document, skip_id: Option<&str>) -> Option<String> {
    col.unique
        .iter()
        .find(|field| {
            let Some(value) = doc.get(field.as_str()).filter(|v| !v.is_null()) else {
                return false;
            };
            col.docs.iter().any(|other| {
                doc_id(other) != skip_id
                    && other.get(field.as_str()).map(|o| value_eq(o, value)).unwrap_or(false)
            })
        })
        .cloned()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn prepare(&self, schema: &EntitySchema) -> Result<(), StoreError> {
        self.enter().await?;
        let mut cols = self.collections.write().map_err(|_| poisoned())?;
        let col = cols.entry(schema.name.clone()).or_default();
        col.unique = schema.unique_fields().map(str::to_string).collect();
        Ok(())
    }

    async fn insert(&self, entity: &str, mut doc: Document) -> Result<Document, StoreError> {
        self.enter().await?;
        let mut cols = self.collections.write().map_err(|_| poisoned())?;
        let col = cols.entry(entity.to_string()).or_default();
        if let Some(field) = conflicting_field(col, &doc, None) {
            return Err(StoreError::UniqueConflict {
                entity: entity.to_string(),
                field,
            });
        }
        doc.insert(ID_FIELD.into(), Value::String(uuid::Uuid::new_v4().to_string()));
        col.docs.push(doc.clone());
        Ok(doc)
    }

    async fn query(
        &self,
        entity: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Document>, StoreError> {
        self.enter().await?;
        let cols = self.collections.read().map_err(|_| poisoned())?;
        let Some(col) = cols.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(col
            .docs
            .iter()
            .filter(|d| matches_filter(d, filter))
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter().await?;
        let cols = self.collections.read().map_err(|_| poisoned())?;
        Ok(cols
            .get(entity)
            .and_then(|c| c.docs.iter().find(|d| doc_id(d) == Some(id)))
            .cloned())
    }

    async fn update(
        &self,
        entity: &str,
        id: &str,
        mut doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.enter().await?;
        let mut cols = self.collections.write().map_err(|_| poisoned())?;
        let Some(col) = cols.get_mut(entity) else {
            return Ok(None);
        };
        let Some(pos) = col.docs.iter().position(|d| doc_id(d) == Some(id)) else {
            return Ok(None);
        };
        if let Some(field) = conflicting_field(col, &doc, Some(id)) {
            return Err(StoreError::UniqueConflict {
                entity: entity.to_string(),
                field,
            });
        }
        doc.insert(ID_FIELD.into(), Value::String(id.to_string()));
        col.docs[pos] = doc.clone();
        Ok(Some(doc))
    }

    async fn delete(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter().await?;
        let mut cols = self.collections.write().map_err(|_| poisoned())?;
        let Some(col) = cols.get_mut(entity) else {
            return Ok(None);
        };
        Ok(col
            .docs
            .iter()
            .position(|d| doc_id(d) == Some(id))
            .map(|pos| col.docs.remove(pos)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::user;
    use serde_json::json;
    use std::sync::Arc;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_enforces_unique() {
        let store = MemoryStore::new();
        store.prepare(&user()).await.unwrap();
        let first = store
            .insert("user", doc(json!({ "email": "a@b.com", "name": "Ann" })))
            .await
            .unwrap();
        assert!(first.get("id").and_then(Value::as_str).is_some());

        let err = store
            .insert("user", doc(json!({ "email": "a@b.com", "name": "Bob" })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::UniqueConflict {
                entity: "user".into(),
                field: "email".into()
            }
        );
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.prepare(&user()).await.unwrap();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let input = json!({ "email": "same@b.com", "name": format!("n{}", i) });
                store.insert("user", doc(input)).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let store = MemoryStore::new();
        for status in [1, 2, 1, 1] {
            store.insert("article", doc(json!({ "status": status }))).await.unwrap();
        }
        let filter = vec![("status".to_string(), json!(1))];
        assert_eq!(store.query("article", &filter, Page::default()).await.unwrap().len(), 3);
        let page = Page { limit: 2, offset: 2 };
        assert_eq!(store.query("article", &filter, page).await.unwrap().len(), 1);
        assert!(store.query("missing", &[], Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_id_and_checks_others_only() {
        let store = MemoryStore::new();
        store.prepare(&user()).await.unwrap();
        let ann = store.insert("user", doc(json!({ "email": "a@b.com" }))).await.unwrap();
        store.insert("user", doc(json!({ "email": "b@b.com" }))).await.unwrap();
        let id = ann["id"].as_str().unwrap();

        let same = store
            .update("user", id, doc(json!({ "email": "a@b.com", "name": "Ann" })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same["id"], json!(id));

        let err = store.update("user", id, doc(json!({ "email": "b@b.com" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueConflict { .. }));
        assert!(store.update("user", "nope", Document::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_once() {
        let store = MemoryStore::new();
        let a = store.insert("article", doc(json!({ "title": "t" }))).await.unwrap();
        let id = a["id"].as_str().unwrap();
        assert!(store.delete("article", id).await.unwrap().is_some());
        assert!(store.delete("article", id).await.unwrap().is_none());
        assert!(store.get_by_id("article", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
