//! Persistence backend contract consumed by the CRUD service and the relation resolver.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};

use crate::schema::{Document, EntitySchema};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A write hit a unique constraint. Raised by the backend at write time.
    #[error("unique constraint on {entity}.{field}")]
    UniqueConflict { entity: String, field: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Exact-match filters: every (field, value) pair must hold. Empty matches all.
pub type Filter = [(String, Value)];

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Limit defaults to 100 and is capped at 1000; offset defaults to 0.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Page {
            limit: limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    pub fn first() -> Self {
        Page { limit: 1, offset: 0 }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// A document store. Implementations assign `id` on insert and enforce the
/// unique fields registered through [`DocumentStore::prepare`] at write time.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Register an entity: install its collection and unique constraints. Idempotent.
    async fn prepare(&self, schema: &EntitySchema) -> Result<(), StoreError>;

    /// Persist a new document and return it with its assigned `id`.
    async fn insert(&self, entity: &str, doc: Document) -> Result<Document, StoreError>;

    /// Documents matching `filter`, in insertion order.
    async fn query(
        &self,
        entity: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Document>, StoreError>;

    async fn get_by_id(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Replace the stored document. None when `id` does not exist.
    async fn update(
        &self,
        entity: &str,
        id: &str,
        doc: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Remove and return the document. None when `id` does not exist.
    async fn delete(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_cap() {
        assert_eq!(Page::default(), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(Some(5000), Some(20)), Page { limit: 1000, offset: 20 });
    }
}
