//! User resource: the generic service plus credential hashing on create.

use crate::error::AppError;
use crate::schema::Document;
use crate::service::{hash_password, CrudService};
use serde_json::Value;

const PASSWORD_FIELD: &str = "password";

#[derive(Clone)]
pub struct UserService {
    crud: CrudService,
    hash_passwords: bool,
}

impl UserService {
    pub fn new(crud: CrudService, hash_passwords: bool) -> Self {
        UserService { crud, hash_passwords }
    }

    pub fn crud(&self) -> &CrudService {
        &self.crud
    }

    /// Create a user. Length rules run on the plaintext; the hash is what gets stored.
    pub async fn register(&self, record: &Document) -> Result<Document, AppError> {
        let mut doc = self.crud.validate_new(record).await?;
        if self.hash_passwords {
            if let Some(Value::String(plain)) = doc.get_mut(PASSWORD_FIELD) {
                *plain = hash_password_blocking(std::mem::take(plain)).await?;
            }
        }
        self.crud.insert_validated(doc).await
    }
}

/// Argon2 is CPU-bound; run it off the async workers so request deadlines still fire.
async fn hash_password_blocking(plain: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(format!("password hash task: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::user;
    use crate::service::verify_password;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    async fn service(hash: bool) -> UserService {
        let store = Arc::new(MemoryStore::new());
        let schema = Arc::new(user());
        store.prepare(&schema).await.unwrap();
        UserService::new(CrudService::new(schema, store), hash)
    }

    fn input(password: &str) -> Document {
        json!({ "email": "a@b.com", "password": password, "name": "Ann" })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let users = service(true).await;
        let u = users.register(&input("abcdef")).await.unwrap();
        let stored = u["password"].as_str().unwrap();
        assert_ne!(stored, "abcdef");
        assert!(verify_password("abcdef", stored));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_hashing() {
        let users = service(true).await;
        let err = users.register(&input("abc")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_is_rejected_before_hashing() {
        let users = service(true).await;
        users.register(&input("abcdef")).await.unwrap();
        let err = users.register(&input("abcdef")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn hashing_can_be_disabled() {
        let users = service(false).await;
        let u = users.register(&input("abcdef")).await.unwrap();
        assert_eq!(u["password"], json!("abcdef"));
    }
}
