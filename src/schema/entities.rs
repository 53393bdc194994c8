//! The two concrete entities and the catalog that holds them.

use crate::schema::{EntitySchema, FieldRule};
use std::collections::HashMap;
use std::sync::Arc;

pub const ARTICLE: &str = "article";
pub const USER: &str = "user";

/// Loose email shape: something@something.tld, no whitespace.
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Fields of a user an article's `author` expands to.
pub const AUTHOR_PROJECTION: &[&str] = &["id", "name", "sex", "avatarUrl"];

/// status: 1 unpublished, 2 published.
pub fn article() -> EntitySchema {
    EntitySchema::new(ARTICLE)
        .field("title", FieldRule::string().required())
        .field("author", FieldRule::reference(USER))
        .field("content", FieldRule::string())
        .field("status", FieldRule::integer().default_value(1))
        .field("summary", FieldRule::string())
        .field("type", FieldRule::integer().default_value(0))
        .field("cover", FieldRule::string())
        .field("publishDate", FieldRule::timestamp())
        .reference("author", USER, AUTHOR_PROJECTION)
        .timestamps("createDate", "updateDate")
}

/// sex: 0 unset, 1 male, 2 female.
pub fn user() -> EntitySchema {
    EntitySchema::new(USER)
        .field(
            "email",
            FieldRule::string().required().unique().pattern(EMAIL_PATTERN),
        )
        .field("password", FieldRule::string().required().min_length(6))
        .field(
            "name",
            FieldRule::string()
                .required()
                .unique()
                .trim()
                .min_length(1)
                .max_length(32),
        )
        .field("avatarUrl", FieldRule::string())
        .field(
            "sex",
            FieldRule::integer().default_value(0).allowed([0, 1, 2]),
        )
        .timestamps("createDate", "updateDate")
        .sensitive("password")
}

/// Schemas by entity name.
#[derive(Clone, Debug, Default)]
pub struct SchemaCatalog {
    by_name: HashMap<String, Arc<EntitySchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the article and user entities.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(article());
        catalog.register(user());
        catalog
    }

    pub fn register(&mut self, schema: EntitySchema) -> Arc<EntitySchema> {
        let schema = Arc::new(schema);
        self.by_name.insert(schema.name.clone(), schema.clone());
        schema
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.by_name.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.by_name.values()
    }
}
