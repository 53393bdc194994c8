//! Quill: schema-validated article and user service over a document store,
//! served through an enveloping axum pipeline.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;

pub use app::build_app;
pub use config::AppConfig;
pub use error::{AppError, ConfigError};
pub use middleware::{init_tracing, LogSink, RequestSummary, TracingSink};
pub use response::{Envelope, Reply};
pub use schema::{Document, EntitySchema, SchemaCatalog, SchemaValidator};
pub use service::{CrudService, RelationResolver, UserService};
pub use state::AppState;
pub use store::{ensure_database_exists, DocumentStore, MemoryStore, PgDocumentStore, StoreError};
