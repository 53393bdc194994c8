//! Shared application state for all routes. The store handle is created and
//! closed by the host process; the state only borrows it.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::{LogSink, TracingSink};
use crate::schema::{SchemaCatalog, ARTICLE, USER};
use crate::service::{CrudService, UserService};
use crate::store::DocumentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub catalog: Arc<SchemaCatalog>,
    pub articles: CrudService,
    pub users: UserService,
    pub log_sink: Arc<dyn LogSink>,
}

impl AppState {
    /// State over the standard article/user catalog, logging through tracing.
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Result<Self, AppError> {
        let catalog = SchemaCatalog::standard();
        let schema = |name: &str| {
            catalog
                .get(name)
                .ok_or_else(|| AppError::Internal(format!("no schema registered for {}", name)))
        };
        let articles = CrudService::new(schema(ARTICLE)?, store.clone());
        let users = UserService::new(
            CrudService::new(schema(USER)?, store.clone()),
            config.hash_passwords,
        );
        Ok(AppState {
            config: Arc::new(config),
            store,
            catalog: Arc::new(catalog),
            articles,
            users,
            log_sink: Arc::new(TracingSink),
        })
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// Install collections and unique constraints for every catalog entity.
    pub async fn prepare_store(&self) -> Result<(), AppError> {
        for schema in self.catalog.iter() {
            self.store.prepare(schema).await?;
            tracing::debug!(entity = %schema.name, "store prepared");
        }
        Ok(())
    }
}
