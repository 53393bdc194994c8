//! PostgreSQL document store: one JSONB table, unique fields as partial
//! expression indexes. The table lives in a configurable schema (default `quill`).

use crate::schema::{Document, EntitySchema, ID_FIELD};
use crate::store::{DocumentStore, Filter, Page, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

const TABLE: &str = "documents";
const UNIQUE_INDEX_PREFIX: &str = "uq_";

pub struct PgDocumentStore {
    pool: PgPool,
    schema: String,
}

impl PgDocumentStore {
    /// Open a pool and make sure the document table exists.
    pub async fn connect(
        database_url: &str,
        schema: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(map_sqlx)?;
        let store = Self::from_pool(pool, schema);
        store.ensure_tables().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool, schema: &str) -> Self {
        PgDocumentStore {
            pool,
            schema: schema.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the pool. Waits for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn table(&self) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(TABLE))
    }

    pub async fn ensure_tables(&self) -> Result<(), StoreError> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&self.schema)))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        let table = self.table();
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                entity TEXT NOT NULL,
                id TEXT NOT NULL,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (entity, id)
            )
            "#,
            table
        );
        sqlx::query(&ddl).execute(&self.pool).await.map_err(map_sqlx)?;
        let order_idx = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (entity, created_at)",
            quoted("documents_entity_created"),
            table
        );
        sqlx::query(&order_idx).execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        entity: &str,
        id: &str,
        doc: Option<&Document>,
    ) -> Result<Option<Document>, StoreError> {
        tracing::debug!(sql = %sql, entity = %entity, id = %id, "query");
        let mut q = sqlx::query_scalar::<_, Value>(sql).bind(entity).bind(id);
        if let Some(d) = doc {
            q = q.bind(Json(d));
        }
        let row = q.fetch_optional(&self.pool).await.map_err(map_sqlx)?;
        row.map(into_document).transpose()
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn prepare(&self, schema: &EntitySchema) -> Result<(), StoreError> {
        for field in schema.unique_fields() {
            let sql = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ((doc->>{})) WHERE entity = {}",
                quoted(&unique_index_name(&schema.name, field)),
                self.table(),
                literal(field),
                literal(&schema.name)
            );
            tracing::debug!(sql = %sql, "ddl");
            sqlx::query(&sql).execute(&self.pool).await.map_err(map_sqlx)?;
        }
        Ok(())
    }

    async fn insert(&self, entity: &str, mut doc: Document) -> Result<Document, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.into(), Value::String(id.clone()));
        let sql = format!(
            "INSERT INTO {} (entity, id, doc) VALUES ($1, $2, $3) RETURNING doc",
            self.table()
        );
        self.fetch_optional(&sql, entity, &id, Some(&doc))
            .await?
            .ok_or_else(|| StoreError::Backend("insert returned no row".into()))
    }

    async fn query(
        &self,
        entity: &str,
        filter: &Filter,
        page: Page,
    ) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE entity = $1 AND doc @> $2 ORDER BY created_at, id LIMIT $3 OFFSET $4",
            self.table()
        );
        let contains: Map<String, Value> = filter.iter().cloned().collect();
        tracing::debug!(sql = %sql, entity = %entity, filter = ?contains, "query");
        let rows = sqlx::query_scalar::<_, Value>(&sql)
            .bind(entity)
            .bind(Json(&contains))
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.into_iter().map(into_document).collect()
    }

    async fn get_by_id(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE entity = $1 AND id = $2", self.table());
        self.fetch_optional(&sql, entity, id, None).await
    }

    async fn update(
        &self,
        entity: &str,
        id: &str,
        mut doc: Document,
    ) -> Result<Option<Document>, StoreError> {
        doc.insert(ID_FIELD.into(), Value::String(id.to_string()));
        let sql = format!(
            "UPDATE {} SET doc = $3 WHERE entity = $1 AND id = $2 RETURNING doc",
            self.table()
        );
        self.fetch_optional(&sql, entity, id, Some(&doc)).await
    }

    async fn delete(&self, entity: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE entity = $1 AND id = $2 RETURNING doc",
            self.table()
        );
        self.fetch_optional(&sql, entity, id, None).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .fetch_optional(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}

/// Create the target database if it does not exist (connects to `postgres` on the same server).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(map_sqlx)?;
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await
            .map_err(map_sqlx)?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(map_sqlx)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn into_document(v: Value) -> Result<Document, StoreError> {
    match v {
        Value::Object(m) => Ok(m),
        _ => Err(StoreError::Backend("stored document is not a JSON object".into())),
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn unique_index_name(entity: &str, field: &str) -> String {
    format!("{}{}_{}", UNIQUE_INDEX_PREFIX, entity, field)
}

/// (entity, field) back from a `uq_<entity>_<field>` index name.
fn parse_unique_index(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix(UNIQUE_INDEX_PREFIX)?;
    let (entity, field) = rest.split_once('_')?;
    Some((entity.to_string(), field.to_string()))
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let (entity, field) = db
                .constraint()
                .and_then(parse_unique_index)
                .unwrap_or_else(|| ("document".to_string(), ID_FIELD.to_string()));
            StoreError::UniqueConflict { entity, field }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        _ => StoreError::Backend(e.to_string()),
    }
}
