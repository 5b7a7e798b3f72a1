//! PostgreSQL-backed document store.
//!
//! Every document lives in one `documents` table keyed by (collection, id)
//! with its fields in a JSONB column. Equality filters become a single JSONB
//! containment predicate so they can use the GIN index.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::{BaseDocumentStore, Document, Fields, Filter};

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    fields: sqlx::types::Json<Fields>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document::new(row.id, row.fields.0)
    }
}

/// Document store over a Postgres pool
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the schema migrations shipped with this crate.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")
    }
}

/// Fold equality filters into one JSONB object for `fields @> $2`.
fn containment(filters: &[Filter]) -> Value {
    let mut map = Fields::new();
    for filter in filters {
        map.insert(filter.field.clone(), filter.value.clone());
    }
    Value::Object(map)
}

#[async_trait]
impl BaseDocumentStore for PostgresDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read {}/{}", collection, id))?;
        Ok(row.map(Into::into))
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, fields FROM documents
             WHERE collection = $1 AND fields @> $2
             ORDER BY id",
        )
        .bind(collection)
        .bind(containment(filters))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query {}", collection))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET fields = EXCLUDED.fields, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(sqlx::types::Json(fields))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write {}/{}", collection, id))?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET fields = fields || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(sqlx::types::Json(fields))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update {}/{}", collection, id))?;

        if result.rows_affected() == 0 {
            anyhow::bail!("No document to update at {}/{}", collection, id);
        }
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        sqlx::query("INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(sqlx::types::Json(fields))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to add to {}", collection))?;
        Ok(id)
    }

    async fn create(&self, collection: &str, id: &str, fields: Fields) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(sqlx::types::Json(fields))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create {}/{}", collection, id))?;
        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }
}
