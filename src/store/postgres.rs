// src/store/postgres.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, types::Json};

use super::{Collection, DocumentBackend, Filter, RawDocument, StoreError};

/// JSONB-backed document storage. See `migrations/` for the `documents` table.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_raw(value: Value) -> RawDocument {
    match value {
        Value::Object(map) => map,
        _ => RawDocument::new(),
    }
}

/// Splits a patch into the keys to set and the keys to remove (null values).
fn split_patch(patch: RawDocument) -> (RawDocument, Vec<String>) {
    let mut set = RawDocument::new();
    let mut removed = Vec::new();
    for (key, value) in patch {
        if value.is_null() {
            removed.push(key);
        } else {
            set.insert(key, value);
        }
    }
    (set, removed)
}

#[async_trait]
impl DocumentBackend for PgBackend {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<RawDocument>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(data),)| into_raw(data)))
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<(String, RawDocument)>, StoreError> {
        // Equality filters become a single JSONB containment check.
        let containment: RawDocument = filters
            .iter()
            .map(|f| (f.field.to_string(), f.value.clone()))
            .collect();

        let rows: Vec<(String, Json<Value>)> = sqlx::query_as(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND data @> $2::JSONB
            ORDER BY id
            "#,
        )
        .bind(collection.as_str())
        .bind(Json(Value::Object(containment)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| (id, into_raw(data)))
            .collect())
    }

    async fn set(&self, collection: Collection, id: &str, doc: RawDocument) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(Value::Object(doc)))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        patch: RawDocument,
        create_missing: bool,
    ) -> Result<bool, StoreError> {
        let (set, removed) = split_patch(patch);

        let result = if create_missing {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO UPDATE SET
                    data = (documents.data || EXCLUDED.data) - $4::TEXT[],
                    updated_at = NOW()
                "#,
            )
            .bind(collection.as_str())
            .bind(id)
            .bind(Json(Value::Object(set)))
            .bind(&removed)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE documents
                SET data = (data || $3::JSONB) - $4::TEXT[], updated_at = NOW()
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(collection.as_str())
            .bind(id)
            .bind(Json(Value::Object(set)))
            .bind(&removed)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() > 0)
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = jsonb_set(
                    data,
                    ARRAY[$3::TEXT],
                    to_jsonb(COALESCE((data->>$3::TEXT)::BIGINT, 0) + $4::BIGINT)
                ),
                updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(field)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
