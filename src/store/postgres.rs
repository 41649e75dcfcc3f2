//! PostgreSQL-backed tree store.
//!
//! Every `{collection}/{key}` node is one row of the `documents` table with a
//! JSONB body; anything deeper lives inside that body. Collection-level reads
//! assemble the rows back into an object. Writes load the affected rows
//! `FOR UPDATE`, patch them in memory and flush them in the same transaction.
//! The root node itself is not addressable here.

use serde_json::{Map, Value};
use sqlx::{postgres::PgPool, types::Json, Postgres, Transaction};
use std::collections::HashMap;

use super::{children_of, push_key, read_at, segments, write_at, DocumentStore, Query, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

type RowKey = (String, String);

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn collection(&self, collection: &str) -> StoreResult<Value> {
        let rows = sqlx::query_as::<_, (String, Json<Value>)>("SELECT key, body FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        Ok(into_object(rows))
    }

    async fn row(&self, collection: &str, key: &str) -> StoreResult<Option<Value>> {
        let row = sqlx::query_as::<_, (Json<Value>,)>("SELECT body FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(body),)| body))
    }

    async fn write_batch(&self, writes: Vec<(String, Value)>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut dirty: HashMap<RowKey, Value> = HashMap::new();

        for (path, value) in writes {
            let segs = segments(&path)?;
            match segs.as_slice() {
                [] => return Err(StoreError::InvalidPath(path.clone())),
                [collection] => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1").bind(*collection).execute(&mut *tx).await?;
                    dirty.retain(|(c, _), _| c.as_str() != *collection);
                    for (key, body) in children_of(Some(&value)) {
                        dirty.insert((collection.to_string(), key), body);
                    }
                }
                [collection, key, rest @ ..] => {
                    let row_key = (collection.to_string(), key.to_string());
                    if !dirty.contains_key(&row_key) {
                        let current = lock_row(&mut tx, collection, key).await?;
                        dirty.insert(row_key.clone(), current.unwrap_or(Value::Null));
                    }
                    if let Some(body) = dirty.get_mut(&row_key) {
                        if rest.is_empty() { *body = value; } else { write_at(body, rest, value)?; }
                    }
                }
            }
        }

        for ((collection, key), body) in dirty {
            flush_row(&mut tx, &collection, &key, body).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn into_object(rows: Vec<(String, Json<Value>)>) -> Value {
    Value::Object(rows.into_iter().map(|(key, Json(body))| (key, body)).collect())
}

async fn lock_row(tx: &mut Transaction<'_, Postgres>, collection: &str, key: &str) -> StoreResult<Option<Value>> {
    let row = sqlx::query_as::<_, (Json<Value>,)>("SELECT body FROM documents WHERE collection = $1 AND key = $2 FOR UPDATE")
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|(Json(body),)| body))
}

async fn flush_row(tx: &mut Transaction<'_, Postgres>, collection: &str, key: &str, body: Value) -> StoreResult<()> {
    let empty = body.is_null() || body.as_object().is_some_and(Map::is_empty);
    if empty {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND key = $2")
            .bind(collection)
            .bind(key)
            .execute(&mut **tx)
            .await?;
    } else {
        sqlx::query(
            "INSERT INTO documents (collection, key, body, updated_at) VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (collection, key) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()",
        )
        .bind(collection)
        .bind(key)
        .bind(Json(body))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl DocumentStore for PgStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let segs = segments(path)?;
        match segs.as_slice() {
            [] => Err(StoreError::InvalidPath(path.to_string())),
            [collection] => {
                let node = self.collection(collection).await?;
                Ok(node.as_object().is_some_and(|m| !m.is_empty()).then_some(node))
            }
            [collection, key, rest @ ..] => {
                let body = self.row(collection, key).await?;
                Ok(body.as_ref().and_then(|b| read_at(b, rest)).cloned())
            }
        }
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        self.write_batch(vec![(path.to_string(), value)]).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let base = path.trim_matches('/').to_string();
        let writes = fields
            .into_iter()
            .map(|(key, value)| (if base.is_empty() { key } else { format!("{base}/{key}") }, value))
            .collect();
        self.write_batch(writes).await
    }

    async fn push(&self, path: &str, value: Value) -> StoreResult<String> {
        let key = push_key();
        self.set(&format!("{}/{key}", path.trim_matches('/')), value).await?;
        Ok(key)
    }

    async fn remove(&self, path: &str) -> StoreResult<()> {
        self.set(path, Value::Null).await
    }

    async fn update_many(&self, writes: Vec<(String, Value)>) -> StoreResult<()> {
        self.write_batch(writes).await
    }

    async fn query(&self, path: &str, query: &Query) -> StoreResult<Vec<(String, Value)>> {
        let segs = segments(path)?;
        let children = match (segs.as_slice(), query.equality()) {
            ([collection], Some((child, value))) => {
                let child_path: Vec<&str> = child.split('/').collect();
                let rows = sqlx::query_as::<_, (String, Json<Value>)>(
                    "SELECT key, body FROM documents WHERE collection = $1 AND body #> $2 = $3",
                )
                .bind(*collection)
                .bind(child_path)
                .bind(Json(value.clone()))
                .fetch_all(&self.pool)
                .await?;
                rows.into_iter().map(|(key, Json(body))| (key, body)).collect()
            }
            _ => children_of(self.get(path).await?.as_ref()),
        };
        Ok(query.apply(children))
    }

    async fn transaction<F>(&self, path: &str, apply: F) -> StoreResult<Option<Value>>
    where
        F: FnOnce(Option<Value>) -> Option<Value> + Send,
    {
        let segs = segments(path)?;
        let [collection, key, rest @ ..] = segs.as_slice() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };
        let mut tx = self.pool.begin().await?;
        let mut body = lock_row(&mut tx, collection, key).await?.unwrap_or(Value::Null);
        let current = if rest.is_empty() { Some(body.clone()).filter(|v| !v.is_null()) } else { read_at(&body, rest).cloned() };

        let Some(next) = apply(current) else {
            tx.rollback().await?;
            return Ok(None);
        };
        if rest.is_empty() { body = next.clone(); } else { write_at(&mut body, rest, next.clone())?; }
        flush_row(&mut tx, collection, key, body).await?;
        tx.commit().await?;
        Ok(Some(next))
    }
}
