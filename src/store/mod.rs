//! Document tree store.
//!
//! A hierarchical key-value tree addressed by `/`-separated paths such as
//! `users/{id}/addresses`. Two implementations share one contract:
//! [`MemoryStore`] for tests and single-node runs, and [`PgStore`] which keeps
//! every top-level child in a JSONB row. [`Backend`] picks one at startup.

mod memory;
mod postgres;
mod query;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use query::{compare_values, Limit, OrderBy, Query};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Cannot write below a non-object node at {0}")]
    NotAnObject(String),

    #[error("Malformed document at {path}: {source}")]
    Malformed { path: String, source: serde_json::Error },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Split and validate a path. The empty path addresses the root.
pub fn segments(path: &str) -> StoreResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() { return Ok(vec![]); }
    trimmed
        .split('/')
        .map(|seg| {
            if seg.is_empty() || seg.contains(['.', '#', '$', '[', ']']) {
                Err(StoreError::InvalidPath(path.to_string()))
            } else {
                Ok(seg)
            }
        })
        .collect()
}

/// Whether `key` names exactly one child.
pub fn is_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(['/', '.', '#', '$', '[', ']'])
}

/// Time-ordered child key for `push`.
pub fn push_key() -> String { uuid::Uuid::now_v7().simple().to_string() }

/// The operations every tree store supports.
///
/// Writing `Value::Null` anywhere is the same as removing that node, and
/// empty objects left behind by removals are pruned.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &str) -> impl Future<Output = StoreResult<Option<Value>>> + Send;

    fn set(&self, path: &str, value: Value) -> impl Future<Output = StoreResult<()>> + Send;

    /// Merge `fields` into the node at `path`; each key may itself be a relative path.
    fn update(&self, path: &str, fields: Map<String, Value>) -> impl Future<Output = StoreResult<()>> + Send;

    /// Append `value` under a fresh time-ordered key and return that key.
    fn push(&self, path: &str, value: Value) -> impl Future<Output = StoreResult<String>> + Send;

    fn remove(&self, path: &str) -> impl Future<Output = StoreResult<()>> + Send;

    /// Apply every `(path, value)` write or none of them.
    fn update_many(&self, writes: Vec<(String, Value)>) -> impl Future<Output = StoreResult<()>> + Send;

    /// Children of `path` matching `query`, in query order.
    fn query(&self, path: &str, query: &Query) -> impl Future<Output = StoreResult<Vec<(String, Value)>>> + Send;

    /// Atomic read-modify-write. `apply` sees the current value and returns the
    /// replacement, or `None` to abort. Returns the committed value.
    fn transaction<F>(&self, path: &str, apply: F) -> impl Future<Output = StoreResult<Option<Value>>> + Send
    where
        F: FnOnce(Option<Value>) -> Option<Value> + Send;
}

/// Runtime-selected store.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryStore),
    Postgres(PgStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Backend::Memory($store) => $call.await,
            Backend::Postgres($store) => $call.await,
        }
    };
}

impl DocumentStore for Backend {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> { dispatch!(self, s => s.get(path)) }
    async fn set(&self, path: &str, value: Value) -> StoreResult<()> { dispatch!(self, s => s.set(path, value)) }
    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> { dispatch!(self, s => s.update(path, fields)) }
    async fn push(&self, path: &str, value: Value) -> StoreResult<String> { dispatch!(self, s => s.push(path, value)) }
    async fn remove(&self, path: &str) -> StoreResult<()> { dispatch!(self, s => s.remove(path)) }
    async fn update_many(&self, writes: Vec<(String, Value)>) -> StoreResult<()> { dispatch!(self, s => s.update_many(writes)) }
    async fn query(&self, path: &str, query: &Query) -> StoreResult<Vec<(String, Value)>> { dispatch!(self, s => s.query(path, query)) }

    async fn transaction<F>(&self, path: &str, apply: F) -> StoreResult<Option<Value>>
    where
        F: FnOnce(Option<Value>) -> Option<Value> + Send,
    {
        dispatch!(self, s => s.transaction(path, apply))
    }
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Serialize an entity for storage, dropping its `id` (the id is the node key).
pub fn to_document<T: Serialize>(entity: &T) -> Value {
    let mut value = serde_json::to_value(entity).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value { map.remove("id"); }
    value
}

/// Deserialize a stored node, injecting its key as `id`.
pub fn from_document<T: DeserializeOwned>(path: &str, key: &str, mut value: Value) -> StoreResult<T> {
    if let Value::Object(map) = &mut value { map.insert("id".into(), Value::String(key.to_string())); }
    serde_json::from_value(value).map_err(|source| StoreError::Malformed { path: format!("{path}/{key}"), source })
}

/// Fetch and decode one entity at `{collection}/{key}`.
pub async fn fetch<T, S>(store: &S, collection: &str, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    match store.get(&format!("{collection}/{key}")).await? {
        Some(value) => from_document(collection, key, value).map(Some),
        None => Ok(None),
    }
}

/// Decode every child of `collection` matching `query`. Malformed children are skipped with a warning.
pub async fn list<T, S>(store: &S, collection: &str, query: &Query) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    let children = store.query(collection, query).await?;
    Ok(children
        .into_iter()
        .filter_map(|(key, value)| match from_document(collection, &key, value) {
            Ok(entity) => Some(entity),
            Err(err) => {
                tracing::warn!(%collection, %key, error = %err, "skipping malformed document");
                None
            }
        })
        .collect())
}

/// Write `value` at `path` within a JSON tree, creating intermediate objects.
/// `Value::Null` removes the node and prunes emptied parents.
pub(crate) fn write_at(root: &mut Value, segs: &[&str], value: Value) -> StoreResult<()> {
    let Some((last, parents)) = segs.split_last() else {
        *root = if value.is_null() { Value::Object(Map::new()) } else { value };
        return Ok(());
    };
    if value.is_null() {
        remove_at(root, segs);
        return Ok(());
    }
    let mut node = root;
    for seg in parents {
        if node.is_null() { *node = Value::Object(Map::new()); }
        let Value::Object(map) = node else { return Err(StoreError::NotAnObject(segs.join("/"))) };
        node = map.entry(seg.to_string()).or_insert(Value::Null);
    }
    if node.is_null() { *node = Value::Object(Map::new()); }
    let Value::Object(map) = node else { return Err(StoreError::NotAnObject(segs.join("/"))) };
    map.insert(last.to_string(), value);
    Ok(())
}

fn remove_at(root: &mut Value, segs: &[&str]) -> bool {
    let Some((first, rest)) = segs.split_first() else { return false };
    let Some(map) = root.as_object_mut() else { return false };
    if rest.is_empty() {
        map.remove(*first);
    } else if let Some(child) = map.get_mut(*first) {
        remove_at(child, rest);
        if child.as_object().is_some_and(Map::is_empty) { map.remove(*first); }
    }
    map.is_empty()
}

pub(crate) fn read_at<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    segs.iter().try_fold(root, |node, seg| node.get(*seg)).filter(|v| !v.is_null())
}

pub(crate) fn children_of(node: Option<&Value>) -> Vec<(String, Value)> {
    match node {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segments_rejects_forbidden_characters() {
        assert_eq!(segments("users/abc").unwrap(), vec!["users", "abc"]);
        assert!(segments("").unwrap().is_empty());
        assert!(matches!(segments("users/a.b"), Err(StoreError::InvalidPath(_))));
        assert!(matches!(segments("users//x"), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn test_write_at_creates_and_prunes() {
        let mut root = json!({});
        write_at(&mut root, &["users", "u1", "addresses", "a1"], json!({"city": "Lagos"})).unwrap();
        assert_eq!(read_at(&root, &["users", "u1", "addresses", "a1", "city"]), Some(&json!("Lagos")));

        write_at(&mut root, &["users", "u1", "addresses", "a1"], Value::Null).unwrap();
        assert_eq!(root, json!({}));
    }

    #[test]
    fn test_write_below_scalar_fails() {
        let mut root = json!({"site_settings": 5});
        assert!(matches!(write_at(&mut root, &["site_settings", "x", "y"], json!(1)), Err(StoreError::NotAnObject(_))));
    }

    #[test]
    fn test_document_round_trip_injects_key() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Doc { id: String, name: String }
        let stored = to_document(&Doc { id: "ignored".into(), name: "Bags".into() });
        assert_eq!(stored, json!({"name": "Bags"}));
        let back: Doc = from_document("categories", "k1", stored).unwrap();
        assert_eq!(back, Doc { id: "k1".into(), name: "Bags".into() });
    }
}
