//! In-process tree store.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{children_of, push_key, read_at, segments, write_at, DocumentStore, Query, StoreResult};

/// Whole tree behind one lock, so multi-path updates and transactions are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    root: Arc<RwLock<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self { root: Arc::new(RwLock::new(Value::Object(Map::new()))) } }

    /// Seed the tree, e.g. from a JSON export.
    pub fn with_data(data: Value) -> Self { Self { root: Arc::new(RwLock::new(data)) } }

    pub async fn snapshot(&self) -> Value { self.root.read().await.clone() }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> StoreResult<Option<Value>> {
        let segs = segments(path)?;
        let root = self.root.read().await;
        Ok(read_at(&root, &segs).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> StoreResult<()> {
        let segs = segments(path)?;
        let mut root = self.root.write().await;
        write_at(&mut root, &segs, value)
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> StoreResult<()> {
        let base = path.trim_matches('/').to_string();
        let writes = fields
            .into_iter()
            .map(|(key, value)| (if base.is_empty() { key } else { format!("{base}/{key}") }, value))
            .collect();
        self.update_many(writes).await
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
        let mut root = self.root.write().await;
        // Work on a copy so a failing write leaves the tree untouched.
        let mut next = root.clone();
        for (path, value) in writes {
            let segs = segments(&path)?;
            write_at(&mut next, &segs, value)?;
        }
        *root = next;
        Ok(())
    }

    async fn query(&self, path: &str, query: &Query) -> StoreResult<Vec<(String, Value)>> {
        let segs = segments(path)?;
        let root = self.root.read().await;
        Ok(query.apply(children_of(read_at(&root, &segs))))
    }

    async fn transaction<F>(&self, path: &str, apply: F) -> StoreResult<Option<Value>>
    where
        F: FnOnce(Option<Value>) -> Option<Value> + Send,
    {
        let segs = segments(path)?;
        let mut root = self.root.write().await;
        let current = read_at(&root, &segs).cloned();
        match apply(current) {
            Some(next) => {
                write_at(&mut root, &segs, next.clone())?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("categories/c1", json!({"name": "Bags", "slug": "bags"})).await.unwrap();
        assert_eq!(store.get("categories/c1/slug").await.unwrap(), Some(json!("bags")));

        store.remove("categories/c1").await.unwrap();
        assert_eq!(store.get("categories/c1").await.unwrap(), None);
        assert_eq!(store.snapshot().await, json!({}));
    }

    #[tokio::test]
    async fn test_push_keys_are_time_ordered() {
        let store = MemoryStore::new();
        let first = store.push("orders", json!({"total": 1})).await.unwrap();
        let second = store.push("orders", json!({"total": 2})).await.unwrap();
        assert!(first < second);

        let rows = store.query("orders", &Query::order_by_key()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, first);
    }

    #[tokio::test]
    async fn test_update_merges_relative_paths() {
        let store = MemoryStore::new();
        store.set("site_settings", json!({"site_name": {"name": "Shop"}, "flash_sale": {"active": false}})).await.unwrap();
        let mut fields = Map::new();
        fields.insert("flash_sale/active".into(), json!(true));
        store.update("site_settings", fields).await.unwrap();

        let settings = store.get("site_settings").await.unwrap().unwrap();
        assert_eq!(settings["flash_sale"]["active"], json!(true));
        assert_eq!(settings["site_name"]["name"], json!("Shop"));
    }

    #[tokio::test]
    async fn test_update_many_is_all_or_nothing() {
        let store = MemoryStore::with_data(json!({"products": {"p1": {"stock": 5}}, "flag": 1}));
        let writes = vec![
            ("products/p1/stock".to_string(), json!(4)),
            ("flag/nested".to_string(), json!(true)),
        ];
        assert!(store.update_many(writes).await.is_err());
        assert_eq!(store.get("products/p1/stock").await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_transaction_commit_and_abort() {
        let store = MemoryStore::with_data(json!({"products": {"p1": {"stock": 2}}}));
        let take = |n: i64| move |current: Option<Value>| {
            let stock = current.and_then(|v| v.as_i64()).unwrap_or(0);
            (stock >= n).then(|| json!(stock - n))
        };
        assert_eq!(store.transaction("products/p1/stock", take(2)).await.unwrap(), Some(json!(0)));
        assert_eq!(store.transaction("products/p1/stock", take(1)).await.unwrap(), None);
        assert_eq!(store.get("products/p1/stock").await.unwrap(), Some(json!(0)));
    }
}
