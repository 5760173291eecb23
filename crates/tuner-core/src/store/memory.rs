//! In-process key-value store
//!
//! Backed by a dashmap. State is lost on restart and not shared between
//! processes.

use super::KvStore;
use crate::error::StoreResult;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

/// Dashmap-backed [`KvStore`]
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    items: DashMap<(String, String), Value>,
}

impl MemoryKvStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of documents across tables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no documents
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn key_of(table: &str, key: &str) -> (String, String) {
    (table.to_string(), key.to_string())
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.items.get(&key_of(table, key)).map(|item| item.value().clone()))
    }

    async fn put(&self, table: &str, key: &str, item: Value) -> StoreResult<()> {
        self.items.insert(key_of(table, key), item);
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, key: &str, item: Value) -> StoreResult<bool> {
        match self.items.entry(key_of(table, key)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(true)
            }
        }
    }

    async fn scan(&self, table: &str) -> StoreResult<Vec<Value>> {
        Ok(self
            .items
            .iter()
            .filter(|entry| entry.key().0 == table)
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn put_and_get_are_table_scoped() {
        let store = MemoryKvStore::new();
        assert!(store.is_empty());
        store.put("t", "k", json!({"v": 1})).await.unwrap();
        store.put("t", "k", json!({"v": 2})).await.unwrap();

        assert_eq!(store.get("t", "k").await.unwrap(), Some(json!({"v": 2})));
        assert_eq!(store.get("other", "k").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn put_if_absent_keeps_first() {
        let store = MemoryKvStore::new();
        assert!(store.put_if_absent("t", "k", json!(1)).await.unwrap());
        assert!(!store.put_if_absent("t", "k", json!(2)).await.unwrap());
        assert_eq!(store.get("t", "k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn scan_is_per_table() {
        let store = MemoryKvStore::new();
        store.put("a", "1", json!(1)).await.unwrap();
        store.put("a", "2", json!(2)).await.unwrap();
        store.put("b", "1", json!(3)).await.unwrap();

        let mut items = store.scan("a").await.unwrap();
        items.sort_by_key(|v| v.as_i64());
        assert_eq!(items, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn concurrent_inserts_have_one_winner() {
        let store = Arc::new(MemoryKvStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.put_if_absent("users", "same@example.com", json!(i)).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
