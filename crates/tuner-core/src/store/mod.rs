//! Key-value store seam
//!
//! Users, job records and endpoint records are JSON documents addressed by
//! `(table, key)`. The store is owned externally; [`MemoryKvStore`] exists for
//! tests and single-process development only.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

mod http;
mod memory;

pub use http::HttpKvStore;
pub use memory::MemoryKvStore;

/// Document store keyed by table and key
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Fetch a document
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>>;

    /// Insert or replace a document
    async fn put(&self, table: &str, key: &str, item: Value) -> StoreResult<()>;

    /// Insert only if the key is absent; `false` when it already existed
    async fn put_if_absent(&self, table: &str, key: &str, item: Value) -> StoreResult<bool>;

    /// All documents in a table, in no particular order
    async fn scan(&self, table: &str) -> StoreResult<Vec<Value>>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

/// Fetch and deserialize a document
///
/// # Errors
///
/// Propagates store failures and [`crate::StoreError::Serialization`].
pub async fn load<T: DeserializeOwned>(
    store: &dyn KvStore,
    table: &str,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(table, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store a document
///
/// # Errors
///
/// Propagates store failures and [`crate::StoreError::Serialization`].
pub async fn save<T: Serialize + Sync>(
    store: &dyn KvStore,
    table: &str,
    key: &str,
    item: &T,
) -> StoreResult<()> {
    store.put(table, key, serde_json::to_value(item)?).await
}

/// Serialize and store a document unless the key is taken
///
/// Returns `false`, leaving the existing document untouched, when the key is
/// already present.
///
/// # Errors
///
/// Propagates store failures and [`crate::StoreError::Serialization`].
pub async fn insert<T: Serialize + Sync>(
    store: &dyn KvStore,
    table: &str,
    key: &str,
    item: &T,
) -> StoreResult<bool> {
    store.put_if_absent(table, key, serde_json::to_value(item)?).await
}

/// Deserialize every document in a table, skipping ones that do not fit `T`
///
/// # Errors
///
/// Propagates store failures.
pub async fn scan_as<T: DeserializeOwned>(store: &dyn KvStore, table: &str) -> StoreResult<Vec<T>> {
    let items = store.scan(table).await?;
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(table, error = %e, "skipping malformed record");
                None
            }
        })
        .collect())
}
