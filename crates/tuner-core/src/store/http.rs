//! REST document store client
//!
//! Layout of the remote API:
//!
//! ```text
//! GET    {base}/{table}          → JSON array of documents
//! GET    {base}/{table}/{key}    → document, 404 when absent
//! PUT    {base}/{table}/{key}    → store document (If-None-Match: * for create-only)
//! ```

use super::KvStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// [`KvStore`] over a REST document service
#[derive(Debug, Clone)]
pub struct HttpKvStore {
    client: Client,
    base: Url,
}

impl HttpKvStore {
    /// Create client for a base URL
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the URL is invalid or the client
    /// cannot be built.
    pub fn new(base: &str, timeout: Duration) -> StoreResult<Self> {
        let base = Url::parse(base).map_err(|e| StoreError::Backend(format!("{base}: {e}")))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Backend(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn unexpected(method: &str, url: &Url, status: StatusCode) -> StoreError {
    StoreError::Backend(format!("{method} {url} returned {status}"))
}

#[async_trait]
impl KvStore for HttpKvStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Value>> {
        let url = self.url(&[table, key])?;
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(unexpected("GET", &url, status)),
        }
    }

    async fn put(&self, table: &str, key: &str, item: Value) -> StoreResult<()> {
        let url = self.url(&[table, key])?;
        let response = self.client.put(url.clone()).json(&item).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unexpected("PUT", &url, response.status()))
        }
    }

    async fn put_if_absent(&self, table: &str, key: &str, item: Value) -> StoreResult<bool> {
        let url = self.url(&[table, key])?;
        let response = self
            .client
            .put(url.clone())
            .header(header::IF_NONE_MATCH, "*")
            .json(&item)
            .send()
            .await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(unexpected("PUT", &url, status)),
        }
    }

    async fn scan(&self, table: &str) -> StoreResult<Vec<Value>> {
        let url = self.url(&[table])?;
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(unexpected("GET", &url, status)),
        }
    }

    fn backend(&self) -> &'static str {
        "http"
    }
}
