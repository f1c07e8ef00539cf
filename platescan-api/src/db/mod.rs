//! Vehicle registry datastore access
//!
//! The registry is an external collaborator reached over HTTP: a
//! PostgREST-style table API (`/rest/v1/{table}`) plus an object store
//! (`/storage/v1/object/{bucket}/{path}`). This module owns the narrow
//! request/response contract; query validation lives in [`query_spec`].

pub mod query_spec;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use query_spec::QuerySpec;

/// A registry row as returned by the table API
pub type Row = serde_json::Map<String, Value>;

/// Registry client errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Registry datastore contract: filtered select, insert, object upload.
///
/// Implemented over HTTP in production and by in-memory fakes in tests.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Execute a validated single-table read. Filters compose conjunctively,
    /// in list order. Returns the rows in datastore order, possibly empty.
    async fn select(&self, query: &QuerySpec) -> Result<Vec<Row>, RegistryError>;

    /// Insert one row into a table.
    async fn insert(&self, table: &str, row: Value) -> Result<(), RegistryError>;

    /// Upload bytes to a bucket and return the public URL.
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RegistryError>;
}

/// HTTP registry client (Supabase-style REST + storage)
pub struct HttpRegistry {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Render a filter value for the wire. Pattern operators get `*`
    /// wildcards wrapped around bare values (case-insensitive partial match).
    fn render_value(op: query_spec::FilterOp, value: &Value) -> String {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if op.is_pattern() && !text.contains('*') {
            format!("*{}*", text)
        } else {
            text
        }
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn select(&self, query: &QuerySpec) -> Result<Vec<Row>, RegistryError> {
        let url = format!("{}/rest/v1/{}", self.base_url, query.table);

        let mut params: Vec<(String, String)> = vec![("select".to_string(), query.select.to_wire())];
        for filter in &query.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.as_str(), Self::render_value(filter.op, &filter.value)),
            ));
        }
        params.push(("limit".to_string(), query.limit.to_string()));

        tracing::debug!(table = %query.table, filters = query.filters.len(), limit = query.limit, "Registry select");

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api(status.as_u16(), error_text));
        }

        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| RegistryError::Parse(e.to_string()))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<(), RegistryError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api(status.as_u16(), error_text));
        }

        Ok(())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RegistryError> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api(status.as_u16(), error_text));
        }

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        ))
    }
}
