//! Elasticsearch `_bulk` endpoint contract and HTTP client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::IndexerError;

/// Outcome of one operation within a bulk response, positionally matched to
/// the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub id: String,
    pub status: u16,
    pub error: Option<String>,
}

/// Parsed bulk response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

/// Transport to the Elasticsearch bulk endpoint.
#[async_trait]
pub trait ElasticsearchClient: Send + Sync {
    /// Submit an NDJSON bulk body. An `Err` means the whole batch failed;
    /// per-item failures come back inside the response.
    async fn bulk(&self, body: String) -> Result<BulkResponse, IndexerError>;
}

/// reqwest-backed client for a single Elasticsearch endpoint.
pub struct HttpElasticsearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpElasticsearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, RawBulkItem>>,
}

#[derive(Debug, Deserialize)]
struct RawBulkItem {
    #[serde(rename = "_id", default)]
    id: String,
    status: u16,
    error: Option<serde_json::Value>,
}

#[async_trait]
impl ElasticsearchClient for HttpElasticsearchClient {
    async fn bulk(&self, body: String) -> Result<BulkResponse, IndexerError> {
        let url = format!("{}/_bulk", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| IndexerError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::Http(format!(
                "bulk endpoint returned {status}"
            )));
        }

        let raw: RawBulkResponse = response
            .json()
            .await
            .map_err(|e| IndexerError::Http(format!("bulk response parse: {e}")))?;

        let items = raw
            .items
            .into_iter()
            .filter_map(|entry| entry.into_values().next())
            .map(|item| BulkItemResult {
                id: item.id,
                status: item.status,
                error: item.error.map(|v| v.to_string()),
            })
            .collect();

        Ok(BulkResponse {
            errors: raw.errors,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_response_parses_single_key_items() {
        let json = r#"{
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_index": "vis", "_id": "run1", "status": 201}},
                {"index": {"_index": "vis", "_id": "run2", "status": 409,
                           "error": {"type": "version_conflict_engine_exception"}}}
            ]
        }"#;
        let raw: RawBulkResponse = serde_json::from_str(json).unwrap();
        assert!(raw.errors);
        assert_eq!(raw.items.len(), 2);

        let first = raw.items[0].get("index").unwrap();
        assert_eq!(first.id, "run1");
        assert_eq!(first.status, 201);
        let second = raw.items[1].get("index").unwrap();
        assert_eq!(second.status, 409);
        assert!(second.error.is_some());
    }
}
