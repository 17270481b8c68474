//! Scripted Elasticsearch client.
//!
//! With no scripted responses, every submitted operation succeeds with a
//! 200 derived from the request framing. Tests enqueue explicit responses
//! or errors to exercise the reconciliation paths.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::IndexerError;
use crate::indexer::bulk::parse_bulk_header;
use crate::indexer::es_client::{BulkItemResult, BulkResponse, ElasticsearchClient};

#[derive(Default)]
pub struct ScriptedEsClient {
    responses: Mutex<VecDeque<Result<BulkResponse, String>>>,
    bodies: Mutex<Vec<String>>,
}

impl ScriptedEsClient {
    pub fn enqueue_ok(&self, response: BulkResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(response));
        }
    }

    pub fn enqueue_err(&self, message: &str) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(message.to_string()));
        }
    }

    /// All NDJSON bodies submitted so far.
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.bodies.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Build a response with one item per (id, status) pair.
    pub fn response(items: &[(&str, u16)]) -> BulkResponse {
        BulkResponse {
            errors: items.iter().any(|(_, status)| *status >= 300),
            items: items
                .iter()
                .map(|(id, status)| BulkItemResult {
                    id: id.to_string(),
                    status: *status,
                    error: None,
                })
                .collect(),
        }
    }

    /// Derive an all-success response from a request body.
    fn auto_success(body: &str) -> BulkResponse {
        let mut items = Vec::new();
        let mut lines = body.lines();
        while let Some(line) = lines.next() {
            let Ok((op, header)) = parse_bulk_header(line) else {
                continue;
            };
            if op == "index" {
                // Consume the document line.
                lines.next();
            }
            items.push(BulkItemResult {
                id: header.id,
                status: 200,
                error: None,
            });
        }
        BulkResponse {
            errors: false,
            items,
        }
    }
}

#[async_trait]
impl ElasticsearchClient for ScriptedEsClient {
    async fn bulk(&self, body: String) -> Result<BulkResponse, IndexerError> {
        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front());

        let result = match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(IndexerError::Http(message)),
            None => Ok(Self::auto_success(&body)),
        };

        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push(body);
        }
        result
    }
}
