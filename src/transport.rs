//! HTTP transport for the sync engine.
//!
//! Maps operations onto the finance API: inserts POST to the resource
//! collection, updates PUT and deletes DELETE the payload's record,
//! batches POST to the collection's /batch endpoint. reqwest failure
//! modes are folded into [`OpError`] fields so the classifier can tell
//! transient from permanent failures.

use finsync_core::{OpError, OpKind, Operation, Transport};
use futures::future::BoxFuture;
use serde_json::Value;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url_for(&self, operation: &Operation) -> String {
        let collection = format!("{}/{}", self.base_url, operation.resource);
        match operation.kind {
            OpKind::Insert => collection,
            OpKind::Batch => format!("{}/batch", collection),
            OpKind::Update | OpKind::Delete => {
                // Record endpoints address the payload's id when present.
                match operation.payload.get("id").and_then(Value::as_str) {
                    Some(id) => format!("{}/{}", collection, id),
                    None => collection,
                }
            }
        }
    }

    async fn send(&self, operation: &Operation) -> Result<Value, OpError> {
        let url = self.url_for(operation);
        tracing::debug!(url = %url, kind = %operation.kind, "dispatching operation");

        let mut request = match operation.kind {
            OpKind::Insert | OpKind::Batch => self.client.post(&url).json(&operation.payload),
            OpKind::Update => self.client.put(&url).json(&operation.payload),
            OpKind::Delete => self.client.delete(&url),
        };

        request = request.header("Idempotency-Key", operation.id.to_string());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("server returned status {}", status.as_u16())
            } else {
                body
            };
            return Err(OpError::new(message).with_status(status.as_u16()));
        }

        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

/// Folds reqwest failure modes into classifiable [`OpError`] fields.
fn map_reqwest_error(error: reqwest::Error) -> OpError {
    if error.is_timeout() {
        OpError::new("request timed out").with_code("ETIMEDOUT")
    } else if error.is_connect() {
        OpError::new(format!("network error: {}", error)).with_code("ECONNREFUSED")
    } else {
        let mut op_error = OpError::new(error.to_string());
        if let Some(status) = error.status() {
            op_error = op_error.with_status(status.as_u16());
        }
        op_error
    }
}

impl Transport for HttpTransport {
    fn perform<'a>(&'a self, operation: &'a Operation) -> BoxFuture<'a, Result<Value, OpError>> {
        Box::pin(self.send(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn transport() -> HttpTransport {
        HttpTransport::new("http://localhost:8080/api/", None)
    }

    #[test]
    fn test_insert_targets_collection() {
        let op = Operation::new(OpKind::Insert, "transactions", json!({"amount": 10}));
        assert_eq!(
            transport().url_for(&op),
            "http://localhost:8080/api/transactions"
        );
    }

    #[test]
    fn test_update_targets_record() {
        let op = Operation::new(OpKind::Update, "transactions", json!({"id": "tx1"}));
        assert_eq!(
            transport().url_for(&op),
            "http://localhost:8080/api/transactions/tx1"
        );
    }

    #[test]
    fn test_delete_without_id_falls_back_to_collection() {
        let op = Operation::new(OpKind::Delete, "accounts", json!({}));
        assert_eq!(
            transport().url_for(&op),
            "http://localhost:8080/api/accounts"
        );
    }

    #[test]
    fn test_batch_targets_batch_endpoint() {
        let op = Operation::new(OpKind::Batch, "transactions", json!([]));
        assert_eq!(
            transport().url_for(&op),
            "http://localhost:8080/api/transactions/batch"
        );
    }
}
