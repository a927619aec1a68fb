use async_trait::async_trait;
use readmevec_core::BatchState;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EmbedError, EmbedResult};
use crate::provider::{BatchEmbedProvider, BatchStatus};

/// Nebius's asynchronous batch endpoint: upload NDJSON manifest, create a
/// batch job referencing the uploaded file, poll until terminal, download
/// the NDJSON results file.
pub struct NebiusBatchClient {
    http: reqwest::Client,
    base_url: String,
}

impl NebiusBatchClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreateBatchResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchStatusResponse {
    status: String,
    #[serde(default)]
    request_counts: Option<RequestCounts>,
    #[serde(default)]
    output_file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestCounts {
    completed: u64,
    total: u64,
}

fn parse_state(status: &str) -> BatchState {
    match status {
        "validating" => BatchState::Validating,
        "in_progress" => BatchState::InProgress,
        "completed" => BatchState::Completed,
        "expired" => BatchState::Expired,
        "cancelled" | "cancelling" => BatchState::Cancelled,
        _ => BatchState::Failed,
    }
}

#[async_trait]
impl BatchEmbedProvider for NebiusBatchClient {
    async fn upload_manifest(&self, ndjson: Vec<u8>, api_key: &str) -> EmbedResult<String> {
        let form = reqwest::multipart::Form::new()
            .text("purpose", "batch")
            .part("file", reqwest::multipart::Part::bytes(ndjson).file_name("manifest.jsonl"));

        let resp = self
            .http
            .post(self.url("/v1/files"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: UploadResponse = resp.json().await.map_err(|e| EmbedError::Decode(e.to_string()))?;
        Ok(parsed.id)
    }

    async fn create_batch(&self, file_id: &str, api_key: &str) -> EmbedResult<String> {
        let body = json!({
            "input_file_id": file_id,
            "endpoint": "/v1/embeddings",
            "completion_window": "24h",
        });
        let resp = self
            .http
            .post(self.url("/v1/batches"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: CreateBatchResponse = resp.json().await.map_err(|e| EmbedError::Decode(e.to_string()))?;
        Ok(parsed.id)
    }

    async fn batch_status(&self, batch_id: &str, api_key: &str) -> EmbedResult<BatchStatus> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/batches/{batch_id}")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let parsed: BatchStatusResponse = resp.json().await.map_err(|e| EmbedError::Decode(e.to_string()))?;

        let (completed, total) = parsed
            .request_counts
            .map(|c| (c.completed, c.total))
            .unwrap_or((0, 0));

        Ok(BatchStatus {
            state: parse_state(&parsed.status),
            completed,
            total,
            output_file_id: parsed.output_file_id,
        })
    }

    async fn download_results(&self, file_id: &str, api_key: &str) -> EmbedResult<Vec<u8>> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/files/{file_id}/content")))
            .bearer_auth(api_key)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

async fn check_status(resp: reqwest::Response) -> EmbedResult<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    if status == 402 {
        return Err(EmbedError::BudgetExhausted);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(EmbedError::ProviderStatus { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn full_submit_poll_download_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "file-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/batches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "batch-1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/batches/batch-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "request_counts": {"completed": 2, "total": 2},
                "output_file_id": "file-out"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/files/file-out/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{}\n".to_vec()))
            .mount(&server)
            .await;

        let client = NebiusBatchClient::new(server.uri());
        let file_id = client.upload_manifest(b"{}\n".to_vec(), "key").await.unwrap();
        assert_eq!(file_id, "file-1");
        let batch_id = client.create_batch(&file_id, "key").await.unwrap();
        assert_eq!(batch_id, "batch-1");
        let status = client.batch_status(&batch_id, "key").await.unwrap();
        assert_eq!(status.state, BatchState::Completed);
        let output = client.download_results(&status.output_file_id.unwrap(), "key").await.unwrap();
        assert_eq!(output, b"{}\n");
    }

    #[tokio::test]
    async fn status_402_maps_to_budget_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&server)
            .await;

        let client = NebiusBatchClient::new(server.uri());
        let err = client.upload_manifest(b"{}\n".to_vec(), "key").await.unwrap_err();
        assert!(matches!(err, EmbedError::BudgetExhausted));
    }
}
