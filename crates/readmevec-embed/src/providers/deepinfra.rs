use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{EmbedError, EmbedResult};
use crate::provider::{RealtimeEmbedProvider, RealtimeEmbedResponse};

/// Realtime embeddings against a DeepInfra-shaped endpoint:
/// `{inputs, normalize, dimensions} -> {embeddings, input_tokens, inference_status:{cost}}`.
pub struct DeepInfraClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: u32,
}

impl DeepInfraClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    inputs: &'a [String],
    normalize: bool,
    dimensions: u32,
}

#[derive(Debug, Deserialize)]
struct Response {
    embeddings: Vec<Vec<f32>>,
    input_tokens: u64,
    inference_status: InferenceStatus,
}

#[derive(Debug, Deserialize)]
struct InferenceStatus {
    #[serde(default)]
    cost: f64,
}

#[async_trait]
impl RealtimeEmbedProvider for DeepInfraClient {
    async fn embed(&self, texts: &[String], api_key: &str) -> EmbedResult<RealtimeEmbedResponse> {
        let url = format!("{}/v1/inference/{}", self.base_url.trim_end_matches('/'), self.model);
        let body = Request {
            inputs: texts,
            normalize: false,
            dimensions: self.dimensions,
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!(body))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::ProviderStatus { status, body });
        }

        let parsed: Response = resp.json().await.map_err(|e| EmbedError::Decode(e.to_string()))?;
        Ok(RealtimeEmbedResponse {
            embeddings: parsed.embeddings,
            tokens: parsed.input_tokens,
            cost_usd_millis: (parsed.inference_status.cost * 1000.0).round() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_a_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/inference/BAAI/bge-large-en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2]],
                "input_tokens": 12,
                "inference_status": {"cost": 0.0003}
            })))
            .mount(&server)
            .await;

        let client = DeepInfraClient::new(server.uri(), "BAAI/bge-large-en", 1536);
        let resp = client.embed(&["hello".to_string()], "key").await.unwrap();
        assert_eq!(resp.embeddings, vec![vec![0.1, 0.2]]);
        assert_eq!(resp.tokens, 12);
        assert_eq!(resp.cost_usd_millis, 0);
    }

    #[tokio::test]
    async fn surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = DeepInfraClient::new(server.uri(), "m", 1536);
        let err = client.embed(&["hello".to_string()], "key").await.unwrap_err();
        assert_eq!(err.classify(), readmevec_core::ErrorClass::Transient);
    }
}
