use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, EmbedResult};
use crate::provider::{RealtimeEmbedProvider, RealtimeEmbedResponse};

/// Price is provider-published per 1M tokens; realtime responses don't carry
/// a cost field, so it's derived from token usage at this rate.
const DEFAULT_PRICE_PER_MILLION_TOKENS_USD: f64 = 0.01;

/// Realtime embeddings against an OpenAI-shaped endpoint:
/// `{model, input, dimensions} -> {data:[{embedding,index}], usage:{prompt_tokens}}`.
pub struct NebiusClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: u32,
    price_per_million_tokens_usd: f64,
}

impl NebiusClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            price_per_million_tokens_usd: DEFAULT_PRICE_PER_MILLION_TOKENS_USD,
        }
    }

    #[must_use]
    pub fn with_price_per_million_tokens(mut self, usd: f64) -> Self {
        self.price_per_million_tokens_usd = usd;
        self
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: u32,
}

#[derive(Debug, Deserialize)]
struct Response {
    data: Vec<DataEntry>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct DataEntry {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
}

#[async_trait]
impl RealtimeEmbedProvider for NebiusClient {
    async fn embed(&self, texts: &[String], api_key: &str) -> EmbedResult<RealtimeEmbedResponse> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = Request {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let resp = self.http.post(&url).bearer_auth(api_key).json(&body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::ProviderStatus { status, body });
        }

        let mut parsed: Response = resp.json().await.map_err(|e| EmbedError::Decode(e.to_string()))?;
        parsed.data.sort_by_key(|d| d.index);
        let embeddings = parsed.data.into_iter().map(|d| d.embedding).collect();
        let cost_usd_millis = ((parsed.usage.prompt_tokens as f64 / 1_000_000.0)
            * self.price_per_million_tokens_usd
            * 1000.0)
            .round() as u64;

        Ok(RealtimeEmbedResponse {
            embeddings,
            tokens: parsed.usage.prompt_tokens,
            cost_usd_millis,
        })
    }
}
