use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use readmevec_core::BatchState;

use crate::error::EmbedResult;

/// Outcome of a realtime embedding call: one vector per input text, in
/// order, plus usage figures for cost accounting.
#[derive(Debug, Clone)]
pub struct RealtimeEmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub tokens: u64,
    pub cost_usd_millis: u64,
}

/// Uniform contract over the realtime embedding shapes (OpenAI-style and
/// DeepInfra-style request/response bodies). Implementations own their own
/// HTTP client and URL; callers only ever see texts in, vectors out.
#[async_trait]
pub trait RealtimeEmbedProvider: Send + Sync {
    async fn embed(&self, texts: &[String], api_key: &str) -> EmbedResult<RealtimeEmbedResponse>;
}

/// Status of a provider-side batch job, polled until terminal.
#[derive(Debug, Clone)]
pub struct BatchStatus {
    pub state: BatchState,
    pub completed: u64,
    pub total: u64,
    pub output_file_id: Option<String>,
}

/// Uniform contract over a provider's asynchronous batch endpoint: upload a
/// manifest, create a job, poll it, download results.
#[async_trait]
pub trait BatchEmbedProvider: Send + Sync {
    async fn upload_manifest(&self, ndjson: Vec<u8>, api_key: &str) -> EmbedResult<String>;
    async fn create_batch(&self, file_id: &str, api_key: &str) -> EmbedResult<String>;
    async fn batch_status(&self, batch_id: &str, api_key: &str) -> EmbedResult<BatchStatus>;
    async fn download_results(&self, file_id: &str, api_key: &str) -> EmbedResult<Vec<u8>>;
}

/// Round-robins across N configured API keys so load spreads evenly across
/// provider-side rate limits.
pub struct KeyRing {
    keys: Vec<String>,
    next: AtomicUsize,
}

impl KeyRing {
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            next: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the next key in rotation, or `None` if no keys are configured.
    #[must_use]
    pub fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ring_rotates_round_robin() {
        let ring = KeyRing::new(vec!["a".into(), "b".into(), "c".into()]);
        let picks: Vec<&str> = (0..5).map(|_| ring.next_key().unwrap()).collect();
        assert_eq!(picks, vec!["a", "b", "c", "a", "b"]);
    }

    #[test]
    fn empty_key_ring_returns_none() {
        let ring = KeyRing::new(vec![]);
        assert!(ring.next_key().is_none());
        assert!(ring.is_empty());
    }
}
