use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use readmevec_core::{BatchItemMeta, BatchRecord, BatchState, IngestCounters, Item, VectorPoint};
use readmevec_vectorstore::VectorStoreClient;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::batch_state::BatchStateStore;
use crate::error::{EmbedError, EmbedResult};
use crate::provider::{BatchEmbedProvider, KeyRing};

/// Handles the provider's asynchronous batch embedding endpoint: chunking,
/// manifest upload, submit, poll, download, and sub-batch upsert, with
/// crash-recoverable state persisted before polling ever begins.
pub struct BatchEmbedDriver {
    provider: Arc<dyn BatchEmbedProvider>,
    keys: Arc<KeyRing>,
    vector_store: Arc<VectorStoreClient>,
    state_store: Arc<BatchStateStore>,
    counters: Arc<IngestCounters>,
    model: String,
    dimensions: u32,
    chunk_size: usize,
    parallel: usize,
    poll_interval: Duration,
}

impl BatchEmbedDriver {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn BatchEmbedProvider>,
        keys: Arc<KeyRing>,
        vector_store: Arc<VectorStoreClient>,
        state_store: Arc<BatchStateStore>,
        counters: Arc<IngestCounters>,
        model: impl Into<String>,
        dimensions: u32,
        chunk_size: usize,
        parallel: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            keys,
            vector_store,
            state_store,
            counters,
            model: model.into(),
            dimensions,
            chunk_size: chunk_size.max(1),
            parallel: parallel.max(1),
            poll_interval,
        }
    }

    /// Splits `items` into chunks of `chunk_size`, submits up to `parallel`
    /// of them concurrently, and drives each through submit/poll/download.
    /// A [`EmbedError::BudgetExhausted`] from any chunk stops submission of
    /// chunks not yet started but does not cancel chunks already in flight.
    pub async fn submit_and_process(&self, items: Vec<Item>) -> EmbedResult<()> {
        let chunks: Vec<Vec<Item>> = items.chunks(self.chunk_size).map(<[Item]>::to_vec).collect();

        let results: Vec<EmbedResult<()>> = stream::iter(chunks.into_iter().map(|chunk| self.process_chunk(chunk)))
            .buffer_unordered(self.parallel)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(()) => {}
                Err(EmbedError::BudgetExhausted) => return Err(EmbedError::BudgetExhausted),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    async fn process_chunk(&self, items: Vec<Item>) -> EmbedResult<()> {
        let ndjson = build_manifest(&items, &self.model, self.dimensions);
        let key = self.keys.next_key().ok_or(EmbedError::NoApiKeys)?.to_string();

        let file_id = self.provider.upload_manifest(ndjson, &key).await?;
        let batch_id = self.provider.create_batch(&file_id, &key).await?;

        let meta: Vec<BatchItemMeta> = items
            .iter()
            .map(|item| BatchItemMeta {
                id: item.id,
                repo: item.repo.clone(),
                content_hash: item.content_hash.clone(),
            })
            .collect();
        let record = BatchRecord::new(batch_id.clone(), meta);
        // Persisted before polling begins: if the process crashes here, the
        // Resume Protocol picks the batch back up on next start.
        self.state_store.put(record.clone())?;

        self.poll_until_terminal(&batch_id, &key, &record).await
    }

    /// Polls a submitted (or resumed) batch until it reaches a terminal
    /// state, then applies the results and the state retention rule.
    pub async fn poll_until_terminal(&self, batch_id: &str, api_key: &str, record: &BatchRecord) -> EmbedResult<()> {
        loop {
            let status = self.provider.batch_status(batch_id, api_key).await?;
            if status.state == BatchState::Completed {
                let output_file_id = status
                    .output_file_id
                    .ok_or_else(|| EmbedError::Decode("completed batch missing output_file_id".to_string()))?;
                let bytes = self.provider.download_results(&output_file_id, api_key).await?;
                let (vectors, failed) = parse_ndjson_results(&bytes);
                let succeeded = self.upsert_results(record, &vectors).await?;

                self.counters.embedded.fetch_add(succeeded as u64, Ordering::Relaxed);
                self.counters.upserted.fetch_add(succeeded as u64, Ordering::Relaxed);
                self.counters.embed_errors.fetch_add(failed.len() as u64, Ordering::Relaxed);

                if record.should_delete_state(succeeded) {
                    self.state_store.remove(batch_id)?;
                } else {
                    tracing::warn!(
                        batch_id,
                        succeeded,
                        total = record.len(),
                        "batch success rate below retention threshold, keeping state for operator review"
                    );
                }
                return Ok(());
            }
            if status.state.is_terminal_non_success() {
                return Err(EmbedError::TerminalBatch {
                    batch_id: batch_id.to_string(),
                    state: status.state,
                });
            }
            tracing::info!(batch_id, completed = status.completed, total = status.total, "batch in progress");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Reconciles every batch-state entry against its current provider
    /// status: completed batches are downloaded and upserted immediately,
    /// in-progress/validating batches are polled to completion, and
    /// terminal-non-success batches are dropped from the state store.
    /// Returns the set of item IDs carried by any batch that was in flight
    /// at the start of this call, so the caller can exclude them from the
    /// remaining-work list alongside whatever the vector store already has.
    pub async fn resume_known_batches(&self) -> EmbedResult<HashSet<Uuid>> {
        let records = self.state_store.all();
        let mut in_flight = HashSet::new();
        let mut pending = Vec::new();

        for record in records {
            let key = self.keys.next_key().ok_or(EmbedError::NoApiKeys)?.to_string();
            let status = self.provider.batch_status(&record.batch_id, &key).await?;

            if status.state.is_terminal_non_success() {
                tracing::warn!(
                    batch_id = %record.batch_id,
                    state = ?status.state,
                    "dropping terminal non-success batch from state store on resume"
                );
                self.state_store.remove(&record.batch_id)?;
                continue;
            }

            for meta in &record.items {
                in_flight.insert(meta.id);
            }
            let batch_id = record.batch_id.clone();
            pending.push(async move { self.poll_until_terminal(&batch_id, &key, &record).await });
        }

        for result in futures::future::join_all(pending).await {
            result?;
        }
        Ok(in_flight)
    }

    async fn upsert_results(&self, record: &BatchRecord, vectors: &HashMap<Uuid, Vec<f32>>) -> EmbedResult<usize> {
        let points: Vec<VectorPoint> = record
            .items
            .iter()
            .filter_map(|meta| {
                vectors
                    .get(&meta.id)
                    .map(|vector| VectorPoint::new(meta.id, vector.clone(), meta.repo.clone(), meta.content_hash.clone()))
            })
            .collect();
        let succeeded = points.len();
        // VectorStoreClient::upsert already chunks at the 100-point payload limit.
        self.vector_store.upsert(&points, false).await?;
        Ok(succeeded)
    }
}

/// Builds a newline-delimited manifest: one line per item carrying
/// `custom_id = item.id` and an embedding request body.
fn build_manifest(items: &[Item], model: &str, dimensions: u32) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        let line = json!({
            "custom_id": item.id.to_string(),
            "method": "POST",
            "url": "/v1/embeddings",
            "body": {
                "model": model,
                "input": item.content,
                "dimensions": dimensions,
            }
        });
        out.extend_from_slice(line.to_string().as_bytes());
        out.push(b'\n');
    }
    out
}

/// Parses a downloaded NDJSON results file into successful vectors keyed by
/// item ID and a list of `(id, error)` for failed lines. Malformed lines are
/// skipped rather than treated as fatal — a single corrupt line should not
/// sink an otherwise-successful batch.
fn parse_ndjson_results(bytes: &[u8]) -> (HashMap<Uuid, Vec<f32>>, Vec<(Uuid, String)>) {
    let mut vectors = HashMap::new();
    let mut failed = Vec::new();

    for line in bytes.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        let Some(custom_id) = value.get("custom_id").and_then(Value::as_str) else {
            continue;
        };
        let Ok(id) = custom_id.parse::<Uuid>() else {
            continue;
        };

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            failed.push((id, error.to_string()));
            continue;
        }

        match value.pointer("/response/body/data/0/embedding").and_then(Value::as_array) {
            Some(embedding) => {
                let vector: Vec<f32> = embedding.iter().filter_map(Value::as_f64).map(|v| v as f32).collect();
                vectors.insert(id, vector);
            }
            None => failed.push((id, "response missing embedding".to_string())),
        }
    }

    (vectors, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_carries_one_line_per_item_with_custom_id() {
        let items = vec![Item::from_raw("foo/bar", "hello readme content").unwrap()];
        let manifest = build_manifest(&items, "qwen3-embed", 1536);
        let text = String::from_utf8(manifest).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(&items[0].id.to_string()));
    }

    #[test]
    fn ndjson_results_parse_successes_and_failures() {
        let id_ok = Uuid::new_v4();
        let id_err = Uuid::new_v4();
        let ndjson = format!(
            "{}\n{}\n",
            json!({
                "custom_id": id_ok.to_string(),
                "response": {"body": {"data": [{"embedding": [0.1, 0.2]}]}}
            }),
            json!({"custom_id": id_err.to_string(), "error": {"message": "rate limited"}}),
        );
        let (vectors, failed) = parse_ndjson_results(ndjson.as_bytes());
        assert_eq!(vectors.get(&id_ok), Some(&vec![0.1, 0.2]));
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, id_err);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let (vectors, failed) = parse_ndjson_results(b"not json\n\n");
        assert!(vectors.is_empty());
        assert!(failed.is_empty());
    }
}
