use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use readmevec_core::{ErrorClass, IngestCounters, Item, VectorPoint};
use readmevec_vectorstore::VectorStoreClient;

use crate::buffer::AsyncBuffer;
use crate::error::{EmbedError, EmbedResult};
use crate::provider::{KeyRing, RealtimeEmbedProvider};

/// Upper bound on retries for a transient provider failure (5xx, 429).
const MAX_RETRIES: u32 = 10;
/// Retry delay cap; the `(11 - retries_left) * 2s` schedule would otherwise
/// grow unbounded for a higher `MAX_RETRIES`.
const MAX_RETRY_DELAY_SECS: u64 = 20;

/// A fixed pool of worker tasks draining an [`AsyncBuffer`], packing pulled
/// batches into sub-batches by count and byte budget, embedding each via a
/// realtime provider, and upserting the resulting vectors without waiting
/// for server-side indexing.
pub struct RealtimeEmbedDriver {
    buffer: Arc<AsyncBuffer>,
    provider: Arc<dyn RealtimeEmbedProvider>,
    keys: Arc<KeyRing>,
    vector_store: Arc<VectorStoreClient>,
    counters: Arc<IngestCounters>,
    workers: usize,
    batch_size: usize,
    max_batch_chars: usize,
    budget_exhausted: AtomicBool,
}

impl RealtimeEmbedDriver {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buffer: Arc<AsyncBuffer>,
        provider: Arc<dyn RealtimeEmbedProvider>,
        keys: Arc<KeyRing>,
        vector_store: Arc<VectorStoreClient>,
        counters: Arc<IngestCounters>,
        workers: usize,
        batch_size: usize,
        max_batch_chars: usize,
    ) -> Self {
        Self {
            buffer,
            provider,
            keys,
            vector_store,
            counters,
            workers: workers.max(1),
            batch_size: batch_size.max(1),
            max_batch_chars: max_batch_chars.max(1),
            budget_exhausted: AtomicBool::new(false),
        }
    }

    /// True once any worker has observed a provider budget-exhausted
    /// response. The caller feeding this driver's buffer should stop
    /// enqueuing further work once this flips.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted.load(Ordering::Acquire)
    }

    /// Runs the worker pool to completion: every worker exits once the
    /// buffer reports done-and-empty, or once a provider budget-exhausted
    /// response finalizes the buffer early.
    pub async fn run(self: Arc<Self>) {
        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let this = self.clone();
            handles.push(tokio::spawn(async move { this.worker_loop(worker_id).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "realtime embed worker panicked");
            }
        }
    }

    async fn worker_loop(&self, worker_id: usize) {
        loop {
            let buffer = self.buffer.clone();
            let batch_size = self.batch_size;
            let batch = match tokio::task::spawn_blocking(move || buffer.pull(batch_size)).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(worker = worker_id, error = %e, "buffer pull task panicked");
                    return;
                }
            };

            if batch.is_empty() {
                if self.buffer.is_done_and_empty() || self.budget_exhausted() {
                    return;
                }
                continue;
            }

            for sub_batch in pack_sub_batches(batch, self.batch_size, self.max_batch_chars) {
                self.process_sub_batch(worker_id, sub_batch).await;
                if self.budget_exhausted() {
                    return;
                }
            }
        }
    }

    async fn process_sub_batch(&self, worker_id: usize, items: Vec<Item>) {
        let texts: Vec<String> = items.iter().map(|i| i.content.clone()).collect();
        match self.embed_with_retry(&texts).await {
            Ok(response) => {
                self.counters.add_cost(response.cost_usd_millis as f64 / 1000.0);
                let points: Vec<VectorPoint> = items
                    .iter()
                    .zip(response.embeddings)
                    .map(|(item, vector)| VectorPoint::new(item.id, vector, item.repo.clone(), item.content_hash.clone()))
                    .collect();
                let upserted = points.len() as u64;
                if let Err(e) = self.vector_store.upsert(&points, false).await {
                    tracing::error!(worker = worker_id, error = %e, "vector store upsert failed");
                    self.counters.embed_errors.fetch_add(upserted, std::sync::atomic::Ordering::Relaxed);
                } else {
                    self.counters.embedded.fetch_add(upserted, std::sync::atomic::Ordering::Relaxed);
                    self.counters.upserted.fetch_add(upserted, std::sync::atomic::Ordering::Relaxed);
                }
            }
            Err(e) if e.classify() == ErrorClass::Budget => {
                tracing::warn!(worker = worker_id, repos = items.len(), "provider budget exhausted, halting realtime embed pool");
                self.budget_exhausted.store(true, Ordering::Release);
                self.buffer.finish();
            }
            Err(e) => {
                tracing::warn!(worker = worker_id, error = %e, repos = ?items.iter().map(|i| &i.repo).collect::<Vec<_>>(), "sub-batch embedding failed, dropping");
                self.counters
                    .embed_errors
                    .fetch_add(items.len() as u64, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    async fn embed_with_retry(&self, texts: &[String]) -> EmbedResult<crate::provider::RealtimeEmbedResponse> {
        let mut retries_left = MAX_RETRIES;
        loop {
            let key = self.keys.next_key().ok_or(EmbedError::NoApiKeys)?.to_string();
            match self.provider.embed(texts, &key).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if e.classify() != ErrorClass::Transient || retries_left == 0 {
                        return Err(e);
                    }
                    let delay_secs = ((MAX_RETRIES + 1 - retries_left) * 2).min(MAX_RETRY_DELAY_SECS as u32);
                    retries_left -= 1;
                    tokio::time::sleep(Duration::from_secs(delay_secs as u64)).await;
                }
            }
        }
    }
}

/// Packs items into sub-batches respecting both `batch_size` (item count)
/// and `max_batch_chars` (byte/char budget), whichever limit fires first.
fn pack_sub_batches(items: Vec<Item>, batch_size: usize, max_batch_chars: usize) -> Vec<Vec<Item>> {
    let mut batches = Vec::new();
    let mut current: Vec<Item> = Vec::new();
    let mut current_chars = 0usize;

    for item in items {
        let item_chars = item.content.chars().count();
        if !current.is_empty() && (current.len() >= batch_size || current_chars + item_chars > max_batch_chars) {
            batches.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current_chars += item_chars;
        current.push(item);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
