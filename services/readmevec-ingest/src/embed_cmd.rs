use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use readmevec_core::{DistanceMetric, EmbedConfig, IngestCounters, VectorStoreConfig};
use readmevec_embed::{
    resume, AsyncBuffer, BatchEmbedDriver, BatchStateStore, DeepInfraClient, EmbedError, ItemLoader, KeyRing,
    NebiusBatchClient, NebiusClient, RealtimeEmbedDriver,
};
use readmevec_vectorstore::VectorStoreClient;
use tracing::{info, warn};

use crate::error::{IngestError, IngestResult};

/// Third-party embedding backend selected on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Provider {
    DeepInfra,
    Nebius,
    NebiusBatch,
}

impl Provider {
    fn env_prefix(self) -> &'static str {
        match self {
            Self::DeepInfra => "DEEPINFRA",
            Self::Nebius | Self::NebiusBatch => "NEBIUS",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::DeepInfra => "BAAI/bge-large-en-v1.5",
            Self::Nebius | Self::NebiusBatch => "Qwen/Qwen3-Embedding-8B",
        }
    }
}

/// Flags accepted by `readmevec-ingest embed`.
pub struct EmbedArgs {
    pub readmes_dir: PathBuf,
    pub data_dir: PathBuf,
    pub provider: Provider,
    pub keys: usize,
    pub chunk: Option<usize>,
    pub parallel: Option<usize>,
}

/// Loads up to `count` API keys for `provider` from `{PREFIX}_API_KEY` and
/// `{PREFIX}_API_KEY_1`..`{PREFIX}_API_KEY_{count-1}`.
fn load_keys(provider: Provider, count: usize) -> Vec<String> {
    let prefix = provider.env_prefix();
    let mut keys = Vec::new();
    if let Ok(key) = std::env::var(format!("{prefix}_API_KEY")) {
        keys.push(key);
    }
    for i in 1..count {
        if let Ok(key) = std::env::var(format!("{prefix}_API_KEY_{i}")) {
            keys.push(key);
        }
    }
    keys
}

/// Lists every successfully fetched README file, skipping the `.errors`
/// marker tree entirely.
fn list_readme_files(readmes_dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(readmes_dir).map_err(readmevec_core::CoreError::Io)? {
        let entry = entry.map_err(readmevec_core::CoreError::Io)?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Rough pre-submission cost estimate: sample mean content length across the
/// chunk, converted to tokens at ~4 chars/token, priced per million tokens.
/// Logged only — the provider's own usage figures are authoritative.
fn estimate_cost_usd(items: &[readmevec_core::Item], price_per_million_tokens_usd: f64) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let total_chars: usize = items.iter().map(|i| i.content.chars().count()).sum();
    let tokens = total_chars as f64 / 4.0;
    tokens / 1_000_000.0 * price_per_million_tokens_usd
}

/// Drives the embed pipeline: a file-level outer loop sized
/// `BATCH_CHUNK_SIZE * BATCH_PARALLEL * 2`, loading items per chunk and
/// routing them to whichever driver matches the selected provider.
pub async fn run(args: EmbedArgs, mut config: EmbedConfig, vs_config: VectorStoreConfig, counters: Arc<IngestCounters>) -> IngestResult<()> {
    if let Some(chunk) = args.chunk {
        config.batch_chunk_size = chunk;
    }
    if let Some(parallel) = args.parallel {
        config.batch_parallel = parallel;
        config.realtime_workers = parallel;
    }

    let keys = load_keys(args.provider, args.keys.max(1));
    if keys.is_empty() {
        return Err(IngestError::Config(format!(
            "no API keys found for provider {:?}: set {}_API_KEY",
            args.provider,
            args.provider.env_prefix()
        )));
    }
    let key_ring = Arc::new(KeyRing::new(keys));

    let vector_store = Arc::new(VectorStoreClient::new(vs_config.url.clone(), vs_config.collection.clone()));
    vector_store.ensure_collection(vs_config.dimension, DistanceMetric::Cosine).await?;

    let outer_chunk_size = config.batch_chunk_size * config.batch_parallel * 2;
    let loader = ItemLoader::new(16);
    let paths = list_readme_files(&args.readmes_dir)?;
    info!(files = paths.len(), outer_chunk_size, "starting embed run");

    match args.provider {
        Provider::NebiusBatch => {
            let client = Arc::new(NebiusBatchClient::new("https://api.studio.nebius.ai"));
            let state_store = Arc::new(BatchStateStore::load(args.data_dir.join("batch-state.json"))?);
            let driver = Arc::new(BatchEmbedDriver::new(
                client,
                key_ring,
                vector_store.clone(),
                state_store,
                counters.clone(),
                args.provider.default_model(),
                vs_config.dimension,
                config.batch_chunk_size,
                config.batch_parallel,
                Duration::from_secs(config.poll_interval_secs),
            ));

            let report = resume(&driver, &vector_store).await?;
            info!(in_flight = report.in_flight_count, "resume protocol reconciled prior batches");
            let mut existing_ids = report.excluded_ids;

            for chunk_paths in paths.chunks(outer_chunk_size) {
                let items = loader.load_chunk(chunk_paths, &existing_ids).await?;
                if items.is_empty() {
                    continue;
                }
                let est_cost = estimate_cost_usd(&items, 0.01);
                info!(items = items.len(), estimated_cost_usd = est_cost, "submitting outer chunk to batch driver");
                for item in &items {
                    existing_ids.insert(item.id);
                }
                driver.submit_and_process(items).await?;
            }
        }
        Provider::DeepInfra => {
            let provider = Arc::new(DeepInfraClient::new(
                "https://api.deepinfra.com",
                args.provider.default_model(),
                vs_config.dimension,
            ));
            run_realtime(
                provider,
                key_ring,
                vector_store.clone(),
                counters.clone(),
                &config,
                &loader,
                &paths,
                outer_chunk_size,
            )
            .await?;
        }
        Provider::Nebius => {
            let provider = Arc::new(NebiusClient::new(
                "https://api.studio.nebius.ai",
                args.provider.default_model(),
                vs_config.dimension,
            ));
            run_realtime(
                provider,
                key_ring,
                vector_store.clone(),
                counters.clone(),
                &config,
                &loader,
                &paths,
                outer_chunk_size,
            )
            .await?;
        }
    }

    let snap = counters.snapshot();
    info!(
        embedded = snap.embedded,
        upserted = snap.upserted,
        errors = snap.embed_errors,
        cost_usd = snap.cost_usd,
        "embed run complete"
    );
    Ok(())
}

/// Feeds a chunked file walk through the async buffer into a realtime
/// driver's worker pool; shared by both realtime providers.
#[allow(clippy::too_many_arguments)]
async fn run_realtime(
    provider: Arc<dyn readmevec_embed::RealtimeEmbedProvider>,
    key_ring: Arc<KeyRing>,
    vector_store: Arc<VectorStoreClient>,
    counters: Arc<IngestCounters>,
    config: &EmbedConfig,
    loader: &ItemLoader,
    paths: &[PathBuf],
    outer_chunk_size: usize,
) -> IngestResult<()> {
    let buffer = Arc::new(AsyncBuffer::new(config.buffer_capacity));
    let driver = Arc::new(RealtimeEmbedDriver::new(
        buffer.clone(),
        provider,
        key_ring,
        vector_store.clone(),
        counters.clone(),
        config.realtime_workers,
        config.batch_size,
        config.max_batch_chars,
    ));
    let driver_handle = tokio::spawn(driver.clone().run());

    let mut existing_ids = vector_store.existing_ids().await?;
    for chunk_paths in paths.chunks(outer_chunk_size) {
        if driver.budget_exhausted() {
            info!("provider budget exhausted, not submitting further outer chunks");
            break;
        }
        let items = loader.load_chunk(chunk_paths, &existing_ids).await?;
        if items.is_empty() {
            continue;
        }
        let est_cost = estimate_cost_usd(&items, 0.01);
        info!(items = items.len(), estimated_cost_usd = est_cost, "pushing outer chunk onto realtime buffer");
        for item in items {
            existing_ids.insert(item.id);
            let buffer = buffer.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || buffer.push(item)).await {
                warn!(error = %e, "buffer push task panicked");
            }
        }
    }
    buffer.finish();
    if let Err(e) = driver_handle.await {
        warn!(error = %e, "realtime embed driver pool panicked");
    }
    if driver.budget_exhausted() {
        return Err(EmbedError::BudgetExhausted.into());
    }
    Ok(())
}
