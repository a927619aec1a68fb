//! Layered configuration for the ingestion pipeline.
//!
//! Precedence is env > file > defaults, scoped to the fetch/embed run-time
//! knobs: data directories, the vector store endpoint, and per-pipeline
//! tunables.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Fetch Engine tunables (candidate sweep, retry, concurrency).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub min_size_bytes: usize,
    pub max_chars: usize,
    pub file_readers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1000,
            max_retries: 5,
            min_size_bytes: 500,
            max_chars: 50_000,
            file_readers: 16,
        }
    }
}

/// Realtime and batch embed driver tunables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub realtime_workers: usize,
    pub batch_size: usize,
    pub max_batch_chars: usize,
    pub buffer_capacity: usize,
    pub batch_chunk_size: usize,
    pub batch_parallel: usize,
    pub poll_interval_secs: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            realtime_workers: 48,
            batch_size: 64,
            max_batch_chars: 120_000,
            buffer_capacity: 4_096,
            batch_chunk_size: 25_000,
            batch_parallel: 3,
            poll_interval_secs: 30,
        }
    }
}

/// External vector store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    pub dimension: u32,
    pub upsert_chunk_size: usize,
    pub scroll_page_size: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "readmes".to_string(),
            dimension: 1536,
            upsert_chunk_size: 100,
            scroll_page_size: 1000,
        }
    }
}

/// Filesystem layout settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: String,
    pub readmes_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            readmes_dir: "./data/readmes".to_string(),
        }
    }
}

/// Root configuration, merged from defaults, an optional file, and
/// `READMEVEC_`-prefixed environment variables (e.g.
/// `READMEVEC_EMBED__BATCH_SIZE=32`).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub embed: EmbedConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

impl RunConfig {
    /// Loads configuration from, in ascending precedence:
    /// 1. Hardcoded defaults
    /// 2. `./config/readmevec.yaml` / `/etc/readmevec/readmevec.yaml`
    /// 3. `READMEVEC_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("./config/readmevec").required(false))
            .add_source(File::with_name("/etc/readmevec/readmevec").required(false))
            .add_source(
                Environment::with_prefix("READMEVEC")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: RunConfig = builder.build()?.try_deserialize().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vector_store.dimension != 1536 && self.vector_store.dimension != 4096 {
            return Err(ConfigError::Message(format!(
                "unsupported embedding dimension {}: must be 1536 or 4096",
                self.vector_store.dimension
            )));
        }
        if self.embed.batch_size == 0 {
            return Err(ConfigError::Message("embed.batch_size must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unsupported_dimension() {
        let mut cfg = RunConfig::default();
        cfg.vector_store.dimension = 768;
        assert!(cfg.validate().is_err());
    }
}
