use readmevec_core::{CoreError, ErrorClass};
use readmevec_embed::EmbedError;
use readmevec_fetch::FetchError;
use readmevec_vectorstore::VectorStoreError;
use thiserror::Error;

/// Top-level error uniting every pipeline crate's error type behind one
/// `classify()` the orchestrator uses to decide the process exit code.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Core(_) => ErrorClass::Fatal,
            Self::Fetch(e) => e.classify(),
            Self::Embed(e) => e.classify(),
            Self::VectorStore(e) => e.classify(),
            Self::Config(_) => ErrorClass::Fatal,
        }
    }

    /// Maps a top-level error to the process exit code described in the
    /// CLI's external contract: `0` on a graceful budget stop, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.classify() {
            ErrorClass::Budget => 0,
            _ => 1,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
