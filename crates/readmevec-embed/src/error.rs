use readmevec_core::{CoreError, ErrorClass};
use readmevec_vectorstore::VectorStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("batch state store error: {0}")]
    BatchState(String),

    #[error("batch {batch_id} ended in terminal state {state:?}")]
    TerminalBatch { batch_id: String, state: readmevec_core::BatchState },

    #[error("embedding provider budget exhausted")]
    BudgetExhausted,

    #[error("no API keys configured for provider")]
    NoApiKeys,
}

impl EmbedError {
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::BudgetExhausted => ErrorClass::Budget,
            Self::TerminalBatch { .. } => ErrorClass::TerminalBatch,
            Self::ProviderStatus { status, .. } if is_transient_status(*status) => ErrorClass::Transient,
            Self::Request(_) => ErrorClass::Transient,
            Self::ProviderStatus { .. } | Self::Decode(_) | Self::Core(_) => ErrorClass::Permanent,
            Self::VectorStore(e) => e.classify(),
            Self::BatchState(_) | Self::NoApiKeys => ErrorClass::Fatal,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

pub type EmbedResult<T> = Result<T, EmbedError>;
