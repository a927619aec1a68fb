use readmevec_core::ErrorClass;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vector store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl VectorStoreError {
    /// Classifies a failure for the caller's retry/abort decision, using
    /// the same transient/permanent/fatal split the fetch engine uses.
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::Status { status, .. } => match *status {
                429 | 500..=599 => ErrorClass::Transient,
                _ => ErrorClass::Fatal,
            },
            Self::Request(err) if err.is_timeout() || err.is_connect() => ErrorClass::Transient,
            Self::Request(_) => ErrorClass::Fatal,
            Self::Decode(_) => ErrorClass::Fatal,
        }
    }
}

pub type VectorStoreResult<T> = Result<T, VectorStoreError>;
