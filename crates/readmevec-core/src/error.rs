use thiserror::Error;

/// How a failure should be handled by a caller up the stack.
///
/// Generalizes the `Transient`/`Permanent` split used throughout the
/// teacher's storage backend to the five-way taxonomy this pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry with backoff: 5xx, 429, connection reset, timeout.
    Transient,
    /// Durable marker, never retried within this run: 404, 403, malformed input.
    Permanent,
    /// Abort the process: corrupt state file, cannot create collection.
    Fatal,
    /// Provider-reported budget exhaustion: stop gracefully, preserve state, exit 0.
    Budget,
    /// Terminal batch state (`failed`/`expired`/`cancelled`): surface for the operator.
    TerminalBatch,
}

/// Canonical error type shared by the ingestion crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("malformed filename: {0}")]
    MalformedFilename(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
