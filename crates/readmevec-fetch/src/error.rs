use readmevec_core::{CoreError, ErrorClass};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("work source error: {0}")]
    WorkSource(String),

    #[error("cursor store error: {0}")]
    CursorStore(#[from] sled::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    #[must_use]
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::CursorStore(_) | Self::Io(_) => ErrorClass::Fatal,
            Self::Csv(_) | Self::WorkSource(_) | Self::Core(_) => ErrorClass::Permanent,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
