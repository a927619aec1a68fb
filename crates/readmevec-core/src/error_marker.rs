use std::fmt;

/// Permanent-failure classification for a repo, encoded as the bucket
/// directory an [`ErrorMarker`] lives under.
///
/// `NotFound404` carries the count of README candidates tested, so a future
/// run with a larger candidate list can distinguish a stale marker from one
/// that already exhausted the current candidate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorBucket {
    Http(u16),
    NotFound404 { candidates_tried: u16 },
    TooSmall,
    Network,
}

impl ErrorBucket {
    #[must_use]
    pub fn bucket_name(&self) -> String {
        match self {
            Self::Http(status) => status.to_string(),
            Self::NotFound404 { candidates_tried } => format!("404_{candidates_tried}"),
            Self::TooSmall => "tooSmall".to_string(),
            Self::Network => "0".to_string(),
        }
    }

    /// Parses a bucket directory name back into its classification.
    #[must_use]
    pub fn parse(bucket: &str) -> Option<Self> {
        if bucket == "tooSmall" {
            return Some(Self::TooSmall);
        }
        if bucket == "0" {
            return Some(Self::Network);
        }
        if let Some(rest) = bucket.strip_prefix("404_") {
            return rest.parse().ok().map(|n| Self::NotFound404 { candidates_tried: n });
        }
        bucket.parse().ok().map(Self::Http)
    }
}

impl fmt::Display for ErrorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bucket_name())
    }
}

/// An empty marker file at `<errors>/<bucket>/<owner>_<repo>` recording a
/// permanent failure. Its mere presence means "do not retry this repo in
/// this run" — no payload is stored.
#[derive(Debug, Clone)]
pub struct ErrorMarker {
    pub owner: String,
    pub repo: String,
    pub bucket: ErrorBucket,
}

impl ErrorMarker {
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, bucket: ErrorBucket) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            bucket,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}", self.owner, self.repo)
    }
}
