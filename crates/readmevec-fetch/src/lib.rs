//! README acquisition: proxy-rotated HTTP fetching from raw-hosting
//! mirrors, durable success/error markers, and a resumable work source
//! over a columnar origin archive.

mod candidates;
mod engine;
mod error;
mod store;
mod work_source;

pub use candidates::{candidate_sweep, raw_url, BRANCHES, DEFAULT_RAW_BASE_URL, README_NAMES};
pub use engine::{FetchEngine, FetchOutcome};
pub use error::{FetchError, FetchResult};
pub use store::ReadmeStore;
pub use work_source::{WorkSource, WorkSourceConfig, DEFAULT_BATCH_SIZE};
