//! Core domain types and configuration shared by the README ingestion pipeline.

pub mod batch;
pub mod config;
pub mod counters;
pub mod error;
pub mod error_marker;
pub mod item;
pub mod origin;
pub mod readme_file;
pub mod vector_point;

pub use batch::{BatchItemMeta, BatchRecord, BatchState};
pub use config::{EmbedConfig, FetchConfig, PathsConfig, RunConfig, VectorStoreConfig};
pub use counters::{IngestCounters, IngestSnapshot};
pub use error::{CoreError, CoreResult, ErrorClass};
pub use error_marker::{ErrorBucket, ErrorMarker};
pub use item::{id_from_content_hash, sha1_hex, Item, MAX_CONTENT_LEN, MIN_CONTENT_LEN};
pub use origin::Origin;
pub use readme_file::{ReadmeFileName, BRANCH_TOKENS, MAX_FILENAME_LEN};
pub use vector_point::{DistanceMetric, VectorPayload, VectorPoint};
