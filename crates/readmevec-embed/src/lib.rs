//! Item loading, buffered handoff, and realtime/batch embedding drivers
//! that turn README files on disk into vectors in the vector store.

mod batch;
mod batch_state;
mod buffer;
mod error;
mod loader;
mod provider;
mod providers;
mod realtime;
mod resume;

pub use batch::BatchEmbedDriver;
pub use batch_state::BatchStateStore;
pub use buffer::{AsyncBuffer, SharedAsyncBuffer};
pub use error::{EmbedError, EmbedResult};
pub use loader::{ItemLoader, DEFAULT_FILE_READERS};
pub use provider::{BatchEmbedProvider, BatchStatus, KeyRing, RealtimeEmbedProvider, RealtimeEmbedResponse};
pub use providers::{DeepInfraClient, NebiusBatchClient, NebiusClient};
pub use realtime::RealtimeEmbedDriver;
pub use resume::{resume, ResumeReport};
