//! Thin REST adapter over an external Qdrant-shaped vector store.

mod client;
mod error;

pub use client::VectorStoreClient;
pub use error::{VectorStoreError, VectorStoreResult};
