//! Concrete embedding provider clients behind the [`crate::provider`] traits.

mod deepinfra;
mod nebius;
mod nebius_batch;

pub use deepinfra::DeepInfraClient;
pub use nebius::NebiusClient;
pub use nebius_batch::NebiusBatchClient;
