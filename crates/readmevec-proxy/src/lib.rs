//! Power-of-two-choices proxy pool used by the Fetch Engine.

mod loader;
mod pool;

pub use loader::{load_proxy_files, parse_proxy_line};
pub use pool::{ProxyPool, ProxySelection, DEFAULT_EMA_MS, FAILURE_PENALTY_MS};
