use parking_lot::Mutex;
use rand::Rng;

/// Initial EMA latency assigned to a proxy before any request completes.
pub const DEFAULT_EMA_MS: f64 = 1000.0;

/// Penalty applied to the EMA on a network-layer failure. Must be large
/// enough that a chronically failing proxy falls to the back of the
/// distribution without ever being hard-removed from the pool.
pub const FAILURE_PENALTY_MS: f64 = 15_000.0;

/// Decay weight: `ema <- ALPHA * ema + (1 - ALPHA) * observed`.
const ALPHA: f64 = 0.8;

struct ProxyEntry {
    url: String,
    ema_ms: Mutex<f64>,
}

/// A handle to a proxy selected for one request. Callers report the
/// outcome back through [`ProxyPool::record_success`] /
/// [`ProxyPool::record_failure`] using the contained index.
#[derive(Debug, Clone)]
pub struct ProxySelection {
    pub index: usize,
    pub url: String,
}

/// Power-of-two-choices proxy pool scored by exponentially weighted moving
/// average request latency.
///
/// Selection picks two distinct random indices and returns whichever has
/// the lower EMA — near-optimal load balancing at O(1) cost, degrading
/// gracefully as proxies fail (their EMA rises but they are never removed,
/// so a proxy that recovers can be selected again).
pub struct ProxyPool {
    entries: Vec<ProxyEntry>,
}

impl ProxyPool {
    #[must_use]
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            entries: urls
                .into_iter()
                .map(|url| ProxyEntry {
                    url,
                    ema_ms: Mutex::new(DEFAULT_EMA_MS),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Selects a proxy via power-of-two-choices. Returns `None` when the
    /// pool is empty — callers must tolerate a direct (no-proxy) request.
    #[must_use]
    pub fn select(&self) -> Option<ProxySelection> {
        match self.entries.len() {
            0 => None,
            1 => Some(self.selection_at(0)),
            n => {
                let mut rng = rand::thread_rng();
                let i = rng.gen_range(0..n);
                let mut j = rng.gen_range(0..n - 1);
                if j >= i {
                    j += 1;
                }
                let ema_i = *self.entries[i].ema_ms.lock();
                let ema_j = *self.entries[j].ema_ms.lock();
                Some(if ema_i <= ema_j {
                    self.selection_at(i)
                } else {
                    self.selection_at(j)
                })
            }
        }
    }

    fn selection_at(&self, index: usize) -> ProxySelection {
        ProxySelection {
            index,
            url: self.entries[index].url.clone(),
        }
    }

    /// Records a completed request (success or any HTTP response) against
    /// the proxy at `index`.
    pub fn record_success(&self, index: usize, observed_ms: f64) {
        self.update_ema(index, observed_ms);
    }

    /// Records a network-layer failure (connection error, timeout) against
    /// the proxy at `index`, applying [`FAILURE_PENALTY_MS`].
    pub fn record_failure(&self, index: usize) {
        self.update_ema(index, FAILURE_PENALTY_MS);
    }

    fn update_ema(&self, index: usize, observed_ms: f64) {
        let Some(entry) = self.entries.get(index) else {
            return;
        };
        let mut ema = entry.ema_ms.lock();
        *ema = ALPHA * *ema + (1.0 - ALPHA) * observed_ms;
    }

    #[cfg(test)]
    fn ema_at(&self, index: usize) -> f64 {
        *self.entries[index].ema_ms.lock()
    }
}
