//! Ingestion progress counters and their Prometheus-text rendering.
//!
//! A hand-rolled `# HELP` / `# TYPE` metrics text emitter scoped to the
//! ingestion pipeline's fetched/embedded/upserted/error counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by workers across the fetch and embed pipelines.
/// Cheap to share (`Arc<IngestCounters>`) and read without locking.
#[derive(Debug, Default)]
pub struct IngestCounters {
    pub fetched: AtomicU64,
    pub fetch_errors: AtomicU64,
    pub skipped: AtomicU64,
    pub embedded: AtomicU64,
    pub embed_errors: AtomicU64,
    pub upserted: AtomicU64,
    pub cost_micro_usd: AtomicU64,
}

impl IngestCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cost(&self, usd: f64) {
        let micros = (usd * 1_000_000.0).round().max(0.0) as u64;
        self.cost_micro_usd.fetch_add(micros, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            embedded: self.embedded.load(Ordering::Relaxed),
            embed_errors: self.embed_errors.load(Ordering::Relaxed),
            upserted: self.upserted.load(Ordering::Relaxed),
            cost_usd: self.cost_micro_usd.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }

    /// Renders the counters as Prometheus exposition-format text.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        out.push_str("# HELP readmevec_fetched_total READMEs fetched successfully\n");
        out.push_str("# TYPE readmevec_fetched_total counter\n");
        out.push_str(&format!("readmevec_fetched_total {}\n", s.fetched));

        out.push_str("# HELP readmevec_fetch_errors_total Permanent or exhausted fetch failures\n");
        out.push_str("# TYPE readmevec_fetch_errors_total counter\n");
        out.push_str(&format!("readmevec_fetch_errors_total {}\n", s.fetch_errors));

        out.push_str("# HELP readmevec_skipped_total Repos skipped because they were already done\n");
        out.push_str("# TYPE readmevec_skipped_total counter\n");
        out.push_str(&format!("readmevec_skipped_total {}\n", s.skipped));

        out.push_str("# HELP readmevec_embedded_total Items successfully embedded\n");
        out.push_str("# TYPE readmevec_embedded_total counter\n");
        out.push_str(&format!("readmevec_embedded_total {}\n", s.embedded));

        out.push_str("# HELP readmevec_embed_errors_total Items that failed embedding\n");
        out.push_str("# TYPE readmevec_embed_errors_total counter\n");
        out.push_str(&format!("readmevec_embed_errors_total {}\n", s.embed_errors));

        out.push_str("# HELP readmevec_upserted_total Vectors upserted into the vector store\n");
        out.push_str("# TYPE readmevec_upserted_total counter\n");
        out.push_str(&format!("readmevec_upserted_total {}\n", s.upserted));

        out.push_str("# HELP readmevec_cost_usd_total Estimated cumulative embedding cost in USD\n");
        out.push_str("# TYPE readmevec_cost_usd_total counter\n");
        out.push_str(&format!("readmevec_cost_usd_total {}\n", s.cost_usd));

        out
    }
}

/// A point-in-time snapshot of [`IngestCounters`], cheap to log or print.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSnapshot {
    pub fetched: u64,
    pub fetch_errors: u64,
    pub skipped: u64,
    pub embedded: u64,
    pub embed_errors: u64,
    pub upserted: u64,
    pub cost_usd: f64,
}
