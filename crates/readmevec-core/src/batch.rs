use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Observed lifecycle state of a submitted async embedding batch.
/// These states are reported by the provider, never authored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Validating,
    InProgress,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl BatchState {
    /// Terminal states that will never transition further.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired | Self::Cancelled)
    }

    /// Terminal states other than `Completed` — the batch driver raises an
    /// error for the chunk and the batch-state entry is retained.
    #[must_use]
    pub fn is_terminal_non_success(self) -> bool {
        matches!(self, Self::Failed | Self::Expired | Self::Cancelled)
    }
}

/// Metadata persisted for one item inside an in-flight batch, retained for
/// crash recovery. Content itself is intentionally not persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemMeta {
    pub id: Uuid,
    pub repo: String,
    pub content_hash: String,
}

/// A submitted batch job tracked in the batch-state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub items: Vec<BatchItemMeta>,
    pub created_at: DateTime<Utc>,
}

impl BatchRecord {
    #[must_use]
    pub fn new(batch_id: impl Into<String>, items: Vec<BatchItemMeta>) -> Self {
        Self {
            batch_id: batch_id.into(),
            items,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A batch is "small" if it holds fewer than 50 items — the state
    /// retention rule deletes small batches regardless of success rate.
    #[must_use]
    pub fn is_small_batch(&self) -> bool {
        self.items.len() < 50
    }

    /// Whether the state entry should be deleted given `succeeded` results
    /// out of this batch's total item count: success rate >= 99%, or the
    /// batch is small (<50 items).
    #[must_use]
    pub fn should_delete_state(&self, succeeded: usize) -> bool {
        if self.is_small_batch() {
            return true;
        }
        if self.items.is_empty() {
            return true;
        }
        (succeeded as f64 / self.items.len() as f64) >= 0.99
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(n: usize) -> Vec<BatchItemMeta> {
        (0..n)
            .map(|i| BatchItemMeta {
                id: Uuid::nil(),
                repo: format!("repo-{i}"),
                content_hash: format!("hash-{i}"),
            })
            .collect()
    }

    #[test]
    fn small_batch_always_deletes_state_regardless_of_success_rate() {
        let record = BatchRecord::new("b1", meta(49));
        assert!(record.should_delete_state(24)); // ~50% success, still small
    }

    #[test]
    fn large_batch_keeps_state_below_threshold() {
        let record = BatchRecord::new("b2", meta(50));
        assert!(!record.should_delete_state(49)); // 98%
        assert!(record.should_delete_state(50)); // 100%
    }

    #[test]
    fn terminal_non_success_states_are_classified() {
        assert!(BatchState::Failed.is_terminal_non_success());
        assert!(BatchState::Expired.is_terminal_non_success());
        assert!(BatchState::Cancelled.is_terminal_non_success());
        assert!(!BatchState::Completed.is_terminal_non_success());
        assert!(!BatchState::InProgress.is_terminal_non_success());
    }
}
