use std::collections::HashSet;

use readmevec_vectorstore::VectorStoreClient;
use uuid::Uuid;

use crate::batch::BatchEmbedDriver;
use crate::error::EmbedResult;

/// Every item ID that must be excluded from the next chunk's work list:
/// already durably upserted, or carried by a batch still in flight from a
/// previous run. Guarantees no duplicate submission across restarts and no
/// omission when a batch completed but was never upserted last time.
pub struct ResumeReport {
    pub excluded_ids: HashSet<Uuid>,
    pub in_flight_count: usize,
}

/// Runs the resume protocol at batch-pipeline start, before any new
/// submission: reconciles the batch-state store against the provider, then
/// unions the resulting in-flight IDs with whatever the vector store
/// already holds.
pub async fn resume(driver: &BatchEmbedDriver, vector_store: &VectorStoreClient) -> EmbedResult<ResumeReport> {
    let in_flight = driver.resume_known_batches().await?;
    let in_flight_count = in_flight.len();

    let mut excluded_ids = vector_store.existing_ids().await?;
    excluded_ids.extend(in_flight);

    Ok(ResumeReport {
        excluded_ids,
        in_flight_count,
    })
}
