use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distance metric used by the collection. The pipeline only ever creates
/// cosine collections; the enum exists so the vector-store wire format is
/// explicit rather than a bare string literal sprinkled through the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Cosine,
}

impl DistanceMetric {
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Cosine => "Cosine",
        }
    }
}

/// Payload stored alongside a vector. Full README content is deliberately
/// not stored here — it is retrievable externally from the content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub repo_name: String,
    pub content_hash: String,
}

/// A single point to be upserted into the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

impl VectorPoint {
    #[must_use]
    pub fn new(id: Uuid, vector: Vec<f32>, repo_name: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            id,
            vector,
            payload: VectorPayload {
                repo_name: repo_name.into(),
                content_hash: content_hash.into(),
            },
        }
    }
}
