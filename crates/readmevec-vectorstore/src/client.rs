use std::collections::HashSet;

use readmevec_core::{DistanceMetric, VectorPoint};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{VectorStoreError, VectorStoreResult};

/// Thin typed wrapper over a Qdrant-shaped REST API. Deliberately narrow:
/// no vector indexing logic lives here, only the external contract —
/// collection bootstrap, chunked upsert, and an existing-ID scan.
pub struct VectorStoreClient {
    http: reqwest::Client,
    base_url: String,
    collection: String,
}

const DEFAULT_UPSERT_CHUNK: usize = 100;
const DEFAULT_SCROLL_PAGE: usize = 1000;

impl VectorStoreClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            collection: collection.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.base_url.trim_end_matches('/'),
            self.collection,
            path
        )
    }

    /// Creates the collection with the given dimension and distance metric
    /// if it does not already exist, then ensures a keyword index on
    /// `repo_name` for point filtering.
    pub async fn ensure_collection(&self, dimension: u32, distance: DistanceMetric) -> VectorStoreResult<()> {
        let get_resp = self.http.get(self.url("")).send().await?;
        if get_resp.status().is_success() {
            tracing::debug!(collection = %self.collection, "collection already exists");
        } else {
            let body = json!({
                "vectors": {
                    "size": dimension,
                    "distance": distance.as_wire_str(),
                }
            });
            let resp = self.http.put(self.url("")).json(&body).send().await?;
            check_status(resp).await?;
            tracing::info!(collection = %self.collection, dimension, "created vector store collection");
        }

        let index_body = json!({
            "field_name": "repo_name",
            "field_schema": "keyword",
        });
        let resp = self.http.put(self.url("/index")).json(&index_body).send().await?;
        // Qdrant returns 400 if the index already exists; that's fine.
        if !resp.status().is_success() && resp.status().as_u16() != 400 {
            check_status(resp).await?;
        }
        Ok(())
    }

    /// Scans all point IDs currently in the collection via paginated
    /// scroll (payload and vector omitted to keep pages cheap).
    pub async fn existing_ids(&self) -> VectorStoreResult<HashSet<Uuid>> {
        let mut ids = HashSet::new();
        let mut offset: Option<Value> = None;

        loop {
            let mut body = json!({
                "limit": DEFAULT_SCROLL_PAGE,
                "with_payload": false,
                "with_vector": false,
            });
            if let Some(o) = &offset {
                body["offset"] = o.clone();
            }

            let resp = self.http.post(self.url("/points/scroll")).json(&body).send().await?;
            let resp = check_status(resp).await?;
            let parsed: ScrollResponse = resp
                .json()
                .await
                .map_err(|e| VectorStoreError::Decode(e.to_string()))?;

            for point in &parsed.result.points {
                if let Ok(uuid) = point.id.parse::<Uuid>() {
                    ids.insert(uuid);
                }
            }

            match parsed.result.next_page_offset {
                Some(next) if !parsed.result.points.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Upserts points in chunks of at most `chunk_size` (defaults to 100,
    /// the vector-store payload limit) with `wait=false` so the caller
    /// never blocks on server-side indexing.
    pub async fn upsert(&self, points: &[VectorPoint], wait: bool) -> VectorStoreResult<()> {
        for chunk in points.chunks(DEFAULT_UPSERT_CHUNK) {
            let wire_points: Vec<Value> = chunk
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id.to_string(),
                        "vector": p.vector,
                        "payload": {
                            "repo_name": p.payload.repo_name,
                            "content_hash": p.payload.content_hash,
                        }
                    })
                })
                .collect();

            let body = json!({ "points": wire_points });
            let resp = self
                .http
                .put(self.url("/points"))
                .query(&[("wait", wait.to_string())])
                .json(&body)
                .send()
                .await?;
            check_status(resp).await?;
        }
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> VectorStoreResult<reqwest::Response> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(VectorStoreError::Status { status, body })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Debug, Deserialize, Serialize)]
struct ScrollResult {
    points: Vec<ScrollPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ScrollPoint {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use readmevec_core::VectorPoint;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ensure_collection_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/readmes"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/readmes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/readmes/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .mount(&server)
            .await;

        let client = VectorStoreClient::new(server.uri(), "readmes");
        client.ensure_collection(1536, DistanceMetric::Cosine).await.unwrap();
    }

    #[tokio::test]
    async fn existing_ids_paginates_through_scroll() {
        let server = MockServer::start().await;
        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/collections/readmes/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "points": [{"id": id1.to_string()}],
                    "next_page_offset": id2.to_string(),
                }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/readmes/points/scroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "points": [{"id": id2.to_string()}],
                    "next_page_offset": null,
                }
            })))
            .mount(&server)
            .await;

        let client = VectorStoreClient::new(server.uri(), "readmes");
        let ids = client.existing_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&id1));
        assert!(ids.contains(&id2));
    }

    #[tokio::test]
    async fn upsert_chunks_points_at_one_hundred() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/readmes/points"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(2)
            .mount(&server)
            .await;

        let client = VectorStoreClient::new(server.uri(), "readmes");
        let points: Vec<VectorPoint> = (0..150)
            .map(|i| VectorPoint::new(Uuid::new_v4(), vec![0.0; 4], format!("repo/{i}"), format!("hash{i}")))
            .collect();
        client.upsert(&points, false).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/collections/readmes/points"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = VectorStoreClient::new(server.uri(), "readmes");
        let points = vec![VectorPoint::new(Uuid::new_v4(), vec![0.0; 4], "r", "h")];
        let err = client.upsert(&points, false).await.unwrap_err();
        assert_eq!(err.classify(), readmevec_core::ErrorClass::Transient);
    }
}
