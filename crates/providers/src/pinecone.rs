//! Pinecone REST client (serverless indexes).
//!
//! The control plane (`api.pinecone.io`) creates and describes the index;
//! vector reads and writes go to the index's own data-plane host, which is
//! resolved once from the index description and cached.

use std::time::Duration;

use async_trait::async_trait;
use litessay_core::collaborators::{SegmentMetadata, VectorIndex, VectorMatch, VectorRecord};
use litessay_core::error::CollaboratorError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;

use crate::http::{ensure_success, parse_response, request_error};

const SERVICE: &str = "pinecone";

const API_VERSION: &str = "2024-07";

/// How often and how many times a freshly created index is checked for
/// readiness before giving up.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
const READY_POLL_ATTEMPTS: u32 = 60;

/// Vectors sent per upsert request.
pub const UPSERT_BATCH_SIZE: usize = 100;

pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_INDEX: &str = "literary-essays";
pub const DEFAULT_CLOUD: &str = "aws";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub control_url: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            control_url: DEFAULT_CONTROL_URL.to_string(),
            index_name: DEFAULT_INDEX.to_string(),
            cloud: DEFAULT_CLOUD.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: Option<IndexState>,
}

#[derive(Debug, Deserialize)]
struct IndexState {
    #[serde(default)]
    ready: bool,
}

impl IndexDescription {
    fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    namespace: &'a str,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<WireMetadata>,
}

/// Pinecone returns every metadata number as a float.
#[derive(Debug, Deserialize)]
struct WireMetadata {
    document_id: f64,
    paragraph_index: f64,
    text: String,
    #[serde(default)]
    chapter: Option<String>,
}

impl From<WireMatch> for VectorMatch {
    fn from(m: WireMatch) -> Self {
        VectorMatch {
            id: m.id,
            score: m.score,
            metadata: m.metadata.map(|md| SegmentMetadata {
                document_id: md.document_id as i64,
                paragraph_index: md.paragraph_index as u32,
                text: md.text,
                chapter: md.chapter,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PineconeClient {
    client: reqwest::Client,
    config: PineconeConfig,
    host: OnceCell<String>,
}

impl PineconeClient {
    pub fn new(config: PineconeConfig) -> Result<Self, CollaboratorError> {
        if config.api_key.trim().is_empty() {
            return Err(CollaboratorError::Config {
                service: SERVICE,
                message: "PINECONE_API_KEY is empty".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| request_error(SERVICE, e))?;
        Ok(Self {
            client,
            config,
            host: OnceCell::new(),
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Describe the index. `None` when it does not exist.
    async fn describe(&self) -> Result<Option<IndexDescription>, CollaboratorError> {
        let url = format!("{}/indexes/{}", self.config.control_url, self.config.index_name);
        let response = self
            .request(reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_response(SERVICE, response).await.map(Some)
    }

    async fn create(&self, dimension: usize) -> Result<(), CollaboratorError> {
        let body = json!({
            "name": self.config.index_name,
            "dimension": dimension,
            "metric": "cosine",
            "spec": {
                "serverless": {
                    "cloud": self.config.cloud,
                    "region": self.config.region,
                }
            }
        });
        let response = self
            .request(
                reqwest::Method::POST,
                format!("{}/indexes", self.config.control_url),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;
        // Another worker created it first.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        ensure_success(SERVICE, response).await?;
        tracing::info!(
            index = %self.config.index_name,
            dimension,
            cloud = %self.config.cloud,
            region = %self.config.region,
            "Pinecone index created",
        );
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<(), CollaboratorError> {
        for _ in 0..READY_POLL_ATTEMPTS {
            if self.describe().await?.is_some_and(|d| d.is_ready()) {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
        Err(CollaboratorError::Config {
            service: SERVICE,
            message: format!("index {} did not become ready", self.config.index_name),
        })
    }

    /// Data-plane base URL of the index.
    async fn host(&self) -> Result<&str, CollaboratorError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe().await?.ok_or_else(|| CollaboratorError::Config {
                    service: SERVICE,
                    message: format!("index {} does not exist", self.config.index_name),
                })?;
                Ok::<_, CollaboratorError>(data_plane_url(&description.host))
            })
            .await?;
        Ok(host.as_str())
    }
}

#[async_trait]
impl VectorIndex for PineconeClient {
    async fn ensure(&self, dimension: usize) -> Result<(), CollaboratorError> {
        match self.describe().await? {
            Some(description) if description.is_ready() => Ok(()),
            Some(_) => self.wait_until_ready().await,
            None => {
                self.create(dimension).await?;
                self.wait_until_ready().await
            }
        }
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), CollaboratorError> {
        let host = self.host().await?;
        let mut sent = 0;
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let body = UpsertRequest {
                vectors: batch,
                namespace,
            };
            let response = self
                .request(reqwest::Method::POST, format!("{host}/vectors/upsert"))
                .json(&body)
                .send()
                .await
                .map_err(|e| request_error(SERVICE, e))?;
            ensure_success(SERVICE, response).await?;
            sent += batch.len();
            tracing::info!(namespace, sent, total = records.len(), "Pinecone upsert batch");
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, CollaboratorError> {
        let host = self.host().await?;
        let body = QueryRequest {
            vector,
            top_k,
            namespace,
            include_metadata: true,
        };
        let response = self
            .request(reqwest::Method::POST, format!("{host}/query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let parsed: QueryResponse = parse_response(SERVICE, response).await?;
        tracing::info!(namespace, top_k, matches = parsed.matches.len(), "Pinecone query");
        Ok(parsed.matches.into_iter().map(VectorMatch::from).collect())
    }
}

/// Index descriptions carry a bare host name.
fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_metadata_is_converted() {
        let response: QueryResponse = serde_json::from_str(
            r#"{"matches":[{
                "id":"p00012",
                "score":0.83,
                "metadata":{"document_id":4.0,"paragraph_index":12.0,"text":"It is a truth"}
            }]}"#,
        )
        .unwrap();
        let m = VectorMatch::from(response.matches.into_iter().next().unwrap());
        assert_eq!(m.id, "p00012");
        let md = m.metadata.unwrap();
        assert_eq!(md.document_id, 4);
        assert_eq!(md.paragraph_index, 12);
        assert!(md.chapter.is_none());
    }

    #[test]
    fn query_body_uses_camel_case() {
        let body = QueryRequest {
            vector: &[0.5],
            top_k: 8,
            namespace: "gb:1342:abcd1234",
            include_metadata: true,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["topK"], 8);
        assert_eq!(value["includeMetadata"], true);
    }

    #[test]
    fn index_readiness_is_read_from_status() {
        let ready: IndexDescription =
            serde_json::from_str(r#"{"host":"h","status":{"ready":true,"state":"Ready"}}"#)
                .unwrap();
        let pending: IndexDescription = serde_json::from_str(r#"{"host":"h"}"#).unwrap();
        assert!(ready.is_ready());
        assert!(!pending.is_ready());
    }

    #[test]
    fn bare_host_gets_https_scheme() {
        assert_eq!(
            data_plane_url("essays-abc.svc.pinecone.io"),
            "https://essays-abc.svc.pinecone.io"
        );
        assert_eq!(data_plane_url("http://localhost:5081/"), "http://localhost:5081");
    }
}
