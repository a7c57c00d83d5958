//! Firestore REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};

/// Store client configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                StoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access the job store",
                )
            })?;

        if project_id.is_empty() {
            return Err(StoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("STORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("STORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

/// Firestore REST API client for the job store.
pub struct StoreClient {
    http: Client,
    config: StoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl Clone for StoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            base_url: self.base_url.clone(),
            token_cache: Arc::clone(&self.token_cache),
        }
    }
}

impl StoreClient {
    /// Create a new store client.
    pub async fn new(config: StoreConfig) -> StoreResult<Self> {
        let auth = Self::create_auth_provider()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vtx-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            token_cache: Arc::new(TokenCache::new(auth)),
        })
    }

    fn create_auth_provider() -> StoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            StoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(StoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> StoreResult<Self> {
        let config = StoreConfig::from_env()?;
        Self::new(config).await
    }

    async fn get_token(&self) -> StoreResult<String> {
        self.token_cache.get_token().await
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Send a request, refreshing the token once on an expired-token 401.
    async fn send_authorized<F>(&self, url: &str, build: F) -> StoreResult<reqwest::Response>
    where
        F: Fn(&Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.get_token().await?;
        let response = build(&self.http, &token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(StoreError::from_http_status(
                401,
                format!("{} failed: {}", url, body),
            ));
        }

        self.token_cache.invalidate().await;
        let token = self.get_token().await?;
        Ok(build(&self.http, &token).send().await?)
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> StoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http, token| http.get(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let doc: Document = response.json().await?;
                    Ok(Some(doc))
                }
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> StoreResult<Document> {
        let url = format!("{}/{}?documentId={}", self.base_url, collection, doc_id);
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http, token| {
                    http.post(&url).bearer_auth(token).json(&body)
                })
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => {
                    let doc: Document = response.json().await?;
                    Ok(doc)
                }
                StatusCode::CONFLICT => Err(StoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Update a document, merging only the masked fields.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> StoreResult<Document> {
        let mut url = self.document_path(collection, doc_id);
        if let Some(mask) = update_mask {
            let params: Vec<String> = mask
                .iter()
                .map(|f| format!("updateMask.fieldPaths={}", f))
                .collect();
            url = format!("{}?{}", url, params.join("&"));
        }

        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http, token| {
                    http.patch(&url).bearer_auth(token).json(&body)
                })
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let doc: Document = response.json().await?;
                    Ok(doc)
                }
                StatusCode::NOT_FOUND => {
                    Err(StoreError::not_found(format!("{}/{}", collection, doc_id)))
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Deleting an absent document is a no-op.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> StoreResult<()> {
        let url = self.document_path(collection, doc_id);
        let coll = collection.to_string();
        let id = doc_id.to_string();

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |http, token| http.delete(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!("Document {}/{} already deleted (idempotent)", coll, id);
                    Ok(())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Run a structured query.
    ///
    /// `parent_path` is the path containing the queried collection, e.g.
    /// "transcodingJobs/JOB_ID" to query its "logs" subcollection. `None`
    /// queries a root collection.
    pub async fn run_query(
        &self,
        parent_path: Option<&str>,
        query: StructuredQuery,
    ) -> StoreResult<Vec<Document>> {
        let url = match parent_path {
            Some(parent) => format!("{}/{}:runQuery", self.base_url, parent),
            None => format!("{}:runQuery", self.base_url),
        };
        let request = RunQueryRequest {
            structured_query: query,
        };

        let span_target = parent_path.unwrap_or("(root)");

        self.execute_request("run_query", span_target, None, async {
            let response = self
                .send_authorized(&url, |http, token| {
                    http.post(&url).bearer_auth(token).json(&request)
                })
                .await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.unwrap_or_default();
                    // runQuery returns a JSON array of response objects
                    let responses: Vec<RunQueryResponse> =
                        serde_json::from_str(&body).map_err(|e| {
                            StoreError::request_failed(format!(
                                "Failed to parse runQuery response: {} (body prefix: {})",
                                e,
                                &body[..body.len().min(200)]
                            ))
                        })?;

                    Ok(responses.into_iter().filter_map(|r| r.document).collect())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("store_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("store_request", operation = %operation, collection = %collection)
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(
        status: StatusCode,
        url: &str,
        response: reqwest::Response,
    ) -> StoreError {
        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_from_env_validates_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        let result = StoreConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::remove_var("STORE_CONNECT_TIMEOUT_SECS");
        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
        std::env::remove_var("GCP_PROJECT_ID");
    }

    #[test]
    fn test_access_token_expired_detection() {
        assert!(StoreClient::is_access_token_expired(
            r#"{"error":{"status":"UNAUTHENTICATED"}}"#
        ));
        assert!(StoreClient::is_access_token_expired("ACCESS_TOKEN_EXPIRED"));
        assert!(!StoreClient::is_access_token_expired("permission denied"));
    }
}
