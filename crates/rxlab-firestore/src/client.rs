//! Firestore REST API document client.
//!
//! Composes the auth broker with the value codec to drive the REST write and
//! structured-query endpoints directly:
//! - Upsert-by-id writes (PATCH), every write stamped with `updatedAt`
//! - Ordered, limited, always-descending structured queries
//! - Soft absence: without a project id or credential, operations resolve to
//!   `None`/empty with zero network calls
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Map;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use rxlab_gauth::{CredentialStore, TokenCache};

use crate::codec;
use crate::error::{snippet, FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::types::{
    CollectionSelector, Document, FieldReference, Order, RunQueryRequest, RunQueryResponse,
    StructuredQuery, Value,
};

/// OAuth scope for Firestore access via the datastore surface.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Production Firestore REST endpoint root.
const DEFAULT_API_ROOT: &str = "https://firestore.googleapis.com/v1";

/// Queries are always newest-first; this client is not a query builder.
const QUERY_DIRECTION: &str = "DESCENDING";

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project id; `None` means persistence is not configured.
    pub project_id: Option<String>,
    /// Database id (usually "(default)")
    pub database_id: String,
    /// Endpoint root, overridable for tests.
    pub api_root: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl FirestoreConfig {
    /// Create config from environment variables and the credential store.
    ///
    /// A missing project id is NOT an error: the client degrades to
    /// soft-absent operations.
    pub fn from_env(store: &CredentialStore) -> Self {
        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Self {
            project_id: store.project_id(),
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            api_root: DEFAULT_API_ROOT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
        }
    }
}

/// Query options for [`FirestoreClient::list`].
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: i32,
    pub order_by: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            order_by: "createdAt".to_string(),
        }
    }
}

/// A document returned by a read: its id plus decoded fields.
#[derive(Debug, Clone)]
pub struct QueriedDocument {
    pub id: String,
    pub data: Map<String, serde_json::Value>,
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    quota_project: Option<String>,
    tokens: Arc<TokenCache>,
}

impl Clone for FirestoreClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            quota_project: self.quota_project.clone(),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl FirestoreClient {
    /// Create a new Firestore client around a credential store.
    pub fn new(config: FirestoreConfig, store: CredentialStore) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("rxlab-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let quota_project = store.quota_project_id();
        let tokens = Arc::new(TokenCache::new(store, http.clone()));

        Ok(Self {
            http,
            config,
            quota_project,
            tokens,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let store = CredentialStore::from_env();
        let config = FirestoreConfig::from_env(&store);
        Self::new(config, store)
    }

    /// Get a bearer token; `None` when no credential is configured.
    async fn get_token(&self) -> FirestoreResult<Option<String>> {
        Ok(self.tokens.get_token(&[FIRESTORE_SCOPE]).await?)
    }

    /// Documents root for the configured project and database.
    fn documents_root(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.config.api_root, project_id, self.config.database_id
        )
    }

    /// Percent-encode each `/`-separated segment independently, so
    /// collection and document identifiers may carry reserved characters.
    fn encode_path(collection: &str) -> String {
        collection
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Bearer auth plus the quota-project header when one is known.
    fn authorize(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        let request = request.bearer_auth(token);
        match &self.quota_project {
            Some(quota_project) => request.header("x-goog-user-project", quota_project),
            None => request,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Upsert a document by id, generating a random id when none is given.
    ///
    /// Every write stamps (or overwrites) an `updatedAt` timestamp field;
    /// callers cannot opt out. Returns the document id, or `Ok(None)` when
    /// persistence is not configured.
    pub async fn write(
        &self,
        collection: &str,
        data: &Map<String, serde_json::Value>,
        document_id: Option<&str>,
    ) -> FirestoreResult<Option<String>> {
        let Some(project_id) = self.config.project_id.clone() else {
            return Ok(None);
        };
        let Some(token) = self.get_token().await? else {
            return Ok(None);
        };

        let doc_id = match document_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut fields = codec::encode_fields(data);
        fields.insert("updatedAt".to_string(), Value::timestamp(Utc::now()));
        let body = Document::new(fields);

        let url = format!(
            "{}/{}/{}",
            self.documents_root(&project_id),
            Self::encode_path(collection),
            urlencoding::encode(&doc_id)
        );

        self.execute_request("write", collection, Some(&doc_id), async {
            let request = self.authorize(self.http.patch(&url), &token).json(&body);
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Self::handle_error_response(status, response).await);
            }
            Ok(Some(doc_id.clone()))
        })
        .await
    }

    /// List the newest documents of a collection, decoded to JSON.
    ///
    /// Returns `Ok(vec![])` when persistence is not configured. Response
    /// entries without a `document` (heartbeats) are skipped.
    pub async fn list(
        &self,
        collection: &str,
        options: ListOptions,
    ) -> FirestoreResult<Vec<QueriedDocument>> {
        let Some(project_id) = self.config.project_id.clone() else {
            return Ok(Vec::new());
        };
        let Some(token) = self.get_token().await? else {
            return Ok(Vec::new());
        };

        let url = format!("{}:runQuery", self.documents_root(&project_id));
        let body = RunQueryRequest {
            structured_query: StructuredQuery {
                from: vec![CollectionSelector {
                    collection_id: collection.to_string(),
                }],
                order_by: vec![Order {
                    field: FieldReference {
                        field_path: options.order_by.clone(),
                    },
                    direction: QUERY_DIRECTION.to_string(),
                }],
                limit: options.limit,
            },
        };

        self.execute_request("list", collection, None, async {
            let request = self.authorize(self.http.post(&url), &token).json(&body);
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(Self::handle_error_response(status, response).await);
            }

            let payload = response.text().await.unwrap_or_default();
            let entries: Vec<RunQueryResponse> =
                serde_json::from_str(&payload).map_err(|e| {
                    FirestoreError::invalid_response(format!(
                        "runQuery payload: {} (body prefix: {})",
                        e,
                        snippet(&payload)
                    ))
                })?;

            let documents: Vec<QueriedDocument> = entries
                .into_iter()
                .filter_map(|entry| entry.document)
                .filter_map(|document| {
                    let id = document.id()?.to_string();
                    let fields = document.fields.unwrap_or_default();
                    Some(QueriedDocument {
                        id,
                        data: codec::decode_fields(&fields),
                    })
                })
                .collect();

            debug!(collection = %collection, returned = documents.len(), "listed documents");
            Ok(documents)
        })
        .await
    }

    /// Fetch one document by id. `Ok(None)` covers both a missing document
    /// and unconfigured persistence.
    pub async fn get(
        &self,
        collection: &str,
        document_id: &str,
    ) -> FirestoreResult<Option<QueriedDocument>> {
        let Some(project_id) = self.config.project_id.clone() else {
            return Ok(None);
        };
        let Some(token) = self.get_token().await? else {
            return Ok(None);
        };

        let url = format!(
            "{}/{}/{}",
            self.documents_root(&project_id),
            Self::encode_path(collection),
            urlencoding::encode(document_id)
        );

        self.execute_request("get", collection, Some(document_id), async {
            let response = self.authorize(self.http.get(&url), &token).send().await?;
            let status = response.status();
            match status {
                StatusCode::OK => {
                    let document: Document = response.json().await?;
                    let id = document
                        .id()
                        .unwrap_or(document_id)
                        .to_string();
                    let fields = document.fields.unwrap_or_default();
                    Ok(Some(QueriedDocument {
                        id,
                        data: codec::decode_fields(&fields),
                    }))
                }
                StatusCode::NOT_FOUND => Ok(None),
                _ => Err(Self::handle_error_response(status, response).await),
            }
        })
        .await
    }

    /// Delete one document by id. Idempotent: a missing document is a no-op,
    /// as is unconfigured persistence.
    pub async fn delete(&self, collection: &str, document_id: &str) -> FirestoreResult<()> {
        let Some(project_id) = self.config.project_id.clone() else {
            return Ok(());
        };
        let Some(token) = self.get_token().await? else {
            return Ok(());
        };

        let url = format!(
            "{}/{}/{}",
            self.documents_root(&project_id),
            Self::encode_path(collection),
            urlencoding::encode(document_id)
        );

        self.execute_request("delete", collection, Some(document_id), async {
            let response = self
                .authorize(self.http.delete(&url), &token)
                .send()
                .await?;
            let status = response.status();
            match status {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!(collection = %collection, doc_id = %document_id, "already deleted");
                    Ok(())
                }
                _ => Err(Self::handle_error_response(status, response).await),
            }
        })
        .await
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
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = if let Some(id) = doc_id {
            info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id)
        } else {
            info_span!("firestore_request", operation = %operation, collection = %collection)
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
        response: reqwest::Response,
    ) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::request_failed(status.as_u16(), &body)
    }
}

// =============================================================================
// Tests
// =============================================================================
