//! Notion REST API client.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use super::{BlockPage, QueryPage, QueryRequest, RemoteDatabase, RemotePage, RemotePropertyMap, RemoteStore};
use crate::classify::{classify, classify_transport, parse_retry_after};
use crate::config::{RetryConfig, StoreConfig, MAX_PAGE_SIZE};
use crate::document::DocumentId;
use crate::error::{RemoteError, StoreResult};

const USER_AGENT: &str = concat!("notion-docstore-mcp/", env!("CARGO_PKG_VERSION"));

/// HTTP implementation of [`RemoteStore`].
///
/// Cheap to share: the underlying connection pool lives in the `reqwest`
/// client.
pub struct HttpRemote {
    client: Client,
    base_url: String,
    token: String,
    api_version: String,
    database_id: String,
    retry: RetryConfig,
    health_timeout: std::time::Duration,
}

impl HttpRemote {
    /// Creates a client from the store configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        info!(
            base_url = %config.base_url,
            api_version = %config.api_version,
            database_id = %config.database_id,
            "Initializing remote client"
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            api_version: config.api_version.clone(),
            database_id: config.database_id.clone(),
            retry: config.retry.clone(),
            health_timeout: config.health_timeout,
        })
    }

    /// Builds an authenticated request.
    fn build_request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
            .header("Content-Type", "application/json")
    }

    /// Sends a request under the retry policy.
    ///
    /// `build` is called once per attempt.
    async fn send<T, F>(&self, op: &'static str, build: F) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retry = 0;
        loop {
            let started = Instant::now();
            match self.attempt(build()).await {
                Ok(value) => {
                    debug!(op, elapsed_ms = started.elapsed().as_millis() as u64, "Remote call succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && retry < self.retry.max_retries => {
                    let hint = match &err {
                        RemoteError::RateLimited { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_with_hint(retry, hint);
                    retry += 1;
                    warn!(
                        op,
                        retry,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if retry > 0 {
                        warn!(op, retries = retry, error = %err, "Remote call failed after retries");
                    } else {
                        debug!(op, error = %err, "Remote call failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One round-trip, classified.
    async fn attempt<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();

        if status.is_success() {
            let text = response.text().await.map_err(|e| classify_transport(&e))?;
            return serde_json::from_str(&text).map_err(|e| RemoteError::Unknown {
                status: status.as_u16(),
                body: format!("unparseable response ({}): {}", e, text),
            });
        }

        let retry_after = parse_retry_after(
            response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), retry_after, &body))
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn retrieve_database(&self) -> Result<RemoteDatabase, RemoteError> {
        let endpoint = format!("/databases/{}", self.database_id);
        self.send("retrieve_database", || self.build_request(Method::GET, &endpoint))
            .await
    }

    async fn create_page(
        &self,
        properties: RemotePropertyMap,
        children: Vec<JsonValue>,
    ) -> Result<RemotePage, RemoteError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
            "children": children,
        });
        self.send("create_page", || {
            self.build_request(Method::POST, "/pages").json(&body)
        })
        .await
    }

    async fn get_page(&self, id: &DocumentId) -> Result<RemotePage, RemoteError> {
        let endpoint = format!("/pages/{}", id);
        self.send("get_page", || self.build_request(Method::GET, &endpoint))
            .await
    }

    async fn get_block_children(
        &self,
        id: &DocumentId,
        cursor: Option<&str>,
    ) -> Result<BlockPage, RemoteError> {
        let endpoint = format!("/blocks/{}/children", id);
        let mut query = vec![("page_size", MAX_PAGE_SIZE.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        self.send("get_block_children", || {
            self.build_request(Method::GET, &endpoint).query(&query)
        })
        .await
    }

    async fn append_block_children(
        &self,
        id: &DocumentId,
        children: Vec<JsonValue>,
    ) -> Result<(), RemoteError> {
        let endpoint = format!("/blocks/{}/children", id);
        let body = json!({ "children": children });
        let _: IgnoredAny = self
            .send("append_block_children", || {
                self.build_request(Method::PATCH, &endpoint).json(&body)
            })
            .await?;
        Ok(())
    }

    async fn query_database(
        &self,
        request: &QueryRequest,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError> {
        let endpoint = format!("/databases/{}/query", self.database_id);
        let body = request.body(cursor);
        self.send("query_database", || {
            self.build_request(Method::POST, &endpoint).json(&body)
        })
        .await
    }

    /// Single attempt with the short health timeout, no retries.
    async fn ping(&self) -> Result<(), RemoteError> {
        let endpoint = format!("/databases/{}", self.database_id);
        let request = self
            .build_request(Method::GET, &endpoint)
            .timeout(self.health_timeout);
        let _: IgnoredAny = self.attempt(request).await?;
        Ok(())
    }
}
