//! HTTP layer: the [`ApiClient`] capability and its reqwest implementation.
//!
//! Everything above this module talks to Bitbucket through `ApiClient`, so
//! tests can substitute a scripted client and the production client can own
//! authentication, retries and cancellation in one place.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::Authenticator;
use crate::config::{BitbucketConfig, RetryConfig};
use crate::error::{BitbucketError, BitbucketResult};

/// Field projection applied to every request to drop nested link objects.
pub const DEFAULT_FIELDS: &[&str] = &["-links", "-*.links", "-*.*.links"];

/// Query parameters understood by the Bitbucket API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Page size (`pagelen`).
    pub page_len: Option<u32>,
    /// Upstream page cursor (`page`).
    pub page: Option<String>,
    /// Filter expression (`q`).
    pub query: Option<String>,
    /// Response field projection (`fields`).
    pub fields: Vec<String>,
}

impl QueryParams {
    /// Default field projection, no pagination.
    pub fn new() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    /// Page size and cursor. An empty cursor requests the first page.
    #[must_use]
    pub fn with_page(mut self, page_len: u32, page: &str) -> Self {
        self.page_len = Some(page_len);
        self.page = (!page.is_empty()).then(|| page.to_string());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Extra excluded fields on top of the defaults.
    #[must_use]
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(ToString::to_string));
        self
    }

    /// Append the parameters to `url`.
    pub fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        if let Some(len) = self.page_len {
            pairs.append_pair("pagelen", &len.to_string());
        }
        if let Some(page) = &self.page {
            pairs.append_pair("page", page);
        }
        if let Some(q) = &self.query {
            pairs.append_pair("q", q);
        }
        if !self.fields.is_empty() {
            pairs.append_pair("fields", &self.fields.join(","));
        }
        drop(pairs);
        if url.query() == Some("") {
            url.set_query(None);
        }
    }
}

/// Authenticated JSON transport.
///
/// Implementations surface HTTP status as [`BitbucketError::Api`] and
/// return `Value::Null` for empty bodies.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, url: Url, params: &QueryParams) -> BitbucketResult<Value>;

    async fn put(&self, url: Url, params: &QueryParams, body: &Value) -> BitbucketResult<Value>;

    async fn delete(&self, url: Url, params: &QueryParams) -> BitbucketResult<Value>;
}

/// Error body returned by Bitbucket.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// reqwest-backed [`ApiClient`].
#[derive(Debug)]
pub struct HttpApiClient {
    http_client: reqwest::Client,
    authenticator: Authenticator,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl HttpApiClient {
    /// Creates a new client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are incomplete or the HTTP client
    /// cannot be created.
    pub fn new(config: &BitbucketConfig) -> BitbucketResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BitbucketError::Config(format!("Failed to create HTTP client: {e}")))?;

        let auth = config.auth_option()?;
        debug!(auth = auth.kind(), "Configured Bitbucket authentication");

        Ok(Self {
            authenticator: Authenticator::new(auth, http_client.clone()),
            http_client,
            retry: config.retry.clone(),
            cancel: CancellationToken::new(),
        })
    }

    /// Observe `cancel` on every request and backoff sleep.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sends one logical request, retrying 429 and 502/503/504.
    #[instrument(skip(self, params, body), fields(url = %url))]
    async fn request_with_retry(
        &self,
        method: reqwest::Method,
        mut url: Url,
        params: &QueryParams,
        body: Option<&Value>,
    ) -> BitbucketResult<Value> {
        params.apply(&mut url);

        let mut attempt = 0u32;
        let mut refreshed_token = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(BitbucketError::Cancelled);
            }

            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(b) = body {
                request = request.json(b);
            }
            let request = tokio::select! {
                () = self.cancel.cancelled() => return Err(BitbucketError::Cancelled),
                request = self.authenticator.apply(request) => request?,
            };

            let response = tokio::select! {
                () = self.cancel.cancelled() => return Err(BitbucketError::Cancelled),
                response = request.send() => response?,
            };
            let status = response.status();

            // Handle rate limiting (429)
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempt < self.retry.max_retries
            {
                let delay = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .map(|d| d.min(Duration::from_millis(self.retry.max_backoff_ms)))
                    .unwrap_or_else(|| Duration::from_millis(self.retry.backoff_ms(attempt)));
                attempt += 1;
                warn!(
                    "Rate limited, retry {}/{} after {:?}",
                    attempt, self.retry.max_retries, delay
                );
                self.sleep(delay).await?;
                continue;
            }

            // Handle transient errors (502, 503, 504)
            if matches!(
                status,
                reqwest::StatusCode::BAD_GATEWAY
                    | reqwest::StatusCode::SERVICE_UNAVAILABLE
                    | reqwest::StatusCode::GATEWAY_TIMEOUT
            ) && attempt < self.retry.max_retries
            {
                let delay = Duration::from_millis(self.retry.backoff_ms(attempt));
                attempt += 1;
                warn!(
                    "Transient error {}, retry {}/{} after {:?}",
                    status, attempt, self.retry.max_retries, delay
                );
                self.sleep(delay).await?;
                continue;
            }

            // An expired OAuth2 token gets one refresh
            if status == reqwest::StatusCode::UNAUTHORIZED
                && !refreshed_token
                && matches!(self.authenticator, Authenticator::OAuth2(_))
            {
                refreshed_token = true;
                self.authenticator.invalidate().await;
                continue;
            }

            let text = tokio::select! {
                () = self.cancel.cancelled() => return Err(BitbucketError::Cancelled),
                text = response.text() => text?,
            };

            if status.is_success() {
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&text).map_err(BitbucketError::from);
            }

            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| format!("Error: {}", e.error.message))
                .unwrap_or(text);

            return Err(BitbucketError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }

    async fn sleep(&self, delay: Duration) -> BitbucketResult<()> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(BitbucketError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get(&self, url: Url, params: &QueryParams) -> BitbucketResult<Value> {
        self.request_with_retry(reqwest::Method::GET, url, params, None)
            .await
    }

    async fn put(&self, url: Url, params: &QueryParams, body: &Value) -> BitbucketResult<Value> {
        self.request_with_retry(reqwest::Method::PUT, url, params, Some(body))
            .await
    }

    async fn delete(&self, url: Url, params: &QueryParams) -> BitbucketResult<Value> {
        self.request_with_retry(reqwest::Method::DELETE, url, params, None)
            .await
    }
}
