//! Authentication for the Bitbucket API.
//!
//! Bearer and basic credentials are applied as-is. OAuth consumers exchange
//! their key and secret for an access token at the login endpoint; the
//! token is cached until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{BitbucketError, BitbucketResult};

/// Resolved authentication scheme.
#[derive(Clone)]
pub enum AuthOption {
    /// Workspace or project access token.
    Bearer { token: SecretString },
    /// Username and app password.
    Basic {
        username: String,
        password: SecretString,
    },
    /// OAuth consumer using the client credentials grant.
    OAuth2 {
        token_url: String,
        consumer_key: String,
        consumer_secret: SecretString,
    },
}

impl AuthOption {
    /// Short scheme name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthOption::Bearer { .. } => "bearer",
            AuthOption::Basic { .. } => "basic",
            AuthOption::OAuth2 { .. } => "oauth2",
        }
    }
}

impl fmt::Debug for AuthOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthOption::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            AuthOption::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthOption::OAuth2 {
                token_url,
                consumer_key,
                ..
            } => f
                .debug_struct("OAuth2")
                .field("token_url", token_url)
                .field("consumer_key", consumer_key)
                .field("consumer_secret", &"***")
                .finish(),
        }
    }
}

/// OAuth2 token response from the Bitbucket login endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Cached OAuth2 access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the client credentials flow.
#[derive(Debug)]
pub struct TokenCache {
    token_url: String,
    consumer_key: String,
    consumer_secret: SecretString,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Grace period before expiry to trigger refresh (default: 5 minutes).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    pub fn new(
        http_client: reqwest::Client,
        token_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: SecretString,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            consumer_key: consumer_key.into(),
            consumer_secret,
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::minutes(5),
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(consumer_key = %self.consumer_key))]
    pub async fn get_token(&self) -> BitbucketResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Exchanges the consumer credentials for a new access token.
    async fn acquire_token(&self) -> BitbucketResult<CachedToken> {
        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(&self.consumer_key, Some(self.consumer_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| BitbucketError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BitbucketError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| BitbucketError::Auth(format!("Failed to parse token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

/// Applies an [`AuthOption`] to outgoing requests.
#[derive(Debug)]
pub(crate) enum Authenticator {
    Static(AuthOption),
    OAuth2(TokenCache),
}

impl Authenticator {
    pub(crate) fn new(option: AuthOption, http_client: reqwest::Client) -> Self {
        match option {
            AuthOption::OAuth2 {
                token_url,
                consumer_key,
                consumer_secret,
            } => Authenticator::OAuth2(TokenCache::new(
                http_client,
                token_url,
                consumer_key,
                consumer_secret,
            )),
            other => Authenticator::Static(other),
        }
    }

    pub(crate) async fn apply(
        &self,
        request: reqwest::RequestBuilder,
    ) -> BitbucketResult<reqwest::RequestBuilder> {
        Ok(match self {
            Authenticator::Static(AuthOption::Bearer { token }) => {
                request.bearer_auth(token.expose_secret())
            }
            Authenticator::Static(AuthOption::Basic { username, password }) => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
            // Constructed only through `new`, which routes OAuth2 to the cache.
            Authenticator::Static(AuthOption::OAuth2 { .. }) => request,
            Authenticator::OAuth2(cache) => request.bearer_auth(cache.get_token().await?),
        })
    }

    /// Drop a cached OAuth2 token after a 401.
    pub(crate) async fn invalidate(&self) {
        if let Authenticator::OAuth2(cache) = self {
            cache.invalidate().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_cached_token_expiry() {
        let token = CachedToken {
            access_token: "test".to_string(),
            expires_at: Utc::now() + Duration::minutes(10),
        };

        // Not expired with 5 minute grace
        assert!(!token.is_expired(Duration::minutes(5)));

        // Expired with 15 minute grace
        assert!(token.is_expired(Duration::minutes(15)));
    }

    #[test]
    fn test_auth_option_debug_redacts_secrets() {
        let option = AuthOption::Basic {
            username: "admin".to_string(),
            password: SecretString::from("hunter2".to_string()),
        };
        let debug = format!("{option:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
        assert_eq!(option.kind(), "basic");
    }

    #[tokio::test]
    async fn test_token_is_fetched_once_and_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/site/oauth2/access_token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc",
                "expires_in": 7200,
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = TokenCache::new(
            reqwest::Client::new(),
            format!("{}/site/oauth2/access_token", server.uri()),
            "key",
            SecretString::from("secret".to_string()),
        );

        assert_eq!(cache.get_token().await.unwrap(), "abc");
        assert_eq!(cache.get_token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_token_failure_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad consumer"))
            .mount(&server)
            .await;

        let cache = TokenCache::new(
            reqwest::Client::new(),
            server.uri(),
            "key",
            SecretString::from("wrong".to_string()),
        );

        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, BitbucketError::Auth(_)));
        assert!(err.to_string().contains("401"));
    }
}
