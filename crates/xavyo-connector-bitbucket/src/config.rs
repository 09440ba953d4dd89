//! Bitbucket connector configuration.
//!
//! Loaded from environment variables (or any variable reader in tests) and
//! validated into a single [`AuthOption`] before any request is made.

use secrecy::SecretString;
use std::fmt;

use crate::auth::AuthOption;

/// Default Bitbucket Cloud REST API (v2).
pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0/";
/// Legacy API still required for user group management.
pub const DEFAULT_V1_BASE_URL: &str = "https://api.bitbucket.org/1.0/";
/// OAuth2 client credentials endpoint.
pub const DEFAULT_LOGIN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";
/// Page size for resource listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Retry policy for transient HTTP failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds (default: 500).
    pub initial_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds (default: 30000).
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom max retries.
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Disable retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Set initial backoff.
    #[must_use]
    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Set maximum backoff.
    #[must_use]
    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Backoff before retry number `attempt` (0-based), doubling each time.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempt);
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

/// Raw credential fields. At most one family is used, see [`Self::auth_option`].
#[derive(Clone, Default)]
pub struct BitbucketCredentials {
    pub token: Option<SecretString>,
    pub username: Option<String>,
    pub app_password: Option<SecretString>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<SecretString>,
}

impl fmt::Debug for BitbucketCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |present: bool| if present { "***" } else { "<unset>" };
        f.debug_struct("BitbucketCredentials")
            .field("token", &redact(self.token.is_some()))
            .field("username", &self.username)
            .field("app_password", &redact(self.app_password.is_some()))
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &redact(self.consumer_secret.is_some()))
            .finish()
    }
}

impl BitbucketCredentials {
    /// Bearer token credentials.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            ..Default::default()
        }
    }

    /// Username and app password credentials.
    pub fn basic(username: impl Into<String>, app_password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            app_password: Some(SecretString::from(app_password.into())),
            ..Default::default()
        }
    }

    /// OAuth consumer credentials.
    pub fn oauth2(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: Some(consumer_key.into()),
            consumer_secret: Some(SecretString::from(consumer_secret.into())),
            ..Default::default()
        }
    }

    /// Resolve the authentication scheme.
    ///
    /// Username/app-password and consumer key/secret must be given together.
    /// Precedence: token, then basic, then OAuth2.
    pub fn auth_option(&self, login_url: &str) -> Result<AuthOption, ConfigError> {
        if self.username.is_some() != self.app_password.is_some() {
            return Err(ConfigError::Invalid(
                "username and app password must be provided together".to_string(),
            ));
        }
        if self.consumer_key.is_some() != self.consumer_secret.is_some() {
            return Err(ConfigError::Invalid(
                "consumer key and consumer secret must be provided together".to_string(),
            ));
        }

        if let Some(token) = &self.token {
            return Ok(AuthOption::Bearer {
                token: token.clone(),
            });
        }
        if let (Some(username), Some(password)) = (&self.username, &self.app_password) {
            return Ok(AuthOption::Basic {
                username: username.clone(),
                password: password.clone(),
            });
        }
        if let (Some(key), Some(secret)) = (&self.consumer_key, &self.consumer_secret) {
            return Ok(AuthOption::OAuth2 {
                token_url: login_url.to_string(),
                consumer_key: key.clone(),
                consumer_secret: secret.clone(),
            });
        }

        Err(ConfigError::Invalid(
            "either an access token, username and app password or consumer key and secret must be provided"
                .to_string(),
        ))
    }
}

/// Configuration for the Bitbucket connector.
#[derive(Debug, Clone)]
pub struct BitbucketConfig {
    /// v2 API base URL, with trailing slash.
    pub base_url: String,
    /// v1 API base URL, with trailing slash.
    pub v1_base_url: String,
    /// OAuth2 token endpoint.
    pub login_url: String,
    /// Workspace slugs to restrict the sync to. Empty means all.
    pub workspaces: Vec<String>,
    /// Page size for lazy listings.
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    pub credentials: BitbucketCredentials,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            v1_base_url: DEFAULT_V1_BASE_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            workspaces: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
            credentials: BitbucketCredentials::default(),
        }
    }
}

impl BitbucketConfig {
    /// Create a config with default endpoints and the given credentials.
    pub fn new(credentials: BitbucketCredentials) -> Self {
        Self {
            credentials,
            ..Default::default()
        }
    }

    /// Point both API versions at another host (mock servers in tests).
    #[must_use]
    pub fn with_base_urls(mut self, v2: impl Into<String>, v1: impl Into<String>) -> Self {
        self.base_url = with_trailing_slash(v2.into());
        self.v1_base_url = with_trailing_slash(v1.into());
        self
    }

    #[must_use]
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    #[must_use]
    pub fn with_workspaces(mut self, workspaces: Vec<String>) -> Self {
        self.workspaces = workspaces;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let non_empty = |key: &str| reader(key).ok().filter(|v| !v.trim().is_empty());

        let credentials = BitbucketCredentials {
            token: non_empty("BITBUCKET_TOKEN").map(SecretString::from),
            username: non_empty("BITBUCKET_USERNAME"),
            app_password: non_empty("BITBUCKET_APP_PASSWORD").map(SecretString::from),
            consumer_key: non_empty("BITBUCKET_CONSUMER_KEY"),
            consumer_secret: non_empty("BITBUCKET_CONSUMER_SECRET").map(SecretString::from),
        };

        let workspaces = non_empty("BITBUCKET_WORKSPACES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let base_url = non_empty("BITBUCKET_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let v1_base_url =
            non_empty("BITBUCKET_V1_BASE_URL").unwrap_or_else(|| DEFAULT_V1_BASE_URL.into());
        let login_url =
            non_empty("BITBUCKET_LOGIN_URL").unwrap_or_else(|| DEFAULT_LOGIN_URL.into());

        let page_size = parse_or(
            "BITBUCKET_PAGE_SIZE",
            non_empty("BITBUCKET_PAGE_SIZE"),
            DEFAULT_PAGE_SIZE,
        )?;
        let max_retries = parse_or(
            "BITBUCKET_MAX_RETRIES",
            non_empty("BITBUCKET_MAX_RETRIES"),
            3u32,
        )?;
        let request_timeout_secs = parse_or(
            "BITBUCKET_REQUEST_TIMEOUT_SECS",
            non_empty("BITBUCKET_REQUEST_TIMEOUT_SECS"),
            30u64,
        )?;

        let config = Self {
            base_url: with_trailing_slash(base_url),
            v1_base_url: with_trailing_slash(v1_base_url),
            login_url,
            workspaces,
            page_size,
            request_timeout_secs,
            retry: RetryConfig::new(max_retries),
            credentials,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check URLs, page size and credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("BITBUCKET_BASE_URL", &self.base_url),
            ("BITBUCKET_V1_BASE_URL", &self.v1_base_url),
            ("BITBUCKET_LOGIN_URL", &self.login_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))?;
        }

        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "BITBUCKET_PAGE_SIZE".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        self.auth_option().map(|_| ())
    }

    /// Authentication scheme resolved from the credentials.
    pub fn auth_option(&self) -> Result<AuthOption, ConfigError> {
        self.credentials.auth_option(&self.login_url)
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::BitbucketError {
    fn from(err: ConfigError) -> Self {
        crate::error::BitbucketError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::env::VarError;

    /// Create a reader closure from a HashMap (no global env mutation).
    fn make_reader(vars: HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        let owned: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| owned.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn test_no_credentials() {
        let err = BitbucketConfig::from_reader(make_reader(HashMap::new())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("either an access token"));
    }

    #[test]
    fn test_defaults_with_token() {
        let config =
            BitbucketConfig::from_reader(make_reader(HashMap::from([("BITBUCKET_TOKEN", "t0k")])))
                .expect("should succeed with defaults");

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.v1_base_url, DEFAULT_V1_BASE_URL);
        assert_eq!(config.login_url, DEFAULT_LOGIN_URL);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.workspaces.is_empty());

        match config.auth_option().unwrap() {
            AuthOption::Bearer { token } => assert_eq!(token.expose_secret(), "t0k"),
            other => panic!("expected bearer auth, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_values() {
        let config = BitbucketConfig::from_reader(make_reader(HashMap::from([
            ("BITBUCKET_USERNAME", "admin"),
            ("BITBUCKET_APP_PASSWORD", "secret"),
            ("BITBUCKET_WORKSPACES", "acme, widgets ,,"),
            ("BITBUCKET_BASE_URL", "http://localhost:8080/2.0"),
            ("BITBUCKET_PAGE_SIZE", "10"),
            ("BITBUCKET_MAX_RETRIES", "0"),
        ])))
        .unwrap();

        assert_eq!(config.workspaces, vec!["acme", "widgets"]);
        assert_eq!(config.base_url, "http://localhost:8080/2.0/");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.retry.max_retries, 0);
        assert!(matches!(
            config.auth_option().unwrap(),
            AuthOption::Basic { .. }
        ));
    }

    #[test]
    fn test_pairs_required_together() {
        let err = BitbucketConfig::from_reader(make_reader(HashMap::from([
            ("BITBUCKET_TOKEN", "t0k"),
            ("BITBUCKET_USERNAME", "admin"),
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("username and app password"));

        let err = BitbucketConfig::from_reader(make_reader(HashMap::from([(
            "BITBUCKET_CONSUMER_SECRET",
            "s",
        )])))
        .unwrap_err();
        assert!(err.to_string().contains("consumer key and consumer secret"));
    }

    #[test]
    fn test_auth_precedence() {
        let creds = BitbucketCredentials {
            token: Some(SecretString::from("t".to_string())),
            ..BitbucketCredentials::basic("u", "p")
        };
        assert!(matches!(
            creds.auth_option(DEFAULT_LOGIN_URL).unwrap(),
            AuthOption::Bearer { .. }
        ));

        let creds = BitbucketCredentials {
            consumer_key: Some("k".to_string()),
            consumer_secret: Some(SecretString::from("s".to_string())),
            ..BitbucketCredentials::basic("u", "p")
        };
        assert!(matches!(
            creds.auth_option(DEFAULT_LOGIN_URL).unwrap(),
            AuthOption::Basic { .. }
        ));

        match BitbucketCredentials::oauth2("k", "s")
            .auth_option(DEFAULT_LOGIN_URL)
            .unwrap()
        {
            AuthOption::OAuth2 { token_url, .. } => assert_eq!(token_url, DEFAULT_LOGIN_URL),
            other => panic!("expected oauth2, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_page_size() {
        let err = BitbucketConfig::from_reader(make_reader(HashMap::from([
            ("BITBUCKET_TOKEN", "t"),
            ("BITBUCKET_PAGE_SIZE", "lots"),
        ])))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(..)));
        assert!(err.to_string().contains("BITBUCKET_PAGE_SIZE"));

        let err = BitbucketConfig::from_reader(make_reader(HashMap::from([
            ("BITBUCKET_TOKEN", "t"),
            ("BITBUCKET_PAGE_SIZE", "0"),
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = BitbucketCredentials::basic("admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_retry_backoff() {
        let retry = RetryConfig::new(5).with_initial_backoff(100).with_max_backoff(1000);
        assert_eq!(retry.backoff_ms(0), 100);
        assert_eq!(retry.backoff_ms(1), 200);
        assert_eq!(retry.backoff_ms(3), 800);
        assert_eq!(retry.backoff_ms(4), 1000);
        assert_eq!(RetryConfig::disabled().max_retries, 0);
    }
}
