//! Connection settings for an OpenSearch cluster.

use crate::error::{OpenSearchError, OpenSearchResult};
use std::time::Duration;
use toolbelt_core::{parse_var, EnvSource};
use url::Url;

pub const HOST_VAR: &str = "OPENSEARCH_HOST";
pub const PORT_VAR: &str = "OPENSEARCH_PORT";
pub const USE_SSL_VAR: &str = "OPENSEARCH_USE_SSL";
pub const USERNAME_VAR: &str = "OPENSEARCH_USERNAME";
pub const PASSWORD_VAR: &str = "OPENSEARCH_PASSWORD";

pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Basic auth credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for the OpenSearch client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the cluster, e.g. `https://localhost:9200/`.
    pub base_url: Url,
    /// Basic auth, sent only when present.
    pub credentials: Option<Credentials>,
    /// Request timeout.
    pub timeout: Duration,
    /// Verify TLS certificates. Off by default for development clusters.
    pub verify_certs: bool,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            verify_certs: false,
        }
    }

    /// Read `OPENSEARCH_*` variables.
    ///
    /// `OPENSEARCH_HOST` is required. The port defaults to 9200 and SSL is on
    /// unless `OPENSEARCH_USE_SSL` is something other than `true`. Credentials
    /// are only used when both username and password are set.
    pub fn from_env(env: &dyn EnvSource) -> OpenSearchResult<Self> {
        let host = env.required(HOST_VAR)?;
        let port: u16 = parse_var(env, PORT_VAR, DEFAULT_PORT)?;
        let scheme = if env.flag(USE_SSL_VAR, true) { "https" } else { "http" };

        let base_url = Url::parse(&format!("{}://{}:{}/", scheme, host.trim(), port))?;

        let credentials = match (env.optional(USERNAME_VAR), env.optional(PASSWORD_VAR)) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        };

        Ok(Self {
            credentials,
            ..Self::new(base_url)
        })
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn validate(&self) -> OpenSearchResult<()> {
        match self.base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(OpenSearchError::Config(format!(
                "Unsupported URL scheme: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbelt_core::{EnvError, MapEnv};

    #[test]
    fn test_from_env_defaults() {
        let env = MapEnv::new().with(HOST_VAR, "search.local");
        let config = ClientConfig::from_env(&env).unwrap();

        assert_eq!(config.base_url.as_str(), "https://search.local:9200/");
        assert!(config.credentials.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(!config.verify_certs);
    }

    #[test]
    fn test_from_env_full() {
        let env: MapEnv = [
            (HOST_VAR, "10.0.0.5"),
            (PORT_VAR, "9243"),
            (USE_SSL_VAR, "False"),
            (USERNAME_VAR, "admin"),
            (PASSWORD_VAR, "secret"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_env(&env).unwrap();
        assert_eq!(config.base_url.as_str(), "http://10.0.0.5:9243/");

        let credentials = config.credentials.unwrap();
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password, "secret");
    }

    #[test]
    fn test_username_without_password_disables_auth() {
        let env = MapEnv::new()
            .with(HOST_VAR, "localhost")
            .with(USERNAME_VAR, "admin");

        let config = ClientConfig::from_env(&env).unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_missing_host() {
        let err = ClientConfig::from_env(&MapEnv::new()).unwrap_err();
        assert!(matches!(err, OpenSearchError::Env(EnvError::Missing(_))));
        assert_eq!(err.to_string(), "OPENSEARCH_HOST environment variable must be set");
    }

    #[test]
    fn test_invalid_port() {
        let env = MapEnv::new()
            .with(HOST_VAR, "localhost")
            .with(PORT_VAR, "not-a-port");

        assert!(ClientConfig::from_env(&env).is_err());
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let config = ClientConfig::new(Url::parse("http://localhost:9200").unwrap())
            .with_credentials("admin", "hunter2");

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("admin"));
    }
}
