//! Environment variable access for toolset configuration.
//!
//! Toolsets read their connection settings through [`EnvSource`] so that
//! tests can supply a fixed map instead of mutating the process environment.

use std::collections::HashMap;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("{0} environment variable must be set")]
    Missing(String),

    #[error("{name} environment variable is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

/// A source of environment variables.
pub trait EnvSource: Send + Sync {
    /// Raw lookup. Implementations return `None` for unset variables.
    fn var(&self, name: &str) -> Option<String>;

    /// Lookup that treats empty values as unset.
    fn optional(&self, name: &str) -> Option<String> {
        self.var(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, EnvError> {
        self.optional(name)
            .ok_or_else(|| EnvError::Missing(name.to_string()))
    }

    /// Boolean flag; only a case-insensitive `true` counts as enabled.
    fn flag(&self, name: &str, default: bool) -> bool {
        match self.optional(name) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => default,
        }
    }
}

/// Parse `name` with [`FromStr`](std::str::FromStr), falling back to
/// `default` when the variable is unset.
pub fn parse_var<T>(env: &dyn EnvSource, name: &str, default: T) -> Result<T, EnvError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env.optional(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| EnvError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<K, V> FromIterator<(K, V)> for MapEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
