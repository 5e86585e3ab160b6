use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEMES: [&str; 3] = ["redis://", "rediss://", "unix://"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedisConfigError {
    #[error("redis url is empty")]
    Empty,

    #[error("unsupported redis url scheme: {0}")]
    Scheme(String),
}

/// Connection settings for the coordination store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn validate(&self) -> Result<(), RedisConfigError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(RedisConfigError::Empty);
        }
        if !SCHEMES.iter().any(|s| url.starts_with(s)) {
            let scheme = url.split("://").next().unwrap_or(url);
            return Err(RedisConfigError::Scheme(scheme.to_string()));
        }
        Ok(())
    }

    /// Url with the password part masked, for logs.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        match rest.rsplit_once('@') {
            Some((creds, host)) => {
                let user = creds.split(':').next().unwrap_or_default();
                format!("{scheme}://{user}:***@{host}")
            }
            None => self.url.clone(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}
