use std::fmt;

use tracing_subscriber::EnvFilter;

use super::error::LoggerError;

/// Validated `EnvFilter` directive string, e.g. `info` or `warn,tether_core=debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn new(directives: impl Into<String>) -> Result<Self, LoggerError> {
        let directives = directives.into();
        let trimmed = directives.trim();
        if trimmed.is_empty() {
            return Err(LoggerError::InvalidLogLevel(directives));
        }
        EnvFilter::try_new(trimmed).map_err(|_| LoggerError::InvalidLogLevel(directives.clone()))?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn filter(&self) -> Result<EnvFilter, LoggerError> {
        EnvFilter::try_new(&self.0).map_err(|_| LoggerError::InvalidLogLevel(self.0.clone()))
    }
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_targeted_directives() {
        assert_eq!(LoggerLevel::new("debug").unwrap().as_str(), "debug");
        assert_eq!(
            LoggerLevel::new(" info,tether_core=trace ").unwrap().as_str(),
            "info,tether_core=trace"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(LoggerLevel::new("").is_err());
        assert!(LoggerLevel::new("tether_core=loud").is_err());
    }
}
