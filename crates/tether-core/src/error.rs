use std::error::Error as StdError;

use tether_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Failures of the coordination side channel.
///
/// None of these are fatal to a listener: the session logs them and carries on
/// without cross-instance coordination.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("coordination store unreachable: {0}")]
    Connect(String),

    #[error("subscribe to '{channel}' failed: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("publish to '{channel}' failed: {reason}")]
    Publish { channel: String, reason: String },

    #[error("unsubscribe from '{channel}' failed: {reason}")]
    Unsubscribe { channel: String, reason: String },
}

impl CoordinationError {
    /// Short label for the stage that failed, used as a metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            CoordinationError::Connect(_) => "connect",
            CoordinationError::Subscribe { .. } => "subscribe",
            CoordinationError::Publish { .. } => "publish",
            CoordinationError::Unsubscribe { .. } => "unsubscribe",
        }
    }
}

/// Error returned by a listener's run function.
///
/// `kind` is a stable, machine-readable tag (e.g. `gateway_connect_failed`)
/// that ends up in the failure response next to the human readable message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RunError {
    kind: &'static str,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl RunError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(kind: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    #[inline]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_keeps_source_message() {
        let io = std::io::Error::other("socket reset");
        let err = RunError::with_source("gateway_io", io);
        assert_eq!(err.kind(), "gateway_io");
        assert_eq!(err.to_string(), "socket reset");
        assert!(err.source().is_some());
    }

    #[test]
    fn coordination_stage_labels() {
        let err = CoordinationError::Publish {
            channel: "c".into(),
            reason: "down".into(),
        };
        assert_eq!(err.stage(), "publish");
        assert_eq!(CoordinationError::Connect("x".into()).stage(), "connect");
    }
}
