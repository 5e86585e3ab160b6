use tether_core::RunError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::protocol::close_codes;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid discord configuration: {0}")]
    Config(String),

    #[error("gateway connection failed: {0}")]
    Connect(#[source] Box<tungstenite::Error>),

    #[error("gateway socket error: {0}")]
    Socket(#[source] Box<tungstenite::Error>),

    #[error("gateway payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("gateway closed the connection with {code}: {reason}")]
    Rejected { code: u16, reason: String },

    #[error("event forward failed: {0}")]
    Forward(#[from] reqwest::Error),
}

impl GatewayError {
    /// Stable tag reported in the failure response.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "gateway_config_invalid",
            GatewayError::Connect(_) => "gateway_connect_failed",
            GatewayError::Socket(_) => "gateway_socket_error",
            GatewayError::Encode(_) => "gateway_encode_failed",
            GatewayError::Rejected { code, .. } if *code == close_codes::AUTHENTICATION_FAILED => {
                "gateway_auth_failed"
            }
            GatewayError::Rejected { .. } => "gateway_rejected",
            GatewayError::Forward(_) => "forward_failed",
        }
    }
}

impl From<GatewayError> for RunError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        RunError::with_source(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_has_its_own_kind() {
        let err = GatewayError::Rejected {
            code: 4004,
            reason: "Authentication failed.".into(),
        };
        assert_eq!(err.kind(), "gateway_auth_failed");

        let run: RunError = err.into();
        assert_eq!(run.kind(), "gateway_auth_failed");
        assert!(run.message().contains("4004"));
    }

    #[test]
    fn other_rejections_share_a_kind() {
        let err = GatewayError::Rejected {
            code: 4014,
            reason: "Disallowed intent(s).".into(),
        };
        assert_eq!(err.kind(), "gateway_rejected");
    }
}
