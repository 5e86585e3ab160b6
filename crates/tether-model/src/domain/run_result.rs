use serde::{Deserialize, Serialize};

use crate::DurationMs;

/// How a platform connection run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// The budget elapsed with the connection still healthy.
    Completed,
    /// The cancellation signal fired before the budget elapsed.
    Cancelled,
}

/// Terminal outcome of one platform connection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRunResult {
    pub status: RunStatus,
    /// Upstream session id, when the platform handed one out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub events_received: u64,
    pub events_forwarded: u64,
    pub forward_failures: u64,
    pub reconnects: u32,
    pub elapsed_ms: DurationMs,
}

impl GatewayRunResult {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            session_id: None,
            events_received: 0,
            events_forwarded: 0,
            forward_failures: 0,
            reconnects: 0,
            elapsed_ms: 0,
        }
    }
}
