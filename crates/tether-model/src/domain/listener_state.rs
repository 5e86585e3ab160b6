use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Lifecycle of a single listener session.
///
/// `Starting -> Running -> {Completed | Cancelled | Failed}`; no state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerState {
    /// Budget computed, id generated, signal created.
    Starting,
    /// Run function is executing.
    Running,
    /// Run function returned without being cancelled.
    Completed,
    /// Run function returned after the cancellation signal fired.
    Cancelled,
    /// Run function returned an error.
    Failed,
}

impl ListenerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListenerState::Completed | ListenerState::Cancelled | ListenerState::Failed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: ListenerState) -> bool {
        use ListenerState::*;
        matches!(
            (self, next),
            (Starting, Running) | (Starting, Failed) | (Running, Completed | Cancelled | Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::Starting => "starting",
            ListenerState::Running => "running",
            ListenerState::Completed => "completed",
            ListenerState::Cancelled => "cancelled",
            ListenerState::Failed => "failed",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListenerState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starting" => Ok(ListenerState::Starting),
            "running" => Ok(ListenerState::Running),
            "completed" => Ok(ListenerState::Completed),
            "cancelled" | "canceled" => Ok(ListenerState::Cancelled),
            "failed" => Ok(ListenerState::Failed),
            _ => Err(ModelError::UnknownState(s.to_string())),
        }
    }
}
