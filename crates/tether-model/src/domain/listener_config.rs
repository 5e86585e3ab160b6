use serde::{Deserialize, Serialize};

use crate::{DurationMs, ModelError};

/// Run budget used when the trigger carries no duration hint (10 minutes).
pub const DEFAULT_DURATION_MS: DurationMs = 600_000;
/// Upper bound for any single run (10 minutes).
pub const MAX_DURATION_MS: DurationMs = 600_000;
/// Extra time the coordination subscription stays open past the run budget.
pub const DEFAULT_GRACE_MS: DurationMs = 5_000;

/// Static configuration for one named listener.
///
/// The `name` is both the listener's identity in logs and the namespace of its
/// coordination channel: every instance configured with the same name competes
/// for the same upstream connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    /// Listener identity and coordination namespace.
    pub name: String,
    /// Budget applied when the trigger does not ask for one.
    pub default_duration_ms: DurationMs,
    /// Hard ceiling for any computed budget.
    pub max_duration_ms: DurationMs,
    /// Extra time the coordination side channel waits past the budget.
    #[serde(default = "default_grace")]
    pub grace_ms: DurationMs,
}

fn default_grace() -> DurationMs {
    DEFAULT_GRACE_MS
}

impl ListenerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_duration_ms: DEFAULT_DURATION_MS,
            max_duration_ms: MAX_DURATION_MS,
            grace_ms: DEFAULT_GRACE_MS,
        }
    }

    pub fn with_default_duration_ms(mut self, ms: DurationMs) -> Self {
        self.default_duration_ms = ms;
        self
    }

    pub fn with_max_duration_ms(mut self, ms: DurationMs) -> Self {
        self.max_duration_ms = ms;
        self
    }

    pub fn with_grace_ms(mut self, ms: DurationMs) -> Self {
        self.grace_ms = ms;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::InvalidConfig("name cannot be empty".into()));
        }
        if self.max_duration_ms < self.default_duration_ms {
            return Err(ModelError::InvalidConfig(format!(
                "max_duration_ms ({}) must be >= default_duration_ms ({})",
                self.max_duration_ms, self.default_duration_ms
            )));
        }
        Ok(())
    }

    /// Effective run budget for a request.
    ///
    /// Always `min(requested.unwrap_or(default), max)`.
    #[inline]
    pub fn effective_duration_ms(&self, requested: Option<DurationMs>) -> DurationMs {
        requested
            .unwrap_or(self.default_duration_ms)
            .min(self.max_duration_ms)
    }

    /// Name of the pub/sub channel used to announce new sessions.
    pub fn channel_name(&self) -> String {
        format!("tether:listener:{}:control", self.name)
    }
}

/// Parse the `duration` hint carried by a trigger.
///
/// Anything that is not a non-negative integer is treated as "no hint".
pub fn parse_duration_hint(raw: Option<&str>) -> Option<DurationMs> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<DurationMs>().ok())
}
