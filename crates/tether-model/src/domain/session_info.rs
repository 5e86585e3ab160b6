use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{DurationMs, ListenerId, ListenerState};

/// Snapshot of one listener session as tracked by the in-process registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub listener_id: ListenerId,
    /// Listener name the session belongs to.
    pub listener: String,
    pub state: ListenerState,
    pub duration_ms: DurationMs,
    /// Unix milliseconds.
    #[serde(with = "millis_serde")]
    pub started_at: SystemTime,
    /// Unix milliseconds of the last state change.
    #[serde(with = "millis_serde")]
    pub updated_at: SystemTime,
    /// Set when the session failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

mod millis_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        (since_epoch.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    #[test]
    fn timestamps_are_unix_millis() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let info = SessionInfo {
            listener_id: ListenerId::from("1-a"),
            listener: "discord-gateway".into(),
            state: ListenerState::Running,
            duration_ms: 1_000,
            started_at: at,
            updated_at: at,
            error: None,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["startedAt"], 1_700_000_000_123u64);
        assert_eq!(json["listenerId"], "1-a");
        assert!(json.get("error").is_none());

        let back: SessionInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back.started_at, at);
    }
}
