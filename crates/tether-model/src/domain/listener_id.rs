use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identity of one listener session.
///
/// Generated ids are `<unix-millis>-<16 hex chars>`: the time prefix keeps them
/// roughly sortable in logs, the random suffix keeps ids created within the same
/// millisecond apart. Uniqueness is probabilistic, not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{millis}-{}", &random[..16]))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ListenerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ListenerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for ListenerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_do_not_collide_in_a_burst() {
        let ids: HashSet<ListenerId> = (0..10_000).map(|_| ListenerId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn generated_id_has_time_and_random_parts() {
        let id = ListenerId::generate();
        let (time, random) = id.as_str().split_once('-').expect("separator");
        assert!(time.parse::<u128>().is_ok());
        assert_eq!(random.len(), 16);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ListenerId::from("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""abc-123""#);
        assert!(id == *"abc-123");
    }
}
