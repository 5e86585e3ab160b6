use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use tether_model::{DurationMs, ListenerId, ListenerState, SessionInfo};
use tracing::trace;

const DEFAULT_HISTORY: usize = 64;

/// In-memory record of the sessions this process has run.
///
/// Active sessions are always kept; finished ones are retained up to
/// `history` entries, oldest evicted first.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    history: usize,
}

struct RegistryInner {
    sessions: HashMap<ListenerId, SessionInfo>,
    /// Finished sessions, oldest first.
    finished: VecDeque<ListenerId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                sessions: HashMap::new(),
                finished: VecDeque::new(),
            })),
            history,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new session in `Starting`.
    pub fn add(&self, id: ListenerId, listener: &str, duration_ms: DurationMs) {
        let now = SystemTime::now();
        let info = SessionInfo {
            listener_id: id.clone(),
            listener: listener.to_string(),
            state: ListenerState::Starting,
            duration_ms,
            started_at: now,
            updated_at: now,
            error: None,
        };
        self.write().sessions.insert(id, info);
    }

    /// Move a session to `next`.
    ///
    /// Returns `false` (and changes nothing) for unknown ids or illegal transitions.
    pub fn transition(&self, id: &ListenerId, next: ListenerState, error: Option<String>) -> bool {
        let mut inner = self.write();

        let Some(info) = inner.sessions.get_mut(id) else {
            return false;
        };
        if !info.state.can_transition_to(next) {
            trace!(listener_id = %id, from = %info.state, to = %next, "illegal transition ignored");
            return false;
        }

        info.state = next;
        info.updated_at = SystemTime::now();
        if error.is_some() {
            info.error = error;
        }

        if next.is_terminal() {
            inner.finished.push_back(id.clone());
            while inner.finished.len() > self.history {
                if let Some(old) = inner.finished.pop_front() {
                    inner.sessions.remove(&old);
                }
            }
        }
        true
    }

    pub fn get(&self, id: &ListenerId) -> Option<SessionInfo> {
        self.read().sessions.get(id).cloned()
    }

    /// Sessions matching the optional filters, newest first.
    pub fn list(&self, listener: Option<&str>, state: Option<ListenerState>) -> Vec<SessionInfo> {
        let inner = self.read();
        let mut out: Vec<SessionInfo> = inner
            .sessions
            .values()
            .filter(|s| listener.is_none_or(|l| s.listener == l))
            .filter(|s| state.is_none_or(|st| s.state == st))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        out
    }

    pub fn len(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ListenerId {
        ListenerId::from(s)
    }

    #[test]
    fn add_and_get_session() {
        let reg = SessionRegistry::new();
        reg.add(id("s-1"), "discord", 1_000);

        let info = reg.get(&id("s-1")).expect("session should exist");
        assert_eq!(info.listener, "discord");
        assert_eq!(info.state, ListenerState::Starting);
        assert_eq!(info.duration_ms, 1_000);
        assert!(info.error.is_none());
    }

    #[test]
    fn legal_transitions_are_applied() {
        let reg = SessionRegistry::new();
        reg.add(id("s-1"), "discord", 1_000);

        assert!(reg.transition(&id("s-1"), ListenerState::Running, None));
        assert!(reg.transition(
            &id("s-1"),
            ListenerState::Failed,
            Some("boom".to_string())
        ));

        let info = reg.get(&id("s-1")).unwrap();
        assert_eq!(info.state, ListenerState::Failed);
        assert_eq!(info.error.as_deref(), Some("boom"));
    }

    #[test]
    fn illegal_transitions_are_ignored() {
        let reg = SessionRegistry::new();
        reg.add(id("s-1"), "discord", 1_000);
        reg.transition(&id("s-1"), ListenerState::Running, None);
        reg.transition(&id("s-1"), ListenerState::Completed, None);

        assert!(!reg.transition(&id("s-1"), ListenerState::Running, None));
        assert_eq!(reg.get(&id("s-1")).unwrap().state, ListenerState::Completed);
    }

    #[test]
    fn unknown_session_transition_returns_false() {
        let reg = SessionRegistry::new();
        assert!(!reg.transition(&id("nope"), ListenerState::Running, None));
    }

    #[test]
    fn finished_history_is_bounded() {
        let reg = SessionRegistry::with_history(2);
        for n in 0..4 {
            let sid = id(&format!("s-{n}"));
            reg.add(sid.clone(), "discord", 1);
            reg.transition(&sid, ListenerState::Running, None);
            reg.transition(&sid, ListenerState::Completed, None);
        }
        reg.add(id("live"), "discord", 1);

        assert_eq!(reg.len(), 3);
        assert!(reg.get(&id("s-0")).is_none());
        assert!(reg.get(&id("s-1")).is_none());
        assert!(reg.get(&id("s-3")).is_some());
        assert!(reg.get(&id("live")).is_some());
    }

    #[test]
    fn list_filters_by_listener_and_state() {
        let reg = SessionRegistry::new();
        reg.add(id("a"), "discord", 1);
        reg.add(id("b"), "discord", 1);
        reg.add(id("c"), "other", 1);
        reg.transition(&id("a"), ListenerState::Running, None);

        assert_eq!(reg.list(None, None).len(), 3);
        assert_eq!(reg.list(Some("discord"), None).len(), 2);
        assert_eq!(reg.list(Some("discord"), Some(ListenerState::Running)).len(), 1);
        assert!(reg.list(Some("other"), Some(ListenerState::Running)).is_empty());
    }
}
