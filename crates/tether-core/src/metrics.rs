use std::{sync::Arc, time::Duration};

use tether_model::ListenerState;

/// Sink for listener lifecycle metrics.
///
/// Implementations must be cheap and non-blocking; they are called inline on
/// the session path.
pub trait MetricsBackend: Send + Sync + 'static {
    fn session_started(&self, listener: &str);
    fn session_finished(&self, listener: &str, state: ListenerState, elapsed: Duration);
    fn eviction_signalled(&self, listener: &str);
    fn coordination_failed(&self, listener: &str, stage: &'static str);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn session_started(&self, _listener: &str) {}
    fn session_finished(&self, _listener: &str, _state: ListenerState, _elapsed: Duration) {}
    fn eviction_signalled(&self, _listener: &str) {}
    fn coordination_failed(&self, _listener: &str, _stage: &'static str) {}
}
