use std::{future::Future, time::Duration};

use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info_span, warn};

/// Supervisor for work that must outlive the request that started it.
///
/// Tasks spawned here are detached from the response path: the caller gets its
/// response without waiting for them. The host is expected to call
/// [`shutdown`](Self::shutdown) before exiting so that in-flight tasks can
/// finish their cleanup.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` so that it keeps running after the current response is sent.
    pub fn spawn_after_response<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(fut.instrument(info_span!("background", task = name)));
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the tracker and wait for running tasks.
    ///
    /// Returns `false` if `grace` elapsed with tasks still running.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        debug!(pending, "waiting for background tasks");

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    grace_ms = grace.as_millis() as u64,
                    "background tasks did not finish within grace"
                );
                false
            }
        }
    }
}
