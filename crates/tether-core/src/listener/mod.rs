//! Persistent listener coordinator.
//!
//! Keeps one logical long-lived upstream connection alive across a fleet of
//! short-lived invocations. Every invocation runs a [`ListenerSession`]: it
//! announces itself on the listener's coordination channel, and any older
//! session still subscribed yields by firing its own cancellation signal.
//! Newest announcement wins, so overlapping triggers never leave two
//! connections running for longer than it takes the announcement to arrive.

use std::{future::Future, sync::Arc};

use serde::Serialize;
use tether_model::{DurationMs, GatewayRunResult, ListenerConfig, ListenerId, ListenerState};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    connector::RunContext,
    coordination::CoordinationChannel,
    error::{CoreError, RunError},
    metrics::{MetricsHandle, NoopMetrics},
    session::ListenerSession,
    state::SessionRegistry,
    tasks::BackgroundTasks,
};

/// Stable tag of the failure response.
pub const FAILURE_TAG: &str = "listener_failed";

/// Registry error recorded when the caller stops awaiting a session mid-run.
pub const ABORTED: &str = "aborted before the run returned";

pub struct PersistentListener {
    config: ListenerConfig,
    channel: Option<Arc<dyn CoordinationChannel>>,
    tasks: BackgroundTasks,
    registry: SessionRegistry,
    metrics: MetricsHandle,
}

impl PersistentListener {
    /// Listener with no coordination channel; call [`with_channel`](Self::with_channel)
    /// to coordinate across instances.
    pub fn new(config: ListenerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            config,
            channel: None,
            tasks: BackgroundTasks::new(),
            registry: SessionRegistry::new(),
            metrics: Arc::new(NoopMetrics),
        })
    }

    pub fn with_channel(mut self, channel: Arc<dyn CoordinationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Share a background task supervisor with the host.
    pub fn with_tasks(mut self, tasks: BackgroundTasks) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[inline]
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Run one session.
    ///
    /// The coordination side channel is spawned on the background supervisor
    /// and never delays the returned outcome. The run function is handed the
    /// session's signal and must stop on its own once it fires; nothing here
    /// interrupts it.
    #[instrument(level = "debug", skip(self, run), fields(listener = %self.config.name))]
    pub async fn run<F, Fut>(&self, requested_ms: Option<DurationMs>, run: F) -> ListenerOutcome
    where
        F: FnOnce(RunContext) -> Fut,
        Fut: Future<Output = Result<GatewayRunResult, RunError>>,
    {
        let session = ListenerSession::start(&self.config, requested_ms);
        let listener = session.listener().to_string();
        let id = session.id().clone();

        self.registry.add(id.clone(), &listener, session.duration_ms());
        self.metrics.session_started(&listener);
        info!(listener_id = %id, duration_ms = session.duration_ms(), "listener starting");
        let mut guard = AbortGuard {
            session: &session,
            registry: &self.registry,
            metrics: &self.metrics,
            armed: true,
        };

        match &self.channel {
            Some(channel) => {
                let side = session.side_channel(Arc::clone(channel), Arc::clone(&self.metrics));
                self.tasks.spawn_after_response("coordination", async move {
                    side.await;
                });
            }
            None => debug!(listener_id = %id, "no coordination channel configured"),
        }

        self.registry.transition(&id, ListenerState::Running, None);
        let result = run(session.run_context()).await;
        guard.armed = false;
        session.finish();

        let (state, result, error) = match result {
            Ok(r) if session.signal().is_cancelled() => (ListenerState::Cancelled, Some(r), None),
            Ok(r) => (ListenerState::Completed, Some(r), None),
            Err(e) => (ListenerState::Failed, None, Some(e)),
        };

        let elapsed = session.elapsed();
        match &error {
            Some(e) => {
                error!(listener_id = %id, kind = e.kind(), error = %e, "listener failed")
            }
            None => info!(
                listener_id = %id,
                state = %state,
                elapsed_ms = elapsed.as_millis() as u64,
                "listener finished"
            ),
        }

        self.registry.transition(&id, state, error.as_ref().map(|e| e.to_string()));
        self.metrics.session_finished(&listener, state, elapsed);

        ListenerOutcome {
            listener,
            listener_id: id,
            duration_ms: session.duration_ms(),
            state,
            result,
            error,
        }
    }
}

/// Settles a session whose `run` future was dropped before the run returned.
struct AbortGuard<'a> {
    session: &'a ListenerSession,
    registry: &'a SessionRegistry,
    metrics: &'a MetricsHandle,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let id = self.session.id();
        let listener = self.session.listener();
        self.session.finish();
        self.registry.transition(id, ListenerState::Failed, Some(ABORTED.to_string()));
        self.metrics.session_finished(listener, ListenerState::Failed, self.session.elapsed());
        warn!(listener_id = %id, "listener aborted before the run returned");
    }
}

/// Terminal outcome of one session, ready to be turned into a response.
#[derive(Debug)]
pub struct ListenerOutcome {
    pub listener: String,
    pub listener_id: ListenerId,
    pub duration_ms: DurationMs,
    pub state: ListenerState,
    pub result: Option<GatewayRunResult>,
    pub error: Option<RunError>,
}

impl ListenerOutcome {
    /// 500 for failures, 200 otherwise (cancellation included).
    pub fn http_status(&self) -> u16 {
        match self.state {
            ListenerState::Failed => 500,
            _ => 200,
        }
    }

    pub fn body(&self) -> OutcomeBody {
        match &self.error {
            Some(e) => OutcomeBody::Failure {
                error: FAILURE_TAG,
                kind: e.kind(),
                message: e.message().to_string(),
                listener_id: self.listener_id.clone(),
            },
            None => OutcomeBody::Success {
                listener: self.listener.clone(),
                listener_id: self.listener_id.clone(),
                state: self.state,
                duration_ms: self.duration_ms,
                result: self.result.clone(),
            },
        }
    }
}

/// Serialized response body.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutcomeBody {
    #[serde(rename_all = "camelCase")]
    Success {
        listener: String,
        listener_id: ListenerId,
        state: ListenerState,
        duration_ms: DurationMs,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<GatewayRunResult>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        error: &'static str,
        kind: &'static str,
        message: String,
        listener_id: ListenerId,
    },
}
