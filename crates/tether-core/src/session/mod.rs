//! A single invocation's listener session and its coordination side channel.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use tether_model::{DurationMs, ListenerConfig, ListenerId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    connector::RunContext, coordination::CoordinationChannel, metrics::MetricsHandle,
    signal::CancellationSignal,
};

/// Why the coordination side channel stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideChannelExit {
    /// Another session announced itself; our signal was fired.
    Evicted,
    /// Our signal was fired by someone else.
    Cancelled,
    /// The run function returned.
    RunFinished,
    /// `duration + grace` elapsed.
    Deadline,
    /// The backend closed the subscription.
    SubscriptionClosed,
    /// Subscribing failed; the session ran uncoordinated.
    Unavailable,
}

/// State owned by one invocation from start to response.
pub struct ListenerSession {
    id: ListenerId,
    listener: String,
    channel_name: String,
    duration: Duration,
    grace: Duration,
    signal: CancellationSignal,
    finished: CancellationToken,
    started: Instant,
    started_at: SystemTime,
}

impl ListenerSession {
    /// Begin a session: clamp the budget, mint an id and a fresh signal.
    pub fn start(config: &ListenerConfig, requested_ms: Option<DurationMs>) -> Self {
        let duration_ms = config.effective_duration_ms(requested_ms);
        Self {
            id: ListenerId::generate(),
            listener: config.name.clone(),
            channel_name: config.channel_name(),
            duration: Duration::from_millis(duration_ms),
            grace: Duration::from_millis(config.grace_ms),
            signal: CancellationSignal::new(),
            finished: CancellationToken::new(),
            started: Instant::now(),
            started_at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> &ListenerId {
        &self.id
    }

    #[inline]
    pub fn listener(&self) -> &str {
        &self.listener
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    pub fn duration_ms(&self) -> DurationMs {
        self.duration.as_millis() as DurationMs
    }

    #[inline]
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    #[inline]
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn run_context(&self) -> RunContext {
        RunContext {
            listener_id: self.id.clone(),
            duration: self.duration,
            signal: self.signal.clone(),
        }
    }

    /// Tell the side channel the run function has returned.
    pub fn finish(&self) {
        self.finished.cancel();
    }

    /// Build the coordination side channel for this session.
    ///
    /// The returned future owns everything it needs and is meant to be spawned:
    /// 1. subscribe to the listener's channel,
    /// 2. publish our own id (only once the subscription is live),
    /// 3. fire our signal on any announcement that is not our own,
    /// 4. stop on cancellation, run completion or `duration + grace`,
    /// 5. unsubscribe, swallowing cleanup errors.
    pub fn side_channel(
        &self,
        channel: Arc<dyn CoordinationChannel>,
        metrics: MetricsHandle,
    ) -> impl Future<Output = SideChannelExit> + Send + use<> {
        let id = self.id.clone();
        let listener = self.listener.clone();
        let name = self.channel_name.clone();
        let window = self.duration + self.grace;
        let signal = self.signal.clone();
        let finished = self.finished.clone();

        async move {
            let mut sub = match channel.subscribe(&name).await {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(%listener, listener_id = %id, backend = channel.backend(), error = %e, "coordination unavailable; running uncoordinated");
                    metrics.coordination_failed(&listener, e.stage());
                    return SideChannelExit::Unavailable;
                }
            };
            trace!(%listener, channel = %name, "subscribed");

            if let Err(e) = channel.publish(&name, id.as_str()).await {
                warn!(%listener, listener_id = %id, error = %e, "announcement failed; older sessions will not yield");
                metrics.coordination_failed(&listener, e.stage());
            } else {
                debug!(%listener, listener_id = %id, "announced");
            }

            let deadline = tokio::time::sleep(window);
            tokio::pin!(deadline);

            let exit = loop {
                tokio::select! {
                    _ = signal.cancelled() => break SideChannelExit::Cancelled,
                    _ = finished.cancelled() => break SideChannelExit::RunFinished,
                    _ = &mut deadline => break SideChannelExit::Deadline,
                    msg = sub.next_message() => match msg {
                        Some(other) if other != id.as_str() => {
                            if signal.fire() {
                                info!(%listener, listener_id = %id, newer = %other, "newer listener announced; yielding");
                                metrics.eviction_signalled(&listener);
                            }
                            break SideChannelExit::Evicted;
                        }
                        Some(_) => trace!(%listener, "own announcement echoed"),
                        None => break SideChannelExit::SubscriptionClosed,
                    },
                }
            };

            if let Err(e) = sub.unsubscribe().await {
                debug!(%listener, error = %e, "unsubscribe failed during cleanup");
            }
            debug!(%listener, listener_id = %id, ?exit, "side channel closed");
            exit
        }
    }
}
