use std::time::Duration;

use async_trait::async_trait;
use tether_model::{GatewayRunResult, ListenerId};

use crate::{error::RunError, signal::CancellationSignal};

/// Everything a run function needs from its session.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub listener_id: ListenerId,
    /// Effective run budget.
    pub duration: Duration,
    /// Fires when a newer session announces itself.
    pub signal: CancellationSignal,
}

/// A platform's long-lived event-stream connection.
///
/// Implementations keep the connection open for at most `ctx.duration` (plus a
/// small margin), stop promptly once `ctx.signal` fires, and re-deliver every
/// received event as an HTTP call to `forward_url` when one is given.
#[async_trait]
pub trait PlatformConnector: Send + Sync + 'static {
    /// Platform name, e.g. `"discord"`.
    fn platform(&self) -> &'static str;

    async fn open(
        &self,
        ctx: RunContext,
        forward_url: Option<String>,
    ) -> Result<GatewayRunResult, RunError>;
}
