use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::error::GatewayError;

/// Header carrying the bot token on forwarded events, so the webhook route
/// can tell gateway deliveries from Discord's own interaction webhooks.
pub const GATEWAY_TOKEN_HEADER: &str = "x-discord-gateway-token";

/// Body of a forwarded gateway event.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardedEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: u64,
    pub data: Value,
}

impl ForwardedEvent {
    pub fn new(event: &str, data: Value) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            kind: format!("GATEWAY_{event}"),
            timestamp,
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub forwarded: u64,
    pub failed: u64,
    /// Forwards still running when the drain timeout hit.
    pub abandoned: u64,
}

/// Re-delivers gateway events to the webhook route as concurrent POSTs.
pub struct EventForwarder {
    client: reqwest::Client,
    url: String,
    token: String,
    timeout: Duration,
    inflight: JoinSet<Result<(), GatewayError>>,
    stats: ForwardStats,
}

impl EventForwarder {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            token: token.into(),
            timeout,
            inflight: JoinSet::new(),
            stats: ForwardStats::default(),
        }
    }

    /// Start forwarding `event`; does not wait for the request.
    pub fn forward(&mut self, event: &str, data: Value) {
        self.reap();

        let request = self
            .client
            .post(&self.url)
            .header(GATEWAY_TOKEN_HEADER, &self.token)
            .timeout(self.timeout)
            .json(&ForwardedEvent::new(event, data));
        let event = event.to_string();

        self.inflight.spawn(async move {
            request.send().await?.error_for_status()?;
            trace!(%event, "event forwarded");
            Ok(())
        });
    }

    /// Wait up to `timeout` for in-flight forwards and return the totals.
    pub async fn drain(mut self, timeout: Duration) -> ForwardStats {
        let pending = self.inflight.len();
        if pending > 0 {
            debug!(pending, "draining event forwards");
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                joined = self.inflight.join_next() => match joined {
                    Some(res) => self.record(res),
                    None => break,
                },
                _ = &mut deadline => {
                    self.stats.abandoned = self.inflight.len() as u64;
                    warn!(abandoned = self.stats.abandoned, "event forwards still running at drain timeout");
                    self.inflight.abort_all();
                    break;
                }
            }
        }
        self.stats
    }

    fn reap(&mut self) {
        while let Some(res) = self.inflight.try_join_next() {
            self.record(res);
        }
    }

    fn record(&mut self, res: Result<Result<(), GatewayError>, tokio::task::JoinError>) {
        match res {
            Ok(Ok(())) => self.stats.forwarded += 1,
            Ok(Err(e)) => {
                warn!(url = %self.url, error = %e, "event forward failed");
                self.stats.failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "event forward task aborted");
                self.stats.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;

    fn forwarder(server: &MockServer) -> EventForwarder {
        EventForwarder::new(
            reqwest::Client::new(),
            format!("{}/api/webhooks/discord", server.uri()),
            "bot-token",
            Duration::from_secs(2),
        )
    }

    #[test]
    fn event_type_is_prefixed() {
        let e = ForwardedEvent::new("MESSAGE_CREATE", json!({"id": "1"}));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "GATEWAY_MESSAGE_CREATE");
        assert_eq!(v["data"]["id"], "1");
        assert!(e.timestamp > 0);
    }

    #[tokio::test]
    async fn posts_events_with_gateway_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/webhooks/discord"))
            .and(header(GATEWAY_TOKEN_HEADER, "bot-token"))
            .and(body_partial_json(json!({"type": "GATEWAY_MESSAGE_CREATE"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let mut f = forwarder(&server);
        f.forward("MESSAGE_CREATE", json!({"content": "hi"}));
        f.forward("MESSAGE_CREATE", json!({"content": "again"}));

        let stats = f.drain(Duration::from_secs(5)).await;
        assert_eq!(stats.forwarded, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn server_errors_count_as_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut f = forwarder(&server);
        f.forward("READY", json!({}));

        let stats = f.drain(Duration::from_secs(5)).await;
        assert_eq!(stats.forwarded, 0);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn slow_forwards_are_abandoned_at_drain_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(1)))
            .mount(&server)
            .await;

        let mut f = forwarder(&server);
        f.forward("READY", json!({}));

        let stats = f.drain(Duration::from_millis(50)).await;
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.forwarded, 0);
    }
}
