use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde::{Deserialize, Serialize};
use tether_core::RunContext;
use tether_model::{GatewayRunResult, RunStatus};
use tokio::{
    net::TcpStream,
    time::{Duration, Instant, Interval, MissedTickBehavior, sleep, sleep_until},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, protocol::CloseFrame},
};
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    config::DiscordConfig,
    error::GatewayError,
    forward::EventForwarder,
    protocol::{self, GatewayPayload, Hello, Ready, op},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How one connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Cancelled,
    Deadline,
    Reconnect(&'static str),
}

/// State that survives reconnects within one run.
struct RunState {
    seq: Option<u64>,
    result: GatewayRunResult,
    forwarder: Option<EventForwarder>,
}

/// State of a single WebSocket connection.
struct Link {
    sink: WsSink,
    heartbeat: Option<Interval>,
    acked: bool,
}

impl Link {
    async fn send<T: Serialize>(&mut self, payload: &T) -> Result<(), GatewayError> {
        let text = serde_json::to_string(payload)?;
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::Socket(Box::new(e)))
    }

    async fn close(mut self) {
        if let Err(e) = self.sink.send(Message::Close(None::<CloseFrame>)).await {
            trace!(error = %e, "close frame not sent");
        }
        let _ = self.sink.close().await;
    }
}

/// Drives the Discord Gateway for one run.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: DiscordConfig,
}

impl GatewayClient {
    pub fn new(config: DiscordConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    /// Keep a gateway connection open until `ctx.signal` fires or
    /// `ctx.duration` elapses, reconnecting as needed in between.
    #[instrument(level = "debug", skip_all, fields(listener_id = %ctx.listener_id))]
    pub async fn run(
        &self,
        ctx: &RunContext,
        forwarder: Option<EventForwarder>,
    ) -> Result<GatewayRunResult, GatewayError> {
        let started = Instant::now();
        let deadline = started + ctx.duration;
        let mut state = RunState {
            seq: None,
            result: GatewayRunResult::new(RunStatus::Completed),
            forwarder,
        };
        let mut failures = 0u32;
        let mut attempts = 0u32;

        let outcome = loop {
            if ctx.signal.is_cancelled() {
                break Ok(RunStatus::Cancelled);
            }
            if Instant::now() >= deadline {
                break Ok(RunStatus::Completed);
            }
            if attempts > 0 {
                state.result.reconnects += 1;
            }
            attempts += 1;

            let end = match self.connect(ctx, deadline).await {
                Ok(Some(ws)) => {
                    failures = 0;
                    self.drive(ws, ctx, deadline, &mut state).await
                }
                Ok(None) => continue,
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.max_connect_attempts {
                        break Err(e);
                    }
                    warn!(error = %e, failures, "gateway connect failed; retrying");
                    Ok(ConnectionEnd::Reconnect("connect failed"))
                }
            };

            match end {
                Ok(ConnectionEnd::Cancelled) => break Ok(RunStatus::Cancelled),
                Ok(ConnectionEnd::Deadline) => break Ok(RunStatus::Completed),
                Ok(ConnectionEnd::Reconnect(reason)) => {
                    let delay = self.config.reconnect_delay(failures);
                    info!(reason, delay_ms = delay.as_millis() as u64, "reconnecting to gateway");
                    tokio::select! {
                        _ = ctx.signal.cancelled() => {}
                        _ = sleep_until(deadline) => {}
                        _ = sleep(delay) => {}
                    }
                }
                Err(e) => break Err(e),
            }
        };

        if let Some(forwarder) = state.forwarder.take() {
            let stats = forwarder.drain(self.config.forward_drain()).await;
            state.result.events_forwarded = stats.forwarded;
            state.result.forward_failures = stats.failed + stats.abandoned;
        }
        state.result.elapsed_ms = started.elapsed().as_millis() as u64;

        let status = outcome?;
        state.result.status = status;
        debug!(
            ?status,
            events = state.result.events_received,
            reconnects = state.result.reconnects,
            "gateway run finished"
        );
        Ok(state.result)
    }

    /// Open the socket. `None` when the run ended before the handshake did.
    async fn connect(
        &self,
        ctx: &RunContext,
        deadline: Instant,
    ) -> Result<Option<WsStream>, GatewayError> {
        tokio::select! {
            _ = ctx.signal.cancelled() => Ok(None),
            _ = sleep_until(deadline) => Ok(None),
            res = connect_async(self.config.gateway_url.as_str()) => {
                let (ws, _) = res.map_err(|e| GatewayError::Connect(Box::new(e)))?;
                debug!(url = %self.config.gateway_url, "gateway connected");
                Ok(Some(ws))
            }
        }
    }

    async fn drive(
        &self,
        ws: WsStream,
        ctx: &RunContext,
        deadline: Instant,
        state: &mut RunState,
    ) -> Result<ConnectionEnd, GatewayError> {
        let (sink, mut stream) = ws.split();
        let mut link = Link {
            sink,
            heartbeat: None,
            acked: true,
        };

        let end = loop {
            tokio::select! {
                _ = ctx.signal.cancelled() => break ConnectionEnd::Cancelled,
                _ = sleep_until(deadline) => break ConnectionEnd::Deadline,
                _ = next_beat(&mut link.heartbeat) => {
                    if !link.acked {
                        warn!("heartbeat not acknowledged; connection is zombied");
                        break ConnectionEnd::Reconnect("heartbeat not acknowledged");
                    }
                    if let Err(e) = link.send(&protocol::heartbeat(state.seq)).await {
                        debug!(error = %e, "heartbeat send failed");
                        break ConnectionEnd::Reconnect("send failed");
                    }
                    link.acked = false;
                }
                frame = next_frame(&mut stream) => match frame {
                    Frame::Payload(payload) => {
                        if let Some(end) = self.on_payload(payload, &mut link, state).await {
                            break end;
                        }
                    }
                    Frame::Closed(Some((code, reason))) if protocol::is_fatal_close(code) => {
                        return Err(GatewayError::Rejected { code, reason });
                    }
                    Frame::Closed(close) => {
                        debug!(?close, "gateway closed the connection");
                        break ConnectionEnd::Reconnect("connection closed");
                    }
                    Frame::Error(e) => {
                        debug!(error = %e, "gateway read failed");
                        break ConnectionEnd::Reconnect("read failed");
                    }
                },
            }
        };

        if matches!(end, ConnectionEnd::Cancelled | ConnectionEnd::Deadline) {
            link.close().await;
        }
        Ok(end)
    }

    /// Handle one decoded payload; `Some` ends the connection.
    async fn on_payload(
        &self,
        payload: GatewayPayload,
        link: &mut Link,
        state: &mut RunState,
    ) -> Option<ConnectionEnd> {
        if let Some(seq) = payload.s {
            state.seq = Some(seq);
        }

        match payload.op {
            op::DISPATCH => {
                let event = payload.t.unwrap_or_default();
                state.result.events_received += 1;
                if event == "READY" {
                    match Ready::deserialize(&payload.d) {
                        Ok(ready) => {
                            info!(session_id = %ready.session_id, "gateway session ready");
                            state.result.session_id = Some(ready.session_id);
                        }
                        Err(e) => warn!(error = %e, "READY without session id"),
                    }
                }
                trace!(%event, seq = ?state.seq, "dispatch");
                if let Some(forwarder) = state.forwarder.as_mut() {
                    forwarder.forward(&event, payload.d);
                }
                None
            }
            op::HELLO => {
                let hello = match Hello::deserialize(&payload.d) {
                    Ok(hello) => hello,
                    Err(e) => {
                        warn!(error = %e, "malformed hello");
                        return Some(ConnectionEnd::Reconnect("malformed hello"));
                    }
                };
                let period = Duration::from_millis(hello.heartbeat_interval.max(1));
                let mut beat = tokio::time::interval_at(Instant::now() + period / 2, period);
                beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                link.heartbeat = Some(beat);
                link.acked = true;

                let identify = protocol::identify(&self.config.bot_token, self.config.intents);
                if let Err(e) = link.send(&identify).await {
                    debug!(error = %e, "identify send failed");
                    return Some(ConnectionEnd::Reconnect("send failed"));
                }
                debug!(heartbeat_ms = hello.heartbeat_interval, "identified");
                None
            }
            op::HEARTBEAT => {
                if let Err(e) = link.send(&protocol::heartbeat(state.seq)).await {
                    debug!(error = %e, "heartbeat send failed");
                    return Some(ConnectionEnd::Reconnect("send failed"));
                }
                None
            }
            op::HEARTBEAT_ACK => {
                link.acked = true;
                None
            }
            op::RECONNECT => Some(ConnectionEnd::Reconnect("server requested reconnect")),
            op::INVALID_SESSION => Some(ConnectionEnd::Reconnect("invalid session")),
            other => {
                trace!(op = other, "unhandled opcode");
                None
            }
        }
    }
}

enum Frame {
    Payload(GatewayPayload),
    Closed(Option<(u16, String)>),
    Error(GatewayError),
}

/// Next meaningful frame; skips pings and undecodable text.
async fn next_frame(stream: &mut WsSource) -> Frame {
    loop {
        match stream.next().await {
            None => return Frame::Closed(None),
            Some(Err(e)) => return Frame::Error(GatewayError::Socket(Box::new(e))),
            Some(Ok(Message::Text(text))) => match serde_json::from_str(text.as_str()) {
                Ok(payload) => return Frame::Payload(payload),
                Err(e) => warn!(error = %e, "undecodable gateway payload skipped"),
            },
            Some(Ok(Message::Close(frame))) => {
                return Frame::Closed(frame.map(|f| (u16::from(f.code), f.reason.as_str().to_string())));
            }
            Some(Ok(_)) => {}
        }
    }
}

async fn next_beat(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(beat) => {
            beat.tick().await;
        }
        None => std::future::pending().await,
    }
}
