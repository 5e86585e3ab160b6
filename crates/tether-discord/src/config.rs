use std::{fmt, time::Duration};

use crate::{error::GatewayError, protocol::intents};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

#[derive(Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    pub gateway_url: String,
    pub intents: u64,
    /// First reconnect delay; doubles per consecutive failure.
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    /// Consecutive failed connection attempts before the run gives up.
    pub max_connect_attempts: u32,
    /// Per-request timeout of a forwarded event.
    pub forward_timeout_ms: u64,
    /// How long in-flight forwards may take after the connection closes.
    pub forward_drain_ms: u64,
}

impl DiscordConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            ..Default::default()
        }
    }

    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.bot_token.trim().is_empty() {
            return Err(GatewayError::Config("bot token is empty".into()));
        }
        if !(self.gateway_url.starts_with("wss://") || self.gateway_url.starts_with("ws://")) {
            return Err(GatewayError::Config(format!(
                "gateway url must be a websocket url: {}",
                self.gateway_url
            )));
        }
        if self.max_connect_attempts == 0 {
            return Err(GatewayError::Config(
                "max_connect_attempts must be at least 1".into(),
            ));
        }
        if self.reconnect_delay_ms > self.max_reconnect_delay_ms {
            return Err(GatewayError::Config(
                "reconnect_delay_ms exceeds max_reconnect_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Backoff before the attempt following `failures` consecutive failures.
    pub fn reconnect_delay(&self, failures: u32) -> Duration {
        let factor = 1u64 << failures.min(16);
        let ms = self
            .reconnect_delay_ms
            .saturating_mul(factor)
            .min(self.max_reconnect_delay_ms);
        Duration::from_millis(ms)
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    pub fn forward_drain(&self) -> Duration {
        Duration::from_millis(self.forward_drain_ms)
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            intents: intents::DEFAULT,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 15_000,
            max_connect_attempts: 3,
            forward_timeout_ms: 10_000,
            forward_drain_ms: 2_000,
        }
    }
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("bot_token", &"<redacted>")
            .field("gateway_url", &self.gateway_url)
            .field("intents", &self.intents)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("max_reconnect_delay_ms", &self.max_reconnect_delay_ms)
            .field("max_connect_attempts", &self.max_connect_attempts)
            .field("forward_timeout_ms", &self.forward_timeout_ms)
            .field("forward_drain_ms", &self.forward_drain_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_discord() {
        let cfg = DiscordConfig::new("token");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gateway_url, DEFAULT_GATEWAY_URL);
        assert_eq!(cfg.intents, intents::DEFAULT);
    }

    #[test]
    fn rejects_empty_token_and_http_urls() {
        assert!(DiscordConfig::default().validate().is_err());
        let cfg = DiscordConfig::new("t").with_gateway_url("https://gateway.discord.gg");
        assert!(matches!(cfg.validate(), Err(GatewayError::Config(_))));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = DiscordConfig::new("t");
        assert_eq!(cfg.reconnect_delay(0), Duration::from_secs(1));
        assert_eq!(cfg.reconnect_delay(2), Duration::from_secs(4));
        assert_eq!(cfg.reconnect_delay(10), Duration::from_secs(15));
        assert_eq!(cfg.reconnect_delay(u32::MAX), Duration::from_secs(15));
    }

    #[test]
    fn debug_hides_the_token() {
        let out = format!("{:?}", DiscordConfig::new("super-secret"));
        assert!(!out.contains("super-secret"));
    }
}
