use async_trait::async_trait;
use tether_core::{PlatformConnector, RunContext, RunError};
use tether_model::GatewayRunResult;
use tracing::{info, warn};

use crate::{config::DiscordConfig, error::GatewayError, forward::EventForwarder, gateway::GatewayClient};

/// [`PlatformConnector`] for the Discord Gateway.
#[derive(Debug, Clone)]
pub struct DiscordConnector {
    gateway: GatewayClient,
    http: reqwest::Client,
}

impl DiscordConnector {
    pub fn new(config: DiscordConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            gateway: GatewayClient::new(config)?,
            http: reqwest::Client::new(),
        })
    }

    /// Reuse an existing HTTP client for event forwarding.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &DiscordConfig {
        self.gateway.config()
    }
}

#[async_trait]
impl PlatformConnector for DiscordConnector {
    fn platform(&self) -> &'static str {
        "discord"
    }

    async fn open(
        &self,
        ctx: RunContext,
        forward_url: Option<String>,
    ) -> Result<GatewayRunResult, RunError> {
        let config = self.gateway.config();
        let forwarder = match forward_url {
            Some(url) => {
                info!(listener_id = %ctx.listener_id, %url, "forwarding gateway events");
                Some(EventForwarder::new(
                    self.http.clone(),
                    url,
                    config.bot_token.clone(),
                    config.forward_timeout(),
                ))
            }
            None => {
                warn!(listener_id = %ctx.listener_id, "no forwarding url; gateway events will not be delivered");
                None
            }
        };

        self.gateway
            .run(&ctx, forwarder)
            .await
            .map_err(RunError::from)
    }
}
