use serde::{Deserialize, Serialize};

/// Query parameter that lets requests through a protected preview deployment.
pub const BYPASS_QUERY_PARAM: &str = "x-vercel-protection-bypass";

/// Trigger endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayEndpointConfig {
    /// Shared secret the scheduler presents as a bearer token.
    pub cron_secret: Option<String>,
}

impl GatewayEndpointConfig {
    pub fn new(cron_secret: Option<String>) -> Self {
        Self {
            cron_secret: cron_secret.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Where forwarded events are delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Public base url of this deployment, e.g. `https://bot.example.com`.
    pub public_url: Option<String>,
    /// Bypass token for protected preview deployments.
    pub bypass_secret: Option<String>,
}

impl DeploymentConfig {
    pub fn new(public_url: Option<String>, bypass_secret: Option<String>) -> Self {
        Self {
            public_url: public_url.filter(|s| !s.trim().is_empty()),
            bypass_secret: bypass_secret.filter(|s| !s.trim().is_empty()),
        }
    }

    /// Webhook url for `platform` on this deployment, `None` when the
    /// deployment url is unknown.
    pub fn forwarding_url(&self, platform: &str) -> Option<String> {
        let base = self.public_url.as_deref()?.trim().trim_end_matches('/');
        let base = if base.contains("://") {
            base.to_string()
        } else {
            format!("https://{base}")
        };

        let mut url = format!("{base}/api/webhooks/{platform}");
        if let Some(secret) = &self.bypass_secret {
            url.push('?');
            url.push_str(BYPASS_QUERY_PARAM);
            url.push('=');
            url.push_str(&urlencoding::encode(secret));
        }
        Some(url)
    }
}
