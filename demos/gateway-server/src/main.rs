use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use tracing::{info, warn};

use tether_api::{DeploymentConfig, GatewayApi, GatewayEndpointConfig};
use tether_core::{
    BackgroundTasks, CoordinationChannel, MemoryChannel, PersistentListener, SessionRegistry,
    init_uptime, instance_id,
};
use tether_discord::{DEFAULT_GATEWAY_URL, DiscordConfig, DiscordConnector};
use tether_model::{DEFAULT_DURATION_MS, DEFAULT_GRACE_MS, ListenerConfig, MAX_DURATION_MS};
use tether_observe::{LoggerConfig, LoggerFormat, LoggerLevel, init_logger};
use tether_prometheus::PrometheusMetrics;
use tether_redis::{RedisChannel, RedisConfig};

/// Cron-triggered Discord Gateway listener.
#[derive(Debug, Parser)]
#[command(name = "gateway-server", version)]
struct Args {
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    listen_addr: SocketAddr,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// text | json | journald
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: String,

    /// Bearer secret the scheduler must present.
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    cron_secret: Option<String>,

    /// Coordination store; process-local coordination when unset.
    #[arg(long, env = "REDIS_URL", hide_env_values = true)]
    redis_url: Option<String>,

    /// Discord bot token; the Discord trigger answers 404 when unset.
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    discord_bot_token: Option<String>,

    #[arg(long, env = "DISCORD_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    discord_gateway_url: String,

    #[arg(long, env = "DISCORD_INTENTS")]
    discord_intents: Option<u64>,

    /// Public base url used to build the event forwarding url.
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    #[arg(long, env = "DEPLOYMENT_BYPASS_SECRET", hide_env_values = true)]
    deployment_bypass_secret: Option<String>,

    #[arg(long, env = "LISTENER_NAME", default_value = "discord-gateway")]
    listener_name: String,

    #[arg(long, env = "LISTENER_DEFAULT_DURATION_MS", default_value_t = DEFAULT_DURATION_MS)]
    listener_default_duration_ms: u64,

    #[arg(long, env = "LISTENER_MAX_DURATION_MS", default_value_t = MAX_DURATION_MS)]
    listener_max_duration_ms: u64,

    #[arg(long, env = "LISTENER_GRACE_MS", default_value_t = DEFAULT_GRACE_MS)]
    listener_grace_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_uptime();

    // 1) Logger
    let cfg = LoggerConfig {
        format: args.log_format.parse::<LoggerFormat>()?,
        level: LoggerLevel::new(args.log_level.as_str())?,
        ..Default::default()
    };
    init_logger(&cfg)?;
    info!(instance = instance_id(), "logger initialized");

    // 2) Metrics
    let metrics = Arc::new(PrometheusMetrics::new()?);

    // 3) Coordination channel
    let channel: Arc<dyn CoordinationChannel> = match args.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisConfig::new(url);
            info!(url = %redis.redacted_url(), "using redis coordination");
            Arc::new(RedisChannel::open(&redis)?)
        }
        None => {
            warn!("REDIS_URL not set; coordination is process-local");
            Arc::new(MemoryChannel::new())
        }
    };

    // 4) Listener
    let tasks = BackgroundTasks::new();
    let registry = SessionRegistry::new();
    let listener_cfg = ListenerConfig::new(args.listener_name)
        .with_default_duration_ms(args.listener_default_duration_ms)
        .with_max_duration_ms(args.listener_max_duration_ms)
        .with_grace_ms(args.listener_grace_ms);
    let grace = Duration::from_millis(listener_cfg.grace_ms);
    let listener = PersistentListener::new(listener_cfg)?
        .with_channel(channel)
        .with_tasks(tasks.clone())
        .with_registry(registry.clone())
        .with_metrics(metrics.clone());

    // 5) HTTP API
    let mut api = GatewayApi::new(GatewayEndpointConfig::new(args.cron_secret), registry)
        .with_deployment(DeploymentConfig::new(
            args.public_url,
            args.deployment_bypass_secret,
        ));
    match args.discord_bot_token {
        Some(token) => {
            let mut discord = DiscordConfig::new(token).with_gateway_url(args.discord_gateway_url);
            if let Some(intents) = args.discord_intents {
                discord = discord.with_intents(intents);
            }
            let connector = DiscordConnector::new(discord)?;
            api = api.with_platform(Arc::new(connector), Arc::new(listener));
            info!("discord gateway registered");
        }
        None => warn!("DISCORD_BOT_TOKEN not set; discord trigger disabled"),
    }

    let app = api.router().merge(
        Router::new()
            .route("/metrics", get(serve_metrics))
            .with_state(metrics),
    );

    // 6) Serve
    let tcp = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    info!(addr = %args.listen_addr, "http api listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7) Let deferred coordination work finish
    info!(pending = tasks.len(), "draining background tasks");
    if !tasks.shutdown(grace).await {
        warn!("background tasks abandoned at shutdown");
    }
    info!("shutdown complete");
    Ok(())
}

async fn serve_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            warn!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
