use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tether_core::{PersistentListener, PlatformConnector, SessionRegistry, instance_id, uptime_seconds};
use tether_model::{ListenerState, SessionInfo, parse_duration_hint};
use tracing::{debug, info};

use crate::{
    auth::authorize,
    config::{DeploymentConfig, GatewayEndpointConfig},
    error::ApiError,
};

struct Platform {
    connector: Arc<dyn PlatformConnector>,
    listener: Arc<PersistentListener>,
}

struct ApiState {
    endpoint: GatewayEndpointConfig,
    deployment: DeploymentConfig,
    registry: SessionRegistry,
    platforms: HashMap<&'static str, Platform>,
}

/// HTTP API builder.
pub struct GatewayApi {
    state: ApiState,
}

impl GatewayApi {
    /// `registry` backs `GET /api/listeners`; share it with the listeners.
    pub fn new(endpoint: GatewayEndpointConfig, registry: SessionRegistry) -> Self {
        Self {
            state: ApiState {
                endpoint,
                deployment: DeploymentConfig::default(),
                registry,
                platforms: HashMap::new(),
            },
        }
    }

    pub fn with_deployment(mut self, deployment: DeploymentConfig) -> Self {
        self.state.deployment = deployment;
        self
    }

    /// Serve `connector` under `/api/{platform}/gateway`, coordinated by `listener`.
    pub fn with_platform(
        mut self,
        connector: Arc<dyn PlatformConnector>,
        listener: Arc<PersistentListener>,
    ) -> Self {
        let name = connector.platform();
        self.state.platforms.insert(
            name,
            Platform {
                connector,
                listener,
            },
        );
        self
    }

    /// Build the axum router.
    ///
    /// Routes:
    /// - GET /api/{platform}/gateway - run one listener session
    /// - GET /api/listeners - list sessions (`?listener=`, `?state=`)
    /// - GET /healthz - liveness
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/{platform}/gateway", get(gateway_trigger))
            .route("/api/listeners", get(list_listeners))
            .route("/healthz", get(healthz))
            .with_state(Arc::new(self.state))
    }
}

#[derive(Debug, Deserialize)]
struct TriggerParams {
    /// Requested run budget in milliseconds; clamped to the listener maximum.
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    listener: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    instance_id: &'static str,
    uptime_seconds: u64,
    total: usize,
    sessions: Vec<SessionInfo>,
}

/// GET /api/{platform}/gateway
async fn gateway_trigger(
    State(state): State<Arc<ApiState>>,
    Path(platform): Path<String>,
    Query(params): Query<TriggerParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&headers, state.endpoint.cron_secret.as_deref())?;

    let entry = state
        .platforms
        .get(platform.as_str())
        .ok_or_else(|| ApiError::PlatformUnavailable(platform.clone()))?;

    let requested = parse_duration_hint(params.duration.as_deref());
    let forward_url = state.deployment.forwarding_url(entry.connector.platform());
    info!(%platform, ?requested, forwarding = forward_url.is_some(), "gateway trigger");

    let connector = Arc::clone(&entry.connector);
    let outcome = entry
        .listener
        .run(requested, move |ctx| async move {
            connector.open(ctx, forward_url).await
        })
        .await;

    let status =
        StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(outcome.body())).into_response())
}

/// GET /api/listeners
async fn list_listeners(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, ApiError> {
    authorize(&headers, state.endpoint.cron_secret.as_deref())?;

    if params.listener.as_deref().is_some_and(|l| l.trim().is_empty()) {
        return Err(ApiError::InvalidRequest("listener cannot be empty".into()));
    }
    let filter_state = params
        .state
        .as_deref()
        .map(str::parse::<ListenerState>)
        .transpose()
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let sessions = state
        .registry
        .list(params.listener.as_deref(), filter_state);
    debug!(count = sessions.len(), "listeners listed");

    Ok(Json(ListResponse {
        instance_id: instance_id(),
        uptime_seconds: uptime_seconds(),
        total: sessions.len(),
        sessions,
    }))
}

/// GET /healthz
async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use serde_json::Value;
    use tether_core::{RunContext, RunError};
    use tether_model::{GatewayRunResult, ListenerConfig, RunStatus};
    use tower::ServiceExt;

    use super::*;

    const SECRET: &str = "cron-secret";

    #[derive(Default)]
    struct StubConnector {
        calls: Mutex<Vec<(u64, Option<String>)>>,
        fail: bool,
    }

    impl StubConnector {
        fn last_call(&self) -> (u64, Option<String>) {
            self.calls.lock().unwrap().last().cloned().expect("connector was not called")
        }
    }

    #[async_trait]
    impl PlatformConnector for StubConnector {
        fn platform(&self) -> &'static str {
            "discord"
        }

        async fn open(
            &self,
            ctx: RunContext,
            forward_url: Option<String>,
        ) -> Result<GatewayRunResult, RunError> {
            self.calls
                .lock()
                .unwrap()
                .push((ctx.duration.as_millis() as u64, forward_url));
            if self.fail {
                return Err(RunError::new("gateway_connect_failed", "handshake refused"));
            }
            Ok(GatewayRunResult::new(RunStatus::Completed))
        }
    }

    struct Harness {
        app: Router,
        stub: Arc<StubConnector>,
    }

    fn harness(secret: Option<&str>, stub: StubConnector, deployment: DeploymentConfig) -> Harness {
        let registry = SessionRegistry::new();
        let listener = PersistentListener::new(ListenerConfig::new("discord-gateway"))
            .unwrap()
            .with_registry(registry.clone());
        let stub = Arc::new(stub);
        let app = GatewayApi::new(GatewayEndpointConfig::new(secret.map(String::from)), registry)
            .with_deployment(deployment)
            .with_platform(stub.clone(), Arc::new(listener))
            .router();
        Harness { app, stub }
    }

    fn default_harness() -> Harness {
        harness(Some(SECRET), StubConnector::default(), DeploymentConfig::default())
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        req.body(Body::empty()).unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_secret_configuration_is_500() {
        let h = harness(None, StubConnector::default(), DeploymentConfig::default());
        let resp = h
            .app
            .oneshot(get("/api/discord/gateway", Some("anything")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(resp).await.contains("CRON_SECRET not configured"));
        assert!(h.stub.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_or_missing_credentials_are_401() {
        let h = default_harness();

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/discord/gateway", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(resp).await, "Unauthorized");

        let resp = h.app.oneshot(get("/api/discord/gateway", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unconfigured_platform_is_404() {
        let h = default_harness();
        let resp = h
            .app
            .oneshot(get("/api/slack/gateway", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "slack adapter not configured");
    }

    #[tokio::test]
    async fn default_duration_is_used_without_hint() {
        let h = default_harness();
        let resp = h
            .app
            .oneshot(get("/api/discord/gateway", Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["state"], "completed");
        assert_eq!(body["durationMs"], 600_000);
        assert_eq!(body["result"]["status"], "completed");
        assert!(body["listenerId"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(h.stub.last_call(), (600_000, None));
    }

    #[tokio::test]
    async fn duration_hint_is_honoured_and_clamped() {
        let h = default_harness();

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/discord/gateway?duration=100000", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.stub.last_call().0, 100_000);

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/discord/gateway?duration=999999999", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.stub.last_call().0, 600_000);

        let resp = h
            .app
            .oneshot(get("/api/discord/gateway?duration=soon", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(h.stub.last_call().0, 600_000);
    }

    #[tokio::test]
    async fn forwarding_url_reaches_the_connector() {
        let h = harness(
            Some(SECRET),
            StubConnector::default(),
            DeploymentConfig::new(Some("https://bot.example.com".into()), Some("bypass".into())),
        );
        let resp = h
            .app
            .oneshot(get("/api/discord/gateway", Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            h.stub.last_call().1.as_deref(),
            Some("https://bot.example.com/api/webhooks/discord?x-vercel-protection-bypass=bypass")
        );
    }

    #[tokio::test]
    async fn run_failure_is_500_with_tagged_body() {
        let stub = StubConnector {
            fail: true,
            ..Default::default()
        };
        let h = harness(Some(SECRET), stub, DeploymentConfig::default());
        let resp = h
            .app
            .oneshot(get("/api/discord/gateway", Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "listener_failed");
        assert_eq!(body["kind"], "gateway_connect_failed");
        assert_eq!(body["message"], "handshake refused");
    }

    #[tokio::test]
    async fn listeners_endpoint_reports_sessions() {
        let h = default_harness();
        let resp = h
            .app
            .clone()
            .oneshot(get("/api/discord/gateway?duration=1000", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/listeners?state=completed", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["sessions"][0]["listener"], "discord-gateway");
        assert_eq!(body["sessions"][0]["durationMs"], 1000);
        assert!(body["instanceId"].is_string());

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/listeners?state=running", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["total"], 0);

        let resp = h
            .app
            .clone()
            .oneshot(get("/api/listeners?state=bogus", Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = h.app.oneshot(get("/api/listeners", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn healthz_needs_no_auth() {
        let h = default_harness();
        let resp = h.app.oneshot(get("/healthz", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok");
    }
}
