//! Axum HTTP + WebSocket server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::OrchestratorConfig;
use crate::dashboard::DashboardClient;
use crate::health::{self, HealthResponse};
use crate::session::registry::SessionRegistry;
use crate::session::supervisor::{run_call_session, SessionParams};
use crate::session::SessionServices;
use crate::store::ConfigStore;

/// Timeout for the shared tool/search HTTP client.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Orchestrator configuration.
    pub config: Arc<OrchestratorConfig>,
    /// Live session registry.
    pub registry: SessionRegistry,
    /// Collaborators handed to session pumps.
    pub services: SessionServices,
    /// Prometheus metrics handle for rendering.
    pub metrics_handle: Arc<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// Wire up process-wide state.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        store: ConfigStore,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build http client");
        let dashboard = DashboardClient::new(config.dashboard_url.clone());
        let services = SessionServices {
            store,
            dashboard,
            http,
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
        };
        Self {
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            services,
            metrics_handle: Arc::new(metrics_handle),
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes and middleware.
///
/// The permissive CORS layer exists for the `/terminate` beacon — the
/// closing client fires it cross-origin.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/terminate", post(terminate_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.registry.count().await;
    Json(health::health_check(state.start_time, sessions))
}

/// GET /metrics — Prometheus text format.
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

/// GET /ws — WebSocket upgrade into a call session.
async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_params = SessionParams {
        call_id: params.get("callId").cloned(),
        client: params.get("client").cloned(),
    };
    ws.on_upgrade(move |socket| run_call_session(socket, state, session_params))
}

/// POST /terminate?sessionId=… — beacon hang-up from a closing client.
///
/// 200 whether or not the session is still known (the tab is gone either
/// way); 400 only when the id is missing.
async fn terminate_handler(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let Some(session_id) = params.get("sessionId").filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId");
    };

    if let Some(session) = state.registry.get(session_id).await {
        info!(%session_id, "termination beacon received");
        // The user closed the tab: this ending is not graceful.
        session.mark_beacon();
        session.cancel();
    } else {
        warn!(%session_id, "termination beacon for unknown or finished session");
    }
    (StatusCode::OK, "OK")
}
