//! Orchestrator configuration.

use lyra_protocol::live::DEFAULT_UPSTREAM_URL;
use serde::{Deserialize, Serialize};

/// Default HTTP bind port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default dashboard base URL (serves both call sync and knowledge search).
pub const DEFAULT_DASHBOARD_URL: &str = "http://dashboard-server:8081";

/// Client name used when neither the environment nor the request names one.
pub const DEFAULT_CLIENT_NAME: &str = "aiVoice";

/// Configuration for the lyra orchestrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`PORT`, default 8080; 0 auto-assigns).
    pub port: u16,
    /// Postgres connection string (`DATABASE_URL`). Absence disables
    /// personalization and every config read falls back to defaults.
    pub database_url: Option<String>,
    /// Upstream API key (`GEMINI_API_KEY`). Sessions are rejected at accept
    /// when missing.
    pub gemini_api_key: Option<String>,
    /// Fixed tenant name (`INSTANCE_CLIENT_NAME`). When unset, the `client`
    /// query parameter is consulted, then the built-in default.
    pub instance_client_name: Option<String>,
    /// Dashboard base URL (`DASHBOARD_INTERNAL_URL`).
    pub dashboard_url: String,
    /// Upstream live-AI endpoint (`UPSTREAM_LIVE_URL`).
    pub upstream_url: String,
    /// Capacity of each per-session outbound queue.
    pub queue_capacity: usize,
    /// Downstream ping interval in seconds.
    pub ping_interval_secs: u64,
    /// Maximum time to wait for the client queue to drain before a graceful
    /// cancel, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            database_url: None,
            gemini_api_key: None,
            instance_client_name: None,
            dashboard_url: DEFAULT_DASHBOARD_URL.into(),
            upstream_url: DEFAULT_UPSTREAM_URL.into(),
            queue_capacity: 512,
            ping_interval_secs: 30,
            drain_timeout_secs: 5,
        }
    }
}

impl OrchestratorConfig {
    /// Build a configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            database_url: env_var("DATABASE_URL"),
            gemini_api_key: env_var("GEMINI_API_KEY"),
            instance_client_name: env_var("INSTANCE_CLIENT_NAME"),
            dashboard_url: env_var("DASHBOARD_INTERNAL_URL")
                .unwrap_or_else(|| DEFAULT_DASHBOARD_URL.into()),
            upstream_url: env_var("UPSTREAM_LIVE_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.into()),
            ..defaults
        }
    }

    /// Resolve the tenant name for a session: the configured instance name
    /// wins, then the client-supplied query parameter, then the default.
    #[must_use]
    pub fn resolve_client_name(&self, query_client: Option<&str>) -> String {
        self.instance_client_name
            .clone()
            .or_else(|| query_client.filter(|c| !c.is_empty()).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_CLIENT_NAME.into())
    }
}

/// Read a non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
