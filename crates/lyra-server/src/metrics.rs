//! Prometheus metrics recorder and metric name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos across modules.

/// Sessions accepted total (counter).
pub const SESSIONS_OPENED_TOTAL: &str = "sessions_opened_total";
/// Sessions currently live (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Sessions closed total (counter, labels: status).
pub const SESSIONS_CLOSED_TOTAL: &str = "sessions_closed_total";
/// Upstream dial failures total (counter).
pub const UPSTREAM_DIAL_FAILURES_TOTAL: &str = "upstream_dial_failures_total";
/// Completed turns total (counter).
pub const TURNS_TOTAL: &str = "turns_total";
/// Tool calls total (counter, labels: tool).
pub const TOOL_CALLS_TOTAL: &str = "tool_calls_total";
/// Wind-down alerts injected total (counter).
pub const WIND_DOWN_ALERTS_TOTAL: &str = "wind_down_alerts_total";
/// Dashboard sync failures total (counter).
pub const DASHBOARD_SYNC_FAILURES_TOTAL: &str = "dashboard_sync_failures_total";
