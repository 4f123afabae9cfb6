//! Dashboard call-state sync.

use std::time::Duration;

use lyra_core::{CallSnapshot, SyncError};
use tracing::{debug, warn};

use crate::metrics::DASHBOARD_SYNC_FAILURES_TOTAL;

/// Request timeout for sync calls.
const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the dashboard's call upsert endpoint.
#[derive(Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a client for the given dashboard base URL.
    ///
    /// Called once at startup; client construction failure is unrecoverable.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SYNC_TIMEOUT)
            .build()
            .expect("failed to build dashboard http client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upsert one call snapshot.
    ///
    /// Failures are returned for observability but callers treat them as
    /// log-only; a sync failure never affects the session.
    pub async fn sync_call(&self, snapshot: &CallSnapshot) -> Result<(), SyncError> {
        let url = format!("{}/api/calls/sync", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| SyncError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SyncError::Status(resp.status().as_u16()));
        }
        debug!(call_id = %snapshot.call_id, status = ?snapshot.status, "call synced");
        Ok(())
    }

    /// Fire a sync and log the outcome. Used by checkpoint tasks and cleanup.
    pub async fn sync_and_log(&self, snapshot: &CallSnapshot) {
        if let Err(e) = self.sync_call(snapshot).await {
            metrics::counter!(DASHBOARD_SYNC_FAILURES_TOTAL).increment(1);
            warn!(call_id = %snapshot.call_id, error = %e, "dashboard sync failed");
        }
    }
}
