//! Upstream message processing.
//!
//! Every upstream frame is forwarded to the client as raw bytes *before*
//! local parsing so the client sees upstream arrival order untouched. The
//! parsed copy then drives tool execution, transcript assembly, the
//! duration policy, dashboard checkpoints, and the deferred-termination
//! handshake.

use std::sync::Arc;
use std::time::Duration;

use lyra_core::SessionError;
use lyra_protocol::envelope::OrchestratorFrame;
use lyra_protocol::live::{LiveClientMessage, LiveServerMessage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::call::{CallSession, TurnEffects, WAKE_UP_TEXT};
use super::SessionServices;
use crate::metrics::{TURNS_TOTAL, WIND_DOWN_ALERTS_TOTAL};
use crate::tools::dispatch_function_call;

/// Poll cadence while waiting for the client queue to drain.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// Margin after the queue empties, covering the socket write in flight.
const FLUSH_MARGIN: Duration = Duration::from_millis(200);

/// Process one upstream text frame.
pub async fn handle_upstream_frame(
    session: &Arc<CallSession>,
    services: &SessionServices,
    text: String,
) -> Result<(), SessionError> {
    // Raw forward first: arrival order to the client is sacrosanct.
    session.send_client(text.clone()).await?;

    let message = match serde_json::from_str::<LiveServerMessage>(&text) {
        Ok(message) => message,
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "unparseable upstream frame forwarded as-is");
            return Ok(());
        }
    };

    if message.setup_complete.is_some() {
        info!(session_id = %session.id, "upstream setup complete, sending silent wake-up");
        let wake = LiveClientMessage::user_text(WAKE_UP_TEXT, true);
        session.send_upstream(serde_json::to_string(&wake)?).await?;
    }

    if let Some(tool_call) = message.tool_call {
        for call in tool_call.function_calls {
            let session = Arc::clone(session);
            let http = services.http.clone();
            let search_base = services.dashboard.base_url().to_string();
            tokio::spawn(dispatch_function_call(session, http, search_base, call));
        }
    }

    if let Some(content) = message.server_content {
        let effects = session.ingest_server_content(&content);
        apply_turn_effects(session, services, effects).await?;
    }

    if let Some(usage) = message.usage_metadata {
        session.record_usage(&usage);
    }

    Ok(())
}

/// Perform the sends a transcript mutation asked for.
async fn apply_turn_effects(
    session: &Arc<CallSession>,
    services: &SessionServices,
    effects: TurnEffects,
) -> Result<(), SessionError> {
    if let Some(instruction) = effects.alert_instruction {
        metrics::counter!(WIND_DOWN_ALERTS_TOTAL).increment(1);
        info!(
            session_id = %session.id,
            elapsed_secs = session.elapsed_secs(),
            "injecting wind-down alert"
        );
        let alert = LiveClientMessage::user_text(instruction, true);
        session.send_upstream(serde_json::to_string(&alert)?).await?;
    }

    if let Some(snapshot) = effects.checkpoint {
        metrics::counter!(TURNS_TOTAL).increment(1);
        let dashboard = services.dashboard.clone();
        tokio::spawn(async move {
            dashboard.sync_and_log(&snapshot).await;
        });
    }

    if effects.begin_termination {
        info!(session_id = %session.id, "final turn complete, notifying client and draining");
        let frame = serde_json::to_string(&OrchestratorFrame::SessionTerminated)?;
        session.send_client(frame).await?;
        tokio::spawn(drain_then_cancel(Arc::clone(session), services.drain_timeout));
    }

    Ok(())
}

/// Wait for the client queue to drain (bounded), leave a network flush
/// margin, then cancel the session scope. Cancelling earlier would cut the
/// agent's final audio off mid-frame.
pub async fn drain_then_cancel(session: Arc<CallSession>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    let mut poll = tokio::time::interval(DRAIN_POLL);
    loop {
        let _ = poll.tick().await;
        if session.client_queue_empty() {
            tokio::time::sleep(FLUSH_MARGIN).await;
            session.cancel();
            return;
        }
        if Instant::now() >= deadline {
            debug!(session_id = %session.id, "drain timed out, cancelling anyway");
            session.cancel();
            return;
        }
    }
}
