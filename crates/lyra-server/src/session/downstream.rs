//! Downstream envelope dispatch.
//!
//! Translates the client's framed `{type, payload}` envelopes into upstream
//! union messages. Anything the dispatcher cannot classify, whether an
//! envelope that fails to decode or an unknown `type`, is forwarded to
//! upstream verbatim as an escape hatch.

use std::sync::Arc;

use lyra_core::SessionError;
use lyra_protocol::envelope::{ClientEnvelope, EnvelopeKind, RealtimeAudioPayload};
use lyra_protocol::live::{ClientContent, InlineData, LiveClientMessage, RealtimeInput, ToolResponse};
use tracing::{debug, info, warn};

use super::call::CallSession;
use super::SessionServices;
use crate::setup::build_setup;

/// Dispatch one downstream text frame.
pub async fn handle_client_frame(
    session: &Arc<CallSession>,
    services: &SessionServices,
    text: String,
) -> Result<(), SessionError> {
    let Ok(envelope) = serde_json::from_str::<ClientEnvelope>(&text) else {
        // Not our envelope: pass the raw frame through.
        return session.send_upstream(text).await;
    };

    match envelope.classify() {
        EnvelopeKind::Setup => {
            let (setup, cfg) = build_setup(&services.store, &session.client_name).await;
            session.apply_policy(&cfg);
            info!(
                session_id = %session.id,
                voice = %cfg.voice_name,
                alert_after_secs = cfg.termination_alert_time,
                "session setup built"
            );
            send_translated(session, &LiveClientMessage::setup(setup)).await
        }
        EnvelopeKind::RealtimeInput => {
            match serde_json::from_value::<RealtimeAudioPayload>(envelope.payload) {
                Ok(payload) => {
                    let message = LiveClientMessage {
                        realtime_input: Some(RealtimeInput {
                            media_chunks: vec![InlineData {
                                mime_type: payload.audio.mime_type,
                                data: payload.audio.data,
                            }],
                        }),
                        ..LiveClientMessage::default()
                    };
                    send_translated(session, &message).await
                }
                Err(e) => {
                    debug!(session_id = %session.id, error = %e, "malformed realtime payload dropped");
                    Ok(())
                }
            }
        }
        EnvelopeKind::ClientContent => {
            match serde_json::from_value::<ClientContent>(envelope.payload) {
                Ok(content) => {
                    session.accumulate_client_text(&content);
                    let message = LiveClientMessage {
                        client_content: Some(content),
                        ..LiveClientMessage::default()
                    };
                    send_translated(session, &message).await
                }
                Err(e) => {
                    debug!(session_id = %session.id, error = %e, "malformed client content dropped");
                    Ok(())
                }
            }
        }
        EnvelopeKind::ToolResponse => {
            match serde_json::from_value::<ToolResponse>(envelope.payload) {
                Ok(response) => {
                    let message = LiveClientMessage::tool_response(response);
                    send_translated(session, &message).await
                }
                Err(e) => {
                    debug!(session_id = %session.id, error = %e, "malformed tool response dropped");
                    Ok(())
                }
            }
        }
        EnvelopeKind::Unknown => {
            warn!(session_id = %session.id, kind = %envelope.kind, "unknown envelope type, passing through");
            session.send_upstream(text).await
        }
    }
}

async fn send_translated(
    session: &Arc<CallSession>,
    message: &LiveClientMessage,
) -> Result<(), SessionError> {
    session.send_upstream(serde_json::to_string(message)?).await
}
