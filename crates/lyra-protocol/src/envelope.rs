//! Downstream client envelope and orchestrator-originated frames.

use serde::{Deserialize, Serialize};

/// Framed envelope sent by the downstream client.
///
/// The payload stays loose: each envelope kind has its own payload shape
/// and the dispatcher decodes it only when the kind is recognized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientEnvelope {
    /// Envelope discriminator. Both camelCase and snake_case conventions
    /// are accepted for the multi-word kinds.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Recognized envelope kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Session setup request; triggers the setup builder.
    Setup,
    /// Streamed audio chunk.
    RealtimeInput,
    /// Text turn content.
    ClientContent,
    /// Client-side tool response.
    ToolResponse,
    /// Anything else; passed through to upstream verbatim.
    Unknown,
}

impl ClientEnvelope {
    /// Classify the envelope by its `type` field.
    #[must_use]
    pub fn classify(&self) -> EnvelopeKind {
        match self.kind.as_str() {
            "setup" => EnvelopeKind::Setup,
            "realtimeInput" | "realtime_input" => EnvelopeKind::RealtimeInput,
            "clientContent" | "client_content" => EnvelopeKind::ClientContent,
            "toolResponse" | "tool_response" => EnvelopeKind::ToolResponse,
            _ => EnvelopeKind::Unknown,
        }
    }
}

/// Payload of a `realtimeInput` envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct RealtimeAudioPayload {
    /// The audio chunk.
    pub audio: AudioChunk,
}

/// One base64 audio chunk with its MIME type.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    /// Base64-encoded audio data.
    pub data: String,
    /// MIME type (e.g. `audio/pcm;rate=16000`).
    pub mime_type: String,
}

/// Frames the orchestrator itself sends to the downstream client, alongside
/// the verbatim upstream forwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorFrame {
    /// A link the agent asked to surface in the client UI.
    LinkBubble {
        /// Link payload.
        payload: LinkPayload,
    },
    /// The session ended gracefully; the client should close.
    SessionTerminated,
}

/// Payload of a `link_bubble` frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LinkPayload {
    /// The full URL.
    pub url: String,
    /// Friendly display text.
    pub alias: String,
}

impl OrchestratorFrame {
    /// Build a `link_bubble` frame.
    #[must_use]
    pub fn link_bubble(url: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::LinkBubble {
            payload: LinkPayload {
                url: url.into(),
                alias: alias.into(),
            },
        }
    }
}
