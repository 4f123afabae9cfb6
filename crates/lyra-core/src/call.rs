//! Call data model: transcript utterances, call status, and the snapshot
//! payload upserted to the dashboard.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ids::utterance_id;

/// Who produced an utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (streamed input transcription or typed text).
    User,
    /// The voice agent (model turn text or output transcription).
    Agent,
}

/// One role-tagged transcript entry.
///
/// Utterances are minted only at turn boundaries; streaming partials are
/// accumulated in per-turn scratch buffers first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Utterance {
    /// Short opaque id (8-char UUID prefix).
    pub id: String,
    /// Speaker role.
    pub role: Role,
    /// Full utterance text for the turn.
    pub text: String,
    /// RFC 3339 wall-clock timestamp at minting time.
    pub timestamp: String,
}

impl Utterance {
    /// Mint a new utterance stamped with the current wall-clock time.
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: utterance_id(),
            role,
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Lifecycle status of a call.
///
/// Transitions only `Active → Completed` (agent invoked the terminate tool)
/// or `Active → Interrupted` (any other ending); never back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    /// Session is live.
    #[default]
    Active,
    /// The agent ended the call gracefully.
    Completed,
    /// The call ended without a graceful close (hang-up, I/O error).
    Interrupted,
}

/// Deep-copied view of a call posted to the dashboard.
///
/// Taken under the session lock so the sync task sees a stable view; an
/// empty transcript serializes as `[]`, never `null`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    /// Stable call id (client-supplied `callId` or generated).
    pub call_id: String,
    /// Tenant key the session was configured for.
    pub client_name: String,
    /// Full transcript at snapshot time.
    pub new_transcript: Vec<Utterance>,
    /// Seconds elapsed since session start.
    pub duration_seconds: u64,
    /// Last observed prompt token count from upstream usage metadata.
    pub input_tokens: u64,
    /// Last observed candidates token count from upstream usage metadata.
    pub output_tokens: u64,
    /// Call status at snapshot time.
    pub status: CallStatus,
}
