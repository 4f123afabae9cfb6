//! Upstream live-AI protocol types.
//!
//! One union message per direction. Outbound branches are all optional and
//! omitted when absent so each frame carries exactly one of setup, content,
//! realtime audio, or a tool response. Inbound frames are decoded
//! tolerantly: unknown fields are ignored and every inspected field has a
//! default, because the raw bytes are forwarded to the client regardless of
//! whether local parsing succeeds.

use serde::{Deserialize, Serialize};

/// Model id sent in the setup payload.
pub const UPSTREAM_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// Default upstream endpoint (the API key is appended as a query parameter).
pub const DEFAULT_UPSTREAM_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

// ─────────────────────────────────────────────────────────────────────────────
// Outbound (orchestrator → upstream)
// ─────────────────────────────────────────────────────────────────────────────

/// Union message written to the upstream socket.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveClientMessage {
    /// Session setup (first message of a session).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<Setup>,
    /// Turn-based text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_content: Option<ClientContent>,
    /// Streamed realtime audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_input: Option<RealtimeInput>,
    /// Responses to upstream tool calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponse>,
}

impl LiveClientMessage {
    /// Wrap a setup payload.
    #[must_use]
    pub fn setup(setup: Setup) -> Self {
        Self {
            setup: Some(setup),
            ..Self::default()
        }
    }

    /// Build a single-turn user text message.
    #[must_use]
    pub fn user_text(text: impl Into<String>, turn_complete: bool) -> Self {
        Self {
            client_content: Some(ClientContent {
                turns: vec![Turn {
                    role: "user".into(),
                    parts: vec![Part::text(text)],
                }],
                turn_complete,
            }),
            ..Self::default()
        }
    }

    /// Wrap a tool response.
    #[must_use]
    pub fn tool_response(response: ToolResponse) -> Self {
        Self {
            tool_response: Some(response),
            ..Self::default()
        }
    }
}

/// Upstream session setup payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Model id.
    pub model: String,
    /// Generation parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    /// System prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    /// Tool declarations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Enables streaming input transcription (empty object when on).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<serde_json::Value>,
    /// Enables streaming output transcription (empty object when on).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<serde_json::Value>,
}

/// Generation parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Response modalities (the orchestrator always requests `AUDIO`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    /// Voice and language selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Thinking configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

/// Voice and language selection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    /// Voice selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<VoiceConfig>,
    /// BCP-47 language code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}

/// Voice selection wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    /// Prebuilt voice selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prebuilt_voice_config: Option<PrebuiltVoiceConfig>,
}

/// Prebuilt voice selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    /// Voice name (e.g. `Aoede`).
    pub voice_name: String,
}

/// Thinking configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    /// Whether to surface thought parts.
    pub include_thoughts: bool,
}

/// System prompt wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemInstruction {
    /// Prompt parts.
    pub parts: Vec<Part>,
}

/// Tool declaration group.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Declared functions.
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// One declared function.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name.
    pub name: String,
    /// Docstring shown to the model.
    pub description: String,
    /// Parameter schema (loose JSON schema).
    pub parameters: serde_json::Value,
    /// Execution behavior hint (`NON_BLOCKING` for fire-and-forget tools).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

/// Turn-based content.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    /// Conversation turns.
    pub turns: Vec<Turn>,
    /// Whether this content completes the user turn.
    #[serde(default)]
    pub turn_complete: bool,
}

/// One conversation turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker role (`user` or `model`).
    #[serde(default)]
    pub role: String,
    /// Turn parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One content part.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    /// Build a text-only part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Inline base64 data with a MIME type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type.
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

/// Streamed realtime media.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    /// Media chunks.
    pub media_chunks: Vec<InlineData>,
}

/// Tool responses back to upstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    /// One response per function call, correlated by id.
    pub function_responses: Vec<FunctionResponse>,
}

/// One function response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Echoes the originating call id.
    #[serde(default)]
    pub id: String,
    /// Echoes the function name.
    pub name: String,
    /// Result payload.
    pub response: serde_json::Value,
    /// Scheduling hint (`SILENT` suppresses a spoken acknowledgment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound (upstream → orchestrator)
// ─────────────────────────────────────────────────────────────────────────────

/// Union message read from the upstream socket.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveServerMessage {
    /// Streaming content for the current turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
    /// Tool invocation request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Signals the upstream finished processing setup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<serde_json::Value>,
    /// Token accounting for the session so far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

/// Streaming content within a turn.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// Accumulated agent text parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Turn>,
    /// Streaming partial transcription of the user's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,
    /// Streaming partial transcription of the agent's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,
    /// Hard turn boundary.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub turn_complete: bool,
    /// Barge-in signal; propagated with no transcript action.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
}

/// One transcription fragment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcription {
    /// Fragment text.
    #[serde(default)]
    pub text: String,
}

/// Tool invocation request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Concurrent function calls.
    pub function_calls: Vec<FunctionCall>,
}

/// One function call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Correlation id echoed in the response.
    #[serde(default)]
    pub id: String,
    /// Function name.
    #[serde(default)]
    pub name: String,
    /// Loosely-typed arguments.
    #[serde(default)]
    pub args: serde_json::Value,
}

impl FunctionCall {
    /// Extract a string argument; missing or ill-typed fields yield `""`.
    #[must_use]
    pub fn arg_str(&self, key: &str) -> String {
        self.args
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Token accounting from upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt (input) token count.
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Candidates (output) token count.
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Total token count.
    #[serde(default)]
    pub total_token_count: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
