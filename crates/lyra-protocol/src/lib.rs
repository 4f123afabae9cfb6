//! # lyra-protocol
//!
//! Wire types for the two protocols the orchestrator speaks:
//!
//! - **Downstream** (`envelope`): the framed `{type, payload}` envelope a
//!   client sends, plus the orchestrator-originated frames it receives
//!   (`link_bubble`, `session_terminated`)
//! - **Upstream** (`live`): the live-AI union message. Setup, content,
//!   realtime audio, and tool traffic outbound; server content, tool calls,
//!   setup completion, and usage metadata inbound
//!
//! Only the fields the orchestrator inspects are typed; everything else is
//! carried as `serde_json::Value` and forwarded verbatim.

#![deny(unsafe_code)]

pub mod envelope;
pub mod live;

pub use envelope::{
    AudioChunk, ClientEnvelope, EnvelopeKind, LinkPayload, OrchestratorFrame,
    RealtimeAudioPayload,
};
pub use live::{
    ClientContent, FunctionCall, FunctionDeclaration, FunctionResponse, GenerationConfig,
    InlineData, LiveClientMessage, LiveServerMessage, Part, PrebuiltVoiceConfig, RealtimeInput,
    ServerContent, Setup, SpeechConfig, SystemInstruction, ThinkingConfig, Tool, ToolCall,
    ToolResponse, Transcription, Turn, UsageMetadata, VoiceConfig,
};
