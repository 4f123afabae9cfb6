//! Per-tenant agent configuration.
//!
//! Fetched once per session at setup time. When the database is absent or
//! the fetch fails, [`AgentConfig::fallback`] supplies a usable default so
//! the session always proceeds.

use serde::{Deserialize, Serialize};

/// Default prebuilt voice.
pub const DEFAULT_VOICE: &str = "Aoede";

/// Default language code.
pub const DEFAULT_LANGUAGE: &str = "pt-BR";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Configuration for one voice agent tenant.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Prebuilt voice name for speech synthesis.
    pub voice_name: String,
    /// BCP-47 language code.
    pub language_code: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Thinking budget in tokens (stored, forwarded as configured).
    pub thinking_budget: i32,
    /// Prepend the affective-dialog preamble to the system prompt.
    pub enable_affective_dialog: bool,
    /// Prepend the proactive-audio preamble to the system prompt.
    pub proactive_audio: bool,
    /// Base system prompt.
    pub system_prompt: String,
    /// Docstring for the knowledge-search tool.
    pub docstring_tool_knowledge: String,
    /// Docstring for the session-terminate tool.
    pub docstring_tool_terminate: String,
    /// Docstring for the link-send tool.
    pub docstring_tool_send_link: String,
    /// Conversation duration limit in seconds (reported, never enforced).
    pub duration_limit: u32,
    /// Seconds of elapsed conversation after which the wind-down alert fires.
    pub termination_alert_time: u32,
    /// Instruction injected by the wind-down alert (default used when empty).
    pub proactive_alert_instruction: String,
}

impl AgentConfig {
    /// Safe defaults applied when no configuration row exists for a tenant
    /// or the database is unreachable.
    #[must_use]
    pub fn fallback(client_name: &str) -> Self {
        Self {
            voice_name: DEFAULT_VOICE.into(),
            language_code: DEFAULT_LANGUAGE.into(),
            temperature: DEFAULT_TEMPERATURE,
            thinking_budget: 0,
            enable_affective_dialog: false,
            proactive_audio: false,
            system_prompt: format!(
                "Você é o {client_name}, um assistente de voz avançado criado pelo estúdio TkzM."
            ),
            docstring_tool_knowledge: format!(
                "Invoque esta ferramenta sempre que o usuário tiver dúvidas sobre o {client_name}."
            ),
            docstring_tool_terminate: String::new(),
            docstring_tool_send_link: String::new(),
            duration_limit: 0,
            termination_alert_time: 0,
            proactive_alert_instruction: String::new(),
        }
    }
}
