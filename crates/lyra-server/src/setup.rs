//! Setup builder: tenant configuration → upstream setup payload.

use lyra_core::AgentConfig;
use lyra_protocol::live::{
    FunctionDeclaration, GenerationConfig, Part, PrebuiltVoiceConfig, Setup, SpeechConfig,
    SystemInstruction, ThinkingConfig, Tool, VoiceConfig, UPSTREAM_MODEL,
};
use serde_json::json;

use crate::store::ConfigStore;

/// Knowledge-search tool name.
pub const TOOL_KNOWLEDGE: &str = "consultar_base_conhecimento";
/// Session-terminate tool name.
pub const TOOL_TERMINATE: &str = "finalizar_atendimento";
/// Link-send tool name.
pub const TOOL_SEND_LINK: &str = "sendLink";

const AFFECTIVE_PREAMBLE: &str = "MODO AFETIVO ATIVADO: Use um tom de voz empático, expressivo e humano. Adapte sua entonação e prosódia às emoções detectadas na conversa.\n\n";

const PROACTIVE_PREAMBLE: &str = "MODO PROATIVO ATIVADO: Seja proativa. Não hesite em tomar a iniciativa, sugerir caminhos ou fazer perguntas para manter a fluidez, especialmente se o usuário parecer em dúvida.\n\n";

/// Build the upstream setup payload for a tenant.
///
/// Returns the payload together with the configuration it was built from so
/// the caller can install the session policy fields without a second fetch.
/// Never fails: a missing or unreachable database yields
/// [`AgentConfig::fallback`].
pub async fn build_setup(store: &ConfigStore, client_name: &str) -> (Setup, AgentConfig) {
    let cfg = store
        .fetch_config(client_name)
        .await
        .unwrap_or_else(|| AgentConfig::fallback(client_name));
    let categories = store.fetch_categories().await;

    let setup = Setup {
        model: UPSTREAM_MODEL.into(),
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["AUDIO".into()]),
            speech_config: Some(SpeechConfig {
                voice_config: Some(VoiceConfig {
                    prebuilt_voice_config: Some(PrebuiltVoiceConfig {
                        voice_name: cfg.voice_name.clone(),
                    }),
                }),
                language_code: Some(cfg.language_code.clone()),
            }),
            temperature: Some(cfg.temperature),
            thinking_config: Some(ThinkingConfig {
                include_thoughts: false,
            }),
        }),
        system_instruction: Some(SystemInstruction {
            parts: vec![Part::text(composed_prompt(&cfg))],
        }),
        tools: Some(vec![Tool {
            function_declarations: vec![
                FunctionDeclaration {
                    name: TOOL_KNOWLEDGE.into(),
                    description: knowledge_docstring(&cfg.docstring_tool_knowledge, &categories),
                    parameters: json!({
                        "type": "OBJECT",
                        "properties": {
                            "query": {"type": "STRING", "description": "Termos de busca"},
                            "category": {"type": "STRING", "description": "Categoria específica ou 'all'"},
                        },
                        "required": ["query", "category"],
                    }),
                    behavior: None,
                },
                FunctionDeclaration {
                    name: TOOL_TERMINATE.into(),
                    description: cfg.docstring_tool_terminate.clone(),
                    parameters: json!({"type": "OBJECT", "properties": {}}),
                    behavior: None,
                },
                FunctionDeclaration {
                    name: TOOL_SEND_LINK.into(),
                    description: cfg.docstring_tool_send_link.clone(),
                    parameters: json!({
                        "type": "OBJECT",
                        "properties": {
                            "url": {"type": "STRING", "description": "A URL completa do link"},
                            "alias": {"type": "STRING", "description": "O texto amigável que será exibido para o link"},
                        },
                        "required": ["url", "alias"],
                    }),
                    behavior: Some("NON_BLOCKING".into()),
                },
            ],
        }]),
        // Both streaming transcriptions must be explicitly enabled.
        input_audio_transcription: Some(json!({})),
        output_audio_transcription: Some(json!({})),
    };

    (setup, cfg)
}

/// Final system prompt: proactive preamble outermost, then affective, then
/// the base prompt.
fn composed_prompt(cfg: &AgentConfig) -> String {
    let mut prompt = cfg.system_prompt.clone();
    if cfg.enable_affective_dialog {
        prompt = format!("{AFFECTIVE_PREAMBLE}{prompt}");
    }
    if cfg.proactive_audio {
        prompt = format!("{PROACTIVE_PREAMBLE}{prompt}");
    }
    prompt
}

/// Knowledge docstring with the dynamic category suffix. The list always
/// starts with the literal `all` token.
fn knowledge_docstring(base: &str, categories: &[String]) -> String {
    let mut list = String::from("all");
    for cat in categories {
        list.push_str(", ");
        list.push_str(cat);
    }
    format!(
        "{base}\n\n---\n⚠️ INJEÇÃO DINÂMICA (Categorias Ativas): [{list}]\nUse o parâmetro 'category' com uma das opções acima para filtrar a busca, ou 'all' para busca global."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_store() -> ConfigStore {
        ConfigStore::new(None)
    }

    #[tokio::test]
    async fn builds_defaults_without_database() {
        let (setup, cfg) = build_setup(&detached_store(), "aiVoice").await;
        assert_eq!(setup.model, UPSTREAM_MODEL);
        assert_eq!(cfg.voice_name, "Aoede");
        let gen = setup.generation_config.unwrap();
        assert_eq!(gen.response_modalities.unwrap(), vec!["AUDIO".to_string()]);
        assert!((gen.temperature.unwrap() - 0.7).abs() < f64::EPSILON);
        let speech = gen.speech_config.unwrap();
        assert_eq!(speech.language_code.as_deref(), Some("pt-BR"));
        assert_eq!(
            speech
                .voice_config
                .unwrap()
                .prebuilt_voice_config
                .unwrap()
                .voice_name,
            "Aoede"
        );
    }

    #[tokio::test]
    async fn declares_three_tools() {
        let (setup, _) = build_setup(&detached_store(), "aiVoice").await;
        let tools = setup.tools.unwrap();
        assert_eq!(tools.len(), 1);
        let decls = &tools[0].function_declarations;
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].name, TOOL_KNOWLEDGE);
        assert_eq!(decls[1].name, TOOL_TERMINATE);
        assert_eq!(decls[2].name, TOOL_SEND_LINK);
        assert_eq!(decls[2].behavior.as_deref(), Some("NON_BLOCKING"));
        assert_eq!(decls[0].parameters["required"][0], "query");
        assert_eq!(decls[0].parameters["required"][1], "category");
        assert_eq!(decls[2].parameters["required"][0], "url");
        assert_eq!(decls[2].parameters["required"][1], "alias");
    }

    #[tokio::test]
    async fn enables_both_transcriptions() {
        let (setup, _) = build_setup(&detached_store(), "aiVoice").await;
        assert!(setup.input_audio_transcription.is_some());
        assert!(setup.output_audio_transcription.is_some());
    }

    #[test]
    fn knowledge_docstring_always_lists_all() {
        let doc = knowledge_docstring("Base.", &[]);
        assert!(doc.starts_with("Base."));
        assert!(doc.contains("[all]"));
    }

    #[test]
    fn knowledge_docstring_appends_categories() {
        let cats = vec!["preços".to_string(), "suporte".to_string()];
        let doc = knowledge_docstring("Base.", &cats);
        assert!(doc.contains("[all, preços, suporte]"));
    }

    #[test]
    fn prompt_preamble_order() {
        let mut cfg = AgentConfig::fallback("aiVoice");
        cfg.system_prompt = "BASE".into();
        cfg.enable_affective_dialog = true;
        cfg.proactive_audio = true;
        let prompt = composed_prompt(&cfg);
        let proactive = prompt.find("MODO PROATIVO").unwrap();
        let affective = prompt.find("MODO AFETIVO").unwrap();
        let base = prompt.find("BASE").unwrap();
        assert!(proactive < affective);
        assert!(affective < base);
    }

    #[test]
    fn prompt_without_toggles_is_base_only() {
        let mut cfg = AgentConfig::fallback("aiVoice");
        cfg.system_prompt = "BASE".into();
        assert_eq!(composed_prompt(&cfg), "BASE");
    }
}
