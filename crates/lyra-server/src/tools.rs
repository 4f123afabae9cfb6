//! Tool executor.
//!
//! Tool calls arrive concurrently from upstream; each one runs in its own
//! task so a slow tool never blocks the upstream reader. Every call
//! produces exactly one `toolResponse` correlated by the originating call
//! id. Tool failures are answered in-band as `{error: ...}` and never end
//! the session.

use std::sync::Arc;

use lyra_core::ToolError;
use lyra_protocol::envelope::OrchestratorFrame;
use lyra_protocol::live::{FunctionCall, FunctionResponse, LiveClientMessage, ToolResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::metrics::TOOL_CALLS_TOTAL;
use crate::session::call::CallSession;
use crate::setup::{TOOL_KNOWLEDGE, TOOL_SEND_LINK, TOOL_TERMINATE};

/// Execute one upstream function call against the session.
///
/// Spawned detached by the upstream reader.
pub async fn dispatch_function_call(
    session: Arc<CallSession>,
    http: reqwest::Client,
    search_base_url: String,
    call: FunctionCall,
) {
    info!(session_id = %session.id, tool = %call.name, call_id = %call.id, "tool call");
    metrics::counter!(TOOL_CALLS_TOTAL, "tool" => call.name.clone()).increment(1);

    match call.name.as_str() {
        TOOL_KNOWLEDGE => {
            let query = call.arg_str("query");
            let mut category = call.arg_str("category");
            if category.is_empty() {
                category = "all".into();
            }
            let response = match search_knowledge(&http, &search_base_url, &query, &category).await
            {
                Ok(hits) => json!({"content": hits}),
                Err(e) => {
                    warn!(session_id = %session.id, error = %e, "knowledge search failed");
                    json!({"error": e.to_string()})
                }
            };
            respond(&session, &call, response, None).await;
        }
        TOOL_TERMINATE => {
            respond(&session, &call, json!({"status": "success"}), None).await;
            if session.mark_finalized() {
                info!(session_id = %session.id, "agent requested graceful termination");
            }
        }
        TOOL_SEND_LINK => {
            let url = call.arg_str("url");
            let alias = call.arg_str("alias");
            debug!(session_id = %session.id, %url, %alias, "sending link bubble");

            // 1. Isolated bubble frame for the client UI.
            let frame = OrchestratorFrame::link_bubble(&url, &alias);
            match serde_json::to_string(&frame) {
                Ok(text) => {
                    if session.send_client(text).await.is_err() {
                        debug!(session_id = %session.id, "session closing, link bubble dropped");
                    }
                }
                Err(e) => warn!(session_id = %session.id, error = %e, "link bubble encode failed"),
            }

            // 2. Silent success back to the model so it does not verbalize
            //    an acknowledgment.
            respond(
                &session,
                &call,
                json!({"status": "success", "message": "Link exibido no chat com sucesso."}),
                Some("SILENT"),
            )
            .await;

            // 3. Persist as markdown for the dashboard transcript.
            session.append_link_utterance(&alias, &url);
        }
        other => {
            warn!(session_id = %session.id, tool = other, "unknown tool call ignored");
        }
    }
}

/// Send a `toolResponse` for `call` back to upstream.
async fn respond(
    session: &CallSession,
    call: &FunctionCall,
    response: Value,
    scheduling: Option<&str>,
) {
    let message = LiveClientMessage::tool_response(ToolResponse {
        function_responses: vec![FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
            scheduling: scheduling.map(str::to_string),
        }],
    });
    match serde_json::to_string(&message) {
        Ok(text) => {
            if session.send_upstream(text).await.is_err() {
                debug!(session_id = %session.id, call_id = %call.id, "session closing, tool response dropped");
            }
        }
        Err(e) => warn!(session_id = %session.id, error = %e, "tool response encode failed"),
    }
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    hits: Vec<Value>,
}

/// Query the knowledge-search service.
async fn search_knowledge(
    http: &reqwest::Client,
    base_url: &str,
    query: &str,
    category: &str,
) -> Result<Vec<Value>, ToolError> {
    let url = format!("{base_url}/api/knowledge/search");
    let resp = http
        .get(&url)
        .query(&[("q", query), ("category", category)])
        .send()
        .await
        .map_err(|e| ToolError::Request(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(ToolError::Status(resp.status().as_u16()));
    }
    let results: SearchResults = resp
        .json()
        .await
        .map_err(|e| ToolError::Decode(e.to_string()))?;
    Ok(results.hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_core::CallStatus;
    use tokio::sync::mpsc;

    fn call(name: &str, id: &str, args: Value) -> FunctionCall {
        FunctionCall {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    fn make_session() -> (
        Arc<CallSession>,
        mpsc::Receiver<String>,
        mpsc::Receiver<String>,
    ) {
        CallSession::new("call-t".into(), "aiVoice".into(), 8)
    }

    fn http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn terminate_tool_responds_and_flags() {
        let (session, mut up_rx, _cl_rx) = make_session();
        dispatch_function_call(
            session.clone(),
            http(),
            "http://127.0.0.1:1".into(),
            call(TOOL_TERMINATE, "t1", json!({})),
        )
        .await;

        let frame: Value = serde_json::from_str(&up_rx.recv().await.unwrap()).unwrap();
        let fr = &frame["toolResponse"]["functionResponses"][0];
        assert_eq!(fr["id"], "t1");
        assert_eq!(fr["name"], TOOL_TERMINATE);
        assert_eq!(fr["response"]["status"], "success");

        assert!(session.should_terminate());
        assert!(session.was_graceful());
        assert_eq!(session.status(), CallStatus::Completed);
        assert!(!session.is_cancelled(), "termination must be deferred");
    }

    #[tokio::test]
    async fn duplicate_terminate_reaches_same_state() {
        let (session, mut up_rx, _cl_rx) = make_session();
        for _ in 0..3 {
            dispatch_function_call(
                session.clone(),
                http(),
                "http://127.0.0.1:1".into(),
                call(TOOL_TERMINATE, "t1", json!({})),
            )
            .await;
            let _ = up_rx.recv().await.unwrap();
        }
        assert_eq!(session.status(), CallStatus::Completed);
        assert!(session.should_terminate());
    }

    #[tokio::test]
    async fn send_link_emits_bubble_silent_response_and_utterance() {
        let (session, mut up_rx, mut cl_rx) = make_session();
        dispatch_function_call(
            session.clone(),
            http(),
            "http://127.0.0.1:1".into(),
            call(
                TOOL_SEND_LINK,
                "t3",
                json!({"url": "https://x.y", "alias": "Clique aqui"}),
            ),
        )
        .await;

        let bubble: Value = serde_json::from_str(&cl_rx.recv().await.unwrap()).unwrap();
        assert_eq!(bubble["type"], "link_bubble");
        assert_eq!(bubble["payload"]["url"], "https://x.y");
        assert_eq!(bubble["payload"]["alias"], "Clique aqui");

        let response: Value = serde_json::from_str(&up_rx.recv().await.unwrap()).unwrap();
        let fr = &response["toolResponse"]["functionResponses"][0];
        assert_eq!(fr["id"], "t3");
        assert_eq!(fr["scheduling"], "SILENT");
        assert_eq!(fr["response"]["status"], "success");

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].text, "[Clique aqui](https://x.y)");
    }

    #[tokio::test]
    async fn knowledge_tool_maps_failure_to_error_response() {
        let (session, mut up_rx, _cl_rx) = make_session();
        // Nothing listens on port 1: the search must fail and the failure
        // must surface as an in-band error response.
        dispatch_function_call(
            session.clone(),
            http(),
            "http://127.0.0.1:1".into(),
            call(TOOL_KNOWLEDGE, "t2", json!({"query": "preço", "category": ""})),
        )
        .await;

        let response: Value = serde_json::from_str(&up_rx.recv().await.unwrap()).unwrap();
        let fr = &response["toolResponse"]["functionResponses"][0];
        assert_eq!(fr["id"], "t2");
        assert_eq!(fr["name"], TOOL_KNOWLEDGE);
        assert!(fr["response"]["error"].is_string());
        assert!(!session.is_cancelled(), "tool failure must not end the session");
    }

    #[tokio::test]
    async fn unknown_tool_produces_no_response() {
        let (session, mut up_rx, _cl_rx) = make_session();
        dispatch_function_call(
            session,
            http(),
            "http://127.0.0.1:1".into(),
            call("instalar_plugin", "t9", json!({})),
        )
        .await;
        assert!(up_rx.try_recv().is_err());
    }

    #[test]
    fn search_results_tolerate_missing_hits() {
        let results: SearchResults = serde_json::from_str("{}").unwrap();
        assert!(results.hits.is_empty());
    }
}
