//! End-to-end tests: real server, real WebSocket clients, a scripted mock
//! upstream, and a capturing mock dashboard.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use lyra_server::config::OrchestratorConfig;
use lyra_server::server::{router, AppState};
use lyra_server::store::ConfigStore;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Harness ──────────────────────────────────────────────────────────

/// One scripted upstream connection: frames the orchestrator sends arrive
/// on `received`, frames pushed into `inject` are sent back to it.
struct MockUpstream {
    url: String,
    received: mpsc::Receiver<Value>,
    inject: mpsc::Sender<String>,
}

async fn mock_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (received_tx, received_rx) = mpsc::channel::<Value>(64);
    let (inject_tx, mut inject_rx) = mpsc::channel::<String>(64);

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                out = inject_rx.recv() => {
                    let Some(out) = out else { break };
                    if sink.send(Message::Text(out.into())).await.is_err() {
                        break;
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                if received_tx.send(value).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    });

    MockUpstream {
        url: format!("ws://{addr}"),
        received: received_rx,
        inject: inject_tx,
    }
}

impl MockUpstream {
    async fn expect_frame(&mut self) -> Value {
        timeout(TIMEOUT, self.received.recv())
            .await
            .expect("timed out waiting for upstream frame")
            .expect("upstream connection ended")
    }

    async fn send(&self, frame: &str) {
        self.inject.send(frame.to_string()).await.unwrap();
    }
}

/// Capturing dashboard: sync payloads and knowledge-search queries land on
/// channels the test can drain.
async fn mock_dashboard() -> (String, mpsc::Receiver<Value>, mpsc::Receiver<(String, String)>) {
    let (sync_tx, sync_rx) = mpsc::channel::<Value>(64);
    let (search_tx, search_rx) = mpsc::channel::<(String, String)>(16);

    let app = Router::new()
        .route(
            "/api/calls/sync",
            post(move |Json(body): Json<Value>| {
                let sync_tx = sync_tx.clone();
                async move {
                    let _ = sync_tx.send(body).await;
                    StatusCode::OK
                }
            }),
        )
        .route(
            "/api/knowledge/search",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let search_tx = search_tx.clone();
                async move {
                    let q = params.get("q").cloned().unwrap_or_default();
                    let category = params.get("category").cloned().unwrap_or_default();
                    let _ = search_tx.send((q, category)).await;
                    Json(json!({"hits": [{"title": "Tabela de preços"}]}))
                }
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}"), sync_rx, search_rx)
}

/// Boot the orchestrator on an ephemeral port.
async fn boot_server(
    upstream_url: &str,
    dashboard_url: &str,
    api_key: Option<&str>,
) -> (SocketAddr, AppState) {
    let config = OrchestratorConfig {
        host: "127.0.0.1".into(),
        port: 0,
        gemini_api_key: api_key.map(str::to_string),
        dashboard_url: dashboard_url.into(),
        upstream_url: upstream_url.into(),
        drain_timeout_secs: 2,
        ..OrchestratorConfig::default()
    };
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    let state = AppState::new(config, ConfigStore::new(None), metrics_handle);
    let app = router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, state)
}

async fn connect_client(addr: SocketAddr, query: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws{query}"))
        .await
        .expect("client connect failed");
    ws
}

/// Next text frame from the client socket; `None` once it closes.
async fn recv_text(ws: &mut WsClient) -> Option<String> {
    loop {
        let frame = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for client frame")?;
        match frame {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Read client frames until one satisfies the predicate; `None` on close.
async fn recv_until(ws: &mut WsClient, pred: impl Fn(&Value) -> bool) -> Option<Value> {
    while let Some(text) = recv_text(ws).await {
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            if pred(&value) {
                return Some(value);
            }
        }
    }
    None
}

async fn wait_for_registry_drain(state: &AppState) {
    for _ in 0..100 {
        if state.registry.count().await == 0 {
            return;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("registry did not drain");
}

// ── HTTP surface ─────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_while_running() {
    let (addr, _state) = boot_server("ws://127.0.0.1:9", "http://127.0.0.1:9", Some("k")).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn terminate_requires_session_id() {
    let (addr, _state) = boot_server("ws://127.0.0.1:9", "http://127.0.0.1:9", Some("k")).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/terminate"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn terminate_unknown_session_returns_ok_with_cors() {
    let (addr, _state) = boot_server("ws://127.0.0.1:9", "http://127.0.0.1:9", Some("k")).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/terminate?sessionId=ghost"))
        .header("origin", "https://widget.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

// ── Accept-path rejections ───────────────────────────────────────────

#[tokio::test]
async fn upstream_unreachable_rejects_session() {
    // Nothing listens on the upstream port: the downstream socket must be
    // closed and no session registered.
    let (dash_url, mut sync_rx, _search_rx) = mock_dashboard().await;
    let (addr, state) = boot_server("ws://127.0.0.1:9", &dash_url, Some("k")).await;

    let mut client = connect_client(addr, "").await;
    assert!(recv_text(&mut client).await.is_none(), "socket should close");
    assert_eq!(state.registry.count().await, 0);
    assert!(sync_rx.try_recv().is_err(), "no dashboard row for a rejected session");
}

#[tokio::test]
async fn missing_api_key_rejects_session() {
    let (addr, state) = boot_server("ws://127.0.0.1:9", "http://127.0.0.1:9", None).await;

    let mut client = connect_client(addr, "").await;
    assert!(recv_text(&mut client).await.is_none(), "socket should close");
    assert_eq!(state.registry.count().await, 0);
}

// ── End-to-end scenarios ─────────────────────────────────────────────

#[tokio::test]
async fn graceful_session_end_to_end() {
    let mut upstream = mock_upstream().await;
    let (dash_url, mut sync_rx, _search_rx) = mock_dashboard().await;
    let (addr, state) = boot_server(&upstream.url, &dash_url, Some("test-key")).await;

    let mut client = connect_client(addr, "?callId=call-e2e").await;
    client
        .send(Message::Text(r#"{"type":"setup"}"#.into()))
        .await
        .unwrap();

    // Orchestrator translates the setup envelope into the upstream payload.
    let setup = upstream.expect_frame().await;
    assert!(setup["setup"]["model"].as_str().unwrap().starts_with("models/"));
    assert_eq!(
        setup["setup"]["tools"][0]["functionDeclarations"]
            .as_array()
            .unwrap()
            .len(),
        3
    );

    // Upstream becomes ready; the orchestrator wakes the agent silently.
    upstream.send(r#"{"setupComplete":{}}"#).await;
    let wake = upstream.expect_frame().await;
    assert_eq!(wake["clientContent"]["turns"][0]["parts"][0]["text"], "Olá");
    assert_eq!(wake["clientContent"]["turnComplete"], true);

    // The raw setupComplete frame reached the client untouched.
    let forwarded = recv_until(&mut client, |v| v.get("setupComplete").is_some()).await;
    assert!(forwarded.is_some());

    // One full turn: user transcription, agent reply, boundary.
    upstream
        .send(r#"{"serverContent":{"inputTranscription":{"text":"oi"}}}"#)
        .await;
    upstream
        .send(r#"{"serverContent":{"modelTurn":{"role":"model","parts":[{"text":"Olá, como posso ajudar?"}]}}}"#)
        .await;
    upstream.send(r#"{"serverContent":{"turnComplete":true}}"#).await;

    // The agent decides to end the call.
    upstream
        .send(r#"{"toolCall":{"functionCalls":[{"id":"t1","name":"finalizar_atendimento","args":{}}]}}"#)
        .await;
    let tool_response = upstream.expect_frame().await;
    let fr = &tool_response["toolResponse"]["functionResponses"][0];
    assert_eq!(fr["id"], "t1");
    assert_eq!(fr["response"]["status"], "success");

    // The next boundary triggers the deferred termination handshake.
    upstream.send(r#"{"serverContent":{"turnComplete":true}}"#).await;
    let notice = recv_until(&mut client, |v| v["type"] == "session_terminated").await;
    assert!(notice.is_some(), "client must see session_terminated");

    // The socket closes once the queue drains.
    while recv_text(&mut client).await.is_some() {}
    wait_for_registry_drain(&state).await;

    // The dashboard saw the call through to Completed.
    let mut completed = None;
    while completed.is_none() {
        let sync = timeout(TIMEOUT, sync_rx.recv())
            .await
            .expect("timed out waiting for dashboard sync")
            .expect("dashboard channel closed");
        if sync["status"] == "Completed" {
            completed = Some(sync);
        }
    }
    let completed = completed.unwrap();
    assert_eq!(completed["callId"], "call-e2e");
    assert_eq!(completed["clientName"], "aiVoice");
    let transcript = completed["newTranscript"].as_array().unwrap();
    assert!(transcript
        .iter()
        .any(|u| u["role"] == "user" && u["text"] == "oi"));
    assert!(transcript
        .iter()
        .any(|u| u["role"] == "agent" && u["text"] == "Olá, como posso ajudar?"));
}

#[tokio::test]
async fn knowledge_tool_round_trip() {
    let mut upstream = mock_upstream().await;
    let (dash_url, _sync_rx, mut search_rx) = mock_dashboard().await;
    let (addr, _state) = boot_server(&upstream.url, &dash_url, Some("test-key")).await;

    let mut client = connect_client(addr, "").await;

    upstream
        .send(r#"{"toolCall":{"functionCalls":[{"id":"t2","name":"consultar_base_conhecimento","args":{"query":"preço","category":"all"}}]}}"#)
        .await;

    // The search service received both parameters.
    let (q, category) = timeout(TIMEOUT, search_rx.recv()).await.unwrap().unwrap();
    assert_eq!(q, "preço");
    assert_eq!(category, "all");

    // The hits came back as tool response content, correlated by id.
    let response = upstream.expect_frame().await;
    let fr = &response["toolResponse"]["functionResponses"][0];
    assert_eq!(fr["id"], "t2");
    assert_eq!(fr["response"]["content"][0]["title"], "Tabela de preços");

    // Raw toolCall frame was still forwarded to the client.
    let raw = recv_until(&mut client, |v| v.get("toolCall").is_some()).await;
    assert!(raw.is_some());
}

#[tokio::test]
async fn send_link_reaches_client_and_upstream() {
    let mut upstream = mock_upstream().await;
    let (dash_url, _sync_rx, _search_rx) = mock_dashboard().await;
    let (addr, _state) = boot_server(&upstream.url, &dash_url, Some("test-key")).await;

    let mut client = connect_client(addr, "").await;

    upstream
        .send(r#"{"toolCall":{"functionCalls":[{"id":"t3","name":"sendLink","args":{"url":"https://x.y","alias":"Clique aqui"}}]}}"#)
        .await;

    let bubble = recv_until(&mut client, |v| v["type"] == "link_bubble")
        .await
        .expect("client must receive the link bubble");
    assert_eq!(bubble["payload"]["url"], "https://x.y");
    assert_eq!(bubble["payload"]["alias"], "Clique aqui");

    let response = upstream.expect_frame().await;
    let fr = &response["toolResponse"]["functionResponses"][0];
    assert_eq!(fr["id"], "t3");
    assert_eq!(fr["scheduling"], "SILENT");
}

#[tokio::test]
async fn unknown_envelope_round_trips_to_upstream() {
    let mut upstream = mock_upstream().await;
    let (dash_url, _sync_rx, _search_rx) = mock_dashboard().await;
    let (addr, _state) = boot_server(&upstream.url, &dash_url, Some("test-key")).await;

    let mut client = connect_client(addr, "").await;
    client
        .send(Message::Text(
            r#"{"type":"debugProbe","payload":{"n":1}}"#.into(),
        ))
        .await
        .unwrap();

    let frame = upstream.expect_frame().await;
    assert_eq!(frame["type"], "debugProbe");
    assert_eq!(frame["payload"]["n"], 1);
}

#[tokio::test]
async fn beacon_interrupts_session() {
    let upstream = mock_upstream().await;
    let (dash_url, mut sync_rx, _search_rx) = mock_dashboard().await;
    let (addr, state) = boot_server(&upstream.url, &dash_url, Some("test-key")).await;

    let mut client = connect_client(addr, "?callId=beacon-1").await;
    for _ in 0..100 {
        if state.registry.count().await == 1 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.registry.count().await, 1);

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("http://{addr}/terminate?sessionId=beacon-1"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    while recv_text(&mut client).await.is_some() {}
    wait_for_registry_drain(&state).await;

    // Exactly the terminal sync, with the hang-up status.
    let sync = timeout(TIMEOUT, sync_rx.recv()).await.unwrap().unwrap();
    assert_eq!(sync["callId"], "beacon-1");
    assert_eq!(sync["status"], "Interrupted");
    assert!(sync["newTranscript"].is_array());
}
