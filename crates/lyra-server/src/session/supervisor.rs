//! Session supervision: accept, the four pumps, and cleanup.
//!
//! Each session runs four long-lived pumps sharing one cancellation scope:
//! two readers (client, upstream) and two single-writer queues draining to
//! the opposite socket. The first pump to exit (I/O error, peer close, or
//! cancellation) cancels the scope; the readers observe the token in
//! their `select!` and the writers close their sinks on the way out, so the
//! task set always drains and cleanup runs exactly once.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message as ClientMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use lyra_core::SessionError;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::call::CallSession;
use super::downstream::handle_client_frame;
use super::upstream::handle_upstream_frame;
use super::SessionServices;
use crate::metrics::{
    SESSIONS_ACTIVE, SESSIONS_CLOSED_TOTAL, SESSIONS_OPENED_TOTAL, UPSTREAM_DIAL_FAILURES_TOTAL,
};
use crate::server::AppState;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Query parameters of the `/ws` upgrade request.
#[derive(Clone, Debug, Default)]
pub struct SessionParams {
    /// Client-supplied stable call id.
    pub call_id: Option<String>,
    /// Client-supplied tenant name (consulted when no instance name is
    /// configured).
    pub client: Option<String>,
}

/// Drive one session from accept to cleanup.
pub async fn run_call_session(socket: WebSocket, state: AppState, params: SessionParams) {
    let Some(api_key) = state.config.gemini_api_key.clone() else {
        warn!("GEMINI_API_KEY not configured, rejecting session");
        close_client(socket).await;
        return;
    };

    let client_name = state.config.resolve_client_name(params.client.as_deref());
    let dial_url = format!("{}?key={}", state.config.upstream_url, api_key);
    let upstream = match connect_async(&dial_url).await {
        Ok((upstream, _)) => upstream,
        Err(e) => {
            metrics::counter!(UPSTREAM_DIAL_FAILURES_TOTAL).increment(1);
            warn!(error = %e, "upstream dial failed, rejecting session");
            close_client(socket).await;
            return;
        }
    };

    let session_id = params
        .call_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(lyra_core::ids::session_id);
    let (session, up_rx, cl_rx) =
        CallSession::new(session_id, client_name, state.config.queue_capacity);
    info!(session_id = %session.id, client_name = %session.client_name, "session started");
    state.registry.register(session.clone()).await;
    metrics::counter!(SESSIONS_OPENED_TOTAL).increment(1);
    metrics::gauge!(SESSIONS_ACTIVE).increment(1.0);

    let (client_sink, client_stream) = socket.split();
    let (upstream_sink, upstream_stream) = upstream.split();
    let services = state.services.clone();

    let mut pumps: JoinSet<Result<(), SessionError>> = JoinSet::new();
    let _ = pumps.spawn(downstream_reader(
        session.clone(),
        services.clone(),
        client_stream,
    ));
    let _ = pumps.spawn(upstream_reader(
        session.clone(),
        services.clone(),
        upstream_stream,
    ));
    let _ = pumps.spawn(upstream_writer(session.clone(), upstream_sink, up_rx));
    let _ = pumps.spawn(client_writer(
        session.clone(),
        client_sink,
        cl_rx,
        services.ping_interval,
    ));

    while let Some(joined) = pumps.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(session_id = %session.id, error = %e, "pump exited"),
            Err(e) => warn!(session_id = %session.id, error = %e, "pump join failed"),
        }
        // First exit trips the scope; the remaining pumps unwind.
        session.cancel();
    }

    // Cleanup: runs exactly once, after every pump has returned.
    state.registry.remove(&session.id).await;
    let snapshot = session.finalize();
    metrics::gauge!(SESSIONS_ACTIVE).decrement(1.0);
    metrics::counter!(SESSIONS_CLOSED_TOTAL, "status" => format!("{:?}", snapshot.status))
        .increment(1);
    info!(
        session_id = %session.id,
        status = ?snapshot.status,
        utterances = snapshot.new_transcript.len(),
        duration_secs = snapshot.duration_seconds,
        "session cleanup"
    );
    services.dashboard.sync_and_log(&snapshot).await;
}

/// Close a downstream socket we are rejecting before a session exists.
async fn close_client(mut socket: WebSocket) {
    let _ = socket.close().await;
}

/// Pump: downstream client → envelope dispatch → `to_upstream`.
async fn downstream_reader(
    session: Arc<CallSession>,
    services: SessionServices,
    mut stream: SplitStream<WebSocket>,
) -> Result<(), SessionError> {
    loop {
        tokio::select! {
            () = session.cancelled() => return Ok(()),
            frame = stream.next() => {
                let Some(frame) = frame else {
                    return Err(SessionError::ClientClosed);
                };
                let message = frame.map_err(|e| SessionError::ClientRead(e.to_string()))?;
                match message {
                    ClientMessage::Text(text) => {
                        handle_client_frame(&session, &services, text.to_string()).await?;
                    }
                    ClientMessage::Binary(data) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            handle_client_frame(&session, &services, text.to_string()).await?;
                        }
                    }
                    ClientMessage::Close(_) => return Err(SessionError::ClientClosed),
                    ClientMessage::Ping(_) | ClientMessage::Pong(_) => {}
                }
            }
        }
    }
}

/// Pump: upstream service → raw forward + local dispatch.
async fn upstream_reader(
    session: Arc<CallSession>,
    services: SessionServices,
    mut stream: SplitStream<UpstreamSocket>,
) -> Result<(), SessionError> {
    loop {
        tokio::select! {
            () = session.cancelled() => return Ok(()),
            frame = stream.next() => {
                let Some(frame) = frame else {
                    return Err(SessionError::UpstreamClosed);
                };
                let message = frame.map_err(|e| SessionError::UpstreamRead(e.to_string()))?;
                match message {
                    UpstreamMessage::Text(text) => {
                        handle_upstream_frame(&session, &services, text.to_string()).await?;
                    }
                    UpstreamMessage::Binary(data) => {
                        if let Ok(text) = std::str::from_utf8(&data) {
                            handle_upstream_frame(&session, &services, text.to_string()).await?;
                        }
                    }
                    UpstreamMessage::Close(_) => return Err(SessionError::UpstreamClosed),
                    UpstreamMessage::Ping(_)
                    | UpstreamMessage::Pong(_)
                    | UpstreamMessage::Frame(_) => {}
                }
            }
        }
    }
}

/// Pump: drain `to_upstream` into the upstream socket.
async fn upstream_writer(
    session: Arc<CallSession>,
    mut sink: SplitSink<UpstreamSocket, UpstreamMessage>,
    mut queue: mpsc::Receiver<String>,
) -> Result<(), SessionError> {
    loop {
        tokio::select! {
            () = session.cancelled() => {
                let _ = sink.close().await;
                return Ok(());
            }
            frame = queue.recv() => {
                let Some(frame) = frame else { return Ok(()) };
                sink.send(UpstreamMessage::Text(frame.into()))
                    .await
                    .map_err(|e| SessionError::UpstreamWrite(e.to_string()))?;
            }
        }
    }
}

/// Pump: drain `to_client` into the client socket, pinging on an
/// independent ticker.
async fn client_writer(
    session: Arc<CallSession>,
    mut sink: SplitSink<WebSocket, ClientMessage>,
    mut queue: mpsc::Receiver<String>,
    ping_interval: Duration,
) -> Result<(), SessionError> {
    let start = tokio::time::Instant::now() + ping_interval;
    let mut ping = tokio::time::interval_at(start, ping_interval);
    loop {
        tokio::select! {
            () = session.cancelled() => {
                let _ = sink.close().await;
                return Ok(());
            }
            frame = queue.recv() => {
                let Some(frame) = frame else { return Ok(()) };
                sink.send(ClientMessage::Text(frame.into()))
                    .await
                    .map_err(|e| SessionError::ClientWrite(e.to_string()))?;
            }
            _ = ping.tick() => {
                sink.send(ClientMessage::Ping(Bytes::new()))
                    .await
                    .map_err(|e| SessionError::ClientWrite(e.to_string()))?;
            }
        }
    }
}
