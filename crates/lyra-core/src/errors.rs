//! Error types for the lyra orchestrator, built on [`thiserror`].
//!
//! - [`SessionError`]: pump/bridge failures that end a session
//! - [`ToolError`]: knowledge-search failures (mapped to tool responses,
//!   never session-fatal)
//! - [`SyncError`]: dashboard upsert failures (logged, never session-fatal)

use thiserror::Error;

/// Failures inside a session's I/O pumps.
///
/// Any of these tripping a pump cancels the session scope; the cleanup path
/// then records the call as `Interrupted` unless the agent already completed
/// it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The downstream client closed its socket.
    #[error("client connection closed")]
    ClientClosed,

    /// Reading a frame from the downstream client failed.
    #[error("client read failed: {0}")]
    ClientRead(String),

    /// Writing a frame to the downstream client failed.
    #[error("client write failed: {0}")]
    ClientWrite(String),

    /// The upstream live-AI service closed its socket.
    #[error("upstream connection closed")]
    UpstreamClosed,

    /// Dialing the upstream live-AI service failed.
    #[error("upstream dial failed: {0}")]
    UpstreamDial(String),

    /// Reading a frame from upstream failed.
    #[error("upstream read failed: {0}")]
    UpstreamRead(String),

    /// Writing a frame to upstream failed.
    #[error("upstream write failed: {0}")]
    UpstreamWrite(String),

    /// An outbound queue was closed while a producer still held it.
    #[error("outbound queue closed")]
    QueueClosed,

    /// Serializing an orchestrator-originated message failed.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures while calling the external knowledge-search service.
///
/// These never propagate: the tool executor converts them into an
/// `{error: …}` tool response so the agent can recover in-conversation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The search request could not be sent.
    #[error("search request failed: {0}")]
    Request(String),

    /// The search service answered with a non-success status.
    #[error("search returned status {0}")]
    Status(u16),

    /// The search response body could not be decoded.
    #[error("invalid search response: {0}")]
    Decode(String),
}

/// Failures while upserting a call snapshot to the dashboard.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync request could not be sent.
    #[error("dashboard request failed: {0}")]
    Request(String),

    /// The dashboard answered with a non-success status.
    #[error("dashboard returned status {0}")]
    Status(u16),
}
