//! # lyra-core
//!
//! Foundation types and utilities shared by the lyra orchestrator crates:
//!
//! - **Call model**: `Utterance`, `Role`, `CallStatus`, `CallSnapshot`, the
//!   transcript and dashboard-sync vocabulary
//! - **Agent configuration**: `AgentConfig` with field-by-field fallbacks
//! - **Errors**: `SessionError`, `ToolError`, `SyncError` via `thiserror`
//! - **IDs**: session and utterance id helpers
//! - **Logging**: `tracing` subscriber bootstrap

#![deny(unsafe_code)]

pub mod agent_config;
pub mod call;
pub mod errors;
pub mod ids;
pub mod logging;

pub use agent_config::AgentConfig;
pub use call::{CallSnapshot, CallStatus, Role, Utterance};
pub use errors::{SessionError, SyncError, ToolError};
