//! Session lifecycle: state, registry, and the per-session pump set.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `call` | Per-call state (queues, transcript assembler, policy, flags) |
//! | `registry` | Process-wide id → session map (beacon cancellation path) |
//! | `downstream` | Client envelope dispatch → upstream translation |
//! | `upstream` | Upstream message processing (forward, tools, transcript) |
//! | `supervisor` | Accept path, the four pumps, graceful drain, cleanup |
//!
//! ## Data flow
//!
//! client socket → `downstream` → `to_upstream` queue → upstream writer.
//! upstream socket → `upstream` (raw forward first) → `to_client` queue →
//! client writer. Tool calls and dashboard checkpoints run as detached
//! tasks off the upstream path.

pub mod call;
pub mod downstream;
pub mod registry;
pub mod supervisor;
pub mod upstream;

use std::time::Duration;

use crate::dashboard::DashboardClient;
use crate::store::ConfigStore;

/// Shared collaborators handed to every session pump.
#[derive(Clone)]
pub struct SessionServices {
    /// Tenant configuration reads.
    pub store: ConfigStore,
    /// Call-state sync (also hosts the knowledge-search endpoint).
    pub dashboard: DashboardClient,
    /// Process-wide HTTP client for tool calls.
    pub http: reqwest::Client,
    /// Downstream ping cadence.
    pub ping_interval: Duration,
    /// Cap on the graceful client-queue drain.
    pub drain_timeout: Duration,
}
