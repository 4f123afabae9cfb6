//! # lyra-server
//!
//! The session orchestrator: an Axum HTTP + WebSocket server that bridges
//! each downstream client to the upstream live-AI service.
//!
//! - `/ws` upgrades into a call session (four pumps, one cancellation scope)
//! - `/terminate` is the beacon hang-up path
//! - `/health` and `/metrics` expose liveness and Prometheus counters
//! - Tool calls, transcript assembly, duration policy, and dashboard sync
//!   run off the session's upstream path

#![deny(unsafe_code)]

pub mod config;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod server;
pub mod session;
pub mod setup;
pub mod store;
pub mod tools;
