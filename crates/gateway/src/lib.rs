//! Liveness gateway: a small HTTP server answering orchestrator probes.
//!
//! Served on its own task with nothing shared with the dispatcher beyond
//! two atomic flags, so a stalled handler can never starve a health check.

pub mod health;
pub mod server;

pub use {
    health::HealthState,
    server::{build_app, serve},
};
