//! Platform connection layer.
//!
//! The chat platform is an external collaborator behind the [`Platform`]
//! trait: it delivers inbound events and accepts replies, and owns its own
//! reconnection behavior. A loopback implementation ships for development
//! and tests, and the batched sender paces outbound replies per channel.

pub mod batch;
pub mod loopback;
pub mod platform;

pub use {
    batch::{BatchOpts, BatchSender},
    loopback::{LoopbackHandle, LoopbackInjector, LoopbackPlatform},
    platform::{HealthSnapshot, Outbound, Platform, PlatformError, PlatformStatus},
};
