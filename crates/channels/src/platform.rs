use std::sync::Arc;

use {async_trait::async_trait, thiserror::Error, tokio::sync::mpsc};

use outpost_common::{InboundEvent, ReplyPayload};

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform link is gone. The only error class that may escalate
    /// to process shutdown.
    #[error("platform connection lost: {0}")]
    Connection(String),
    #[error("platform send failed: {0}")]
    Send(String),
    #[error("platform not connected")]
    NotConnected,
}

/// A chat-platform connection. One implementation per messaging platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Platform identifier (e.g. "discord", "loopback").
    fn id(&self) -> &str;

    /// Open the connection and hand back the inbound event stream.
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundEvent>, PlatformError>;

    /// Close the connection. Idempotent.
    async fn disconnect(&mut self) -> Result<(), PlatformError>;

    /// Adapter for sending replies.
    fn outbound(&self) -> Arc<dyn Outbound>;

    /// Status adapter for health probes.
    fn status(&self) -> Option<&dyn PlatformStatus> {
        None
    }
}

/// Send replies to a platform channel.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), PlatformError>;

    async fn send_payload(
        &self,
        channel_id: &str,
        payload: &ReplyPayload,
    ) -> Result<(), PlatformError>;
}

/// Probe connection health.
#[async_trait]
pub trait PlatformStatus: Send + Sync {
    async fn probe(&self) -> HealthSnapshot;
}

/// Point-in-time connection health.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub connected: bool,
    pub detail: Option<String>,
}
