use {anyhow::Result, async_trait::async_trait};

use crate::types::ReplyPayload;

/// Sink for outbound replies, keyed by channel.
///
/// The dispatcher and handlers send through this seam; the channel layer
/// decides how (and when) the payload actually reaches the platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, channel_id: &str, payload: ReplyPayload) -> Result<()>;
}
