use std::{sync::Arc, time::Instant};

use {anyhow::Result, tokio_util::sync::CancellationToken};

use outpost_common::{InboundEvent, ReplyPayload, ReplySink};

/// Per-invocation scope handed to a handler: the event, a reply path
/// scoped to the event's channel, and cancellation/deadline controls.
///
/// Owned by the dispatch call that created it and dropped when the handler
/// returns or fails.
pub struct ExecutionContext {
    event: InboundEvent,
    /// Argument tail after the command identifier, already trimmed.
    args: String,
    sink: Arc<dyn ReplySink>,
    deadline: Instant,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        event: InboundEvent,
        args: impl Into<String>,
        sink: Arc<dyn ReplySink>,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            event,
            args: args.into(),
            sink,
            deadline,
            cancel,
        }
    }

    pub fn event(&self) -> &InboundEvent {
        &self.event
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    /// Send a plain-text reply to the channel the event came from.
    pub async fn reply(&self, text: impl Into<String>) -> Result<()> {
        self.sink
            .reply(&self.event.channel_id, ReplyPayload::text(text))
            .await
    }

    /// Send a full payload to the originating channel.
    pub async fn reply_payload(&self, payload: ReplyPayload) -> Result<()> {
        self.sink.reply(&self.event.channel_id, payload).await
    }

    /// Absolute deadline for this invocation.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Token cancelled when the deadline is exceeded or the process drains.
    pub fn cancelled(&self) -> &CancellationToken {
        &self.cancel
    }
}
