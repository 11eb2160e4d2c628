use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    async_trait::async_trait,
    tokio::sync::{Mutex, mpsc},
    tracing::debug,
};

use outpost_common::{InboundEvent, ReplyPayload};

use crate::platform::{HealthSnapshot, Outbound, Platform, PlatformError, PlatformStatus};

const EVENT_BUFFER: usize = 256;

/// In-process platform: events are injected through a [`LoopbackHandle`]
/// and replies come back out of it. Backs the development profile and the
/// integration tests; no network involved.
///
/// Only the handle holds the event sender, so dropping the handle closes
/// the stream — the loopback equivalent of losing the connection.
pub struct LoopbackPlatform {
    connected: Arc<AtomicBool>,
    event_rx: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    outbound: Arc<LoopbackOutbound>,
}

/// Test/development-side handle: inject events, observe replies.
pub struct LoopbackHandle {
    event_tx: mpsc::Sender<InboundEvent>,
    reply_rx: mpsc::UnboundedReceiver<(String, ReplyPayload)>,
}

impl LoopbackHandle {
    /// Inject an inbound event as if the platform had delivered it.
    pub async fn inject(&self, event: InboundEvent) -> Result<(), PlatformError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| PlatformError::Connection(e.to_string()))
    }

    /// A cloneable injection-only handle, for when reply consumption and
    /// event injection live on different tasks.
    pub fn injector(&self) -> LoopbackInjector {
        LoopbackInjector {
            event_tx: self.event_tx.clone(),
        }
    }

    /// Next (channel_id, payload) reply sent by the bot, if any.
    pub async fn next_reply(&mut self) -> Option<(String, ReplyPayload)> {
        self.reply_rx.recv().await
    }
}

/// Injection-only side of a [`LoopbackHandle`].
#[derive(Clone)]
pub struct LoopbackInjector {
    event_tx: mpsc::Sender<InboundEvent>,
}

impl LoopbackInjector {
    pub async fn inject(&self, event: InboundEvent) -> Result<(), PlatformError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|e| PlatformError::Connection(e.to_string()))
    }
}

struct LoopbackOutbound {
    connected: Arc<AtomicBool>,
    reply_tx: mpsc::UnboundedSender<(String, ReplyPayload)>,
}

impl LoopbackPlatform {
    pub fn new() -> (Self, LoopbackHandle) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let platform = Self {
            connected: Arc::clone(&connected),
            event_rx: Mutex::new(Some(event_rx)),
            outbound: Arc::new(LoopbackOutbound {
                connected,
                reply_tx,
            }),
        };
        let handle = LoopbackHandle { event_tx, reply_rx };
        (platform, handle)
    }
}

#[async_trait]
impl Platform for LoopbackPlatform {
    fn id(&self) -> &str {
        "loopback"
    }

    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundEvent>, PlatformError> {
        let rx = self
            .event_rx
            .lock()
            .await
            .take()
            .ok_or(PlatformError::Connection("already connected".into()))?;
        self.connected.store(true, Ordering::SeqCst);
        debug!("loopback platform connected");
        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<(), PlatformError> {
        self.connected.store(false, Ordering::SeqCst);
        debug!("loopback platform disconnected");
        Ok(())
    }

    fn outbound(&self) -> Arc<dyn Outbound> {
        Arc::clone(&self.outbound) as Arc<dyn Outbound>
    }

    fn status(&self) -> Option<&dyn PlatformStatus> {
        Some(self.outbound.as_ref())
    }
}

#[async_trait]
impl Outbound for LoopbackOutbound {
    async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
        self.send_payload(channel_id, &ReplyPayload::text(text))
            .await
    }

    async fn send_payload(
        &self,
        channel_id: &str,
        payload: &ReplyPayload,
    ) -> Result<(), PlatformError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PlatformError::NotConnected);
        }
        self.reply_tx
            .send((channel_id.to_string(), payload.clone()))
            .map_err(|e| PlatformError::Send(e.to_string()))
    }
}

#[async_trait]
impl PlatformStatus for LoopbackOutbound {
    async fn probe(&self) -> HealthSnapshot {
        HealthSnapshot {
            connected: self.connected.load(Ordering::SeqCst),
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_in_and_replies_flow_out() {
        let (mut platform, mut handle) = LoopbackPlatform::new();
        let mut events = platform.connect().await.unwrap();

        handle
            .inject(InboundEvent::new("c1", "user", "hi"))
            .await
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.channel_id, "c1");
        assert_eq!(event.body, "hi");

        platform.outbound().send_text("c1", "hello").await.unwrap();
        let (channel, payload) = handle.next_reply().await.unwrap();
        assert_eq!(channel, "c1");
        assert_eq!(payload.text, "hello");
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let (platform, _handle) = LoopbackPlatform::new();
        let err = platform.outbound().send_text("c1", "x").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotConnected));
    }

    #[tokio::test]
    async fn second_connect_fails() {
        let (mut platform, _handle) = LoopbackPlatform::new();
        let _rx = platform.connect().await.unwrap();
        assert!(platform.connect().await.is_err());
    }
}
