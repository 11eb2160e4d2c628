use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::Result,
    async_trait::async_trait,
    tokio::{
        sync::{Mutex, mpsc},
        task::JoinHandle,
    },
    tracing::{debug, warn},
};

use outpost_common::{ReplyPayload, ReplySink};

use crate::platform::Outbound;

/// Pacing knobs for outbound batching.
#[derive(Debug, Clone)]
pub struct BatchOpts {
    /// Replies sent back-to-back before pausing.
    pub batch_size: usize,
    /// Pause between batches on a busy channel.
    pub batch_interval: Duration,
    /// Bounded queue depth per channel; overflow is dropped and logged.
    pub max_queue_depth: usize,
}

impl Default for BatchOpts {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval: Duration::from_secs(2),
            max_queue_depth: 100,
        }
    }
}

/// Batches outbound replies per channel so a burst of handler output does
/// not trip platform rate limits. Each channel gets a lazily-spawned worker
/// draining a bounded queue.
pub struct BatchSender {
    outbound: Arc<dyn Outbound>,
    opts: BatchOpts,
    queues: Mutex<HashMap<String, mpsc::Sender<ReplyPayload>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchSender {
    pub fn new(outbound: Arc<dyn Outbound>, opts: BatchOpts) -> Self {
        Self {
            outbound,
            opts,
            queues: Mutex::new(HashMap::new()),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply for `channel_id`. Returns false when the channel's
    /// queue is full and the payload was dropped.
    pub async fn queue(&self, channel_id: &str, payload: ReplyPayload) -> bool {
        let tx = {
            let mut queues = self.queues.lock().await;
            match queues.get(channel_id) {
                Some(tx) => tx.clone(),
                None => {
                    let (tx, rx) = mpsc::channel(self.opts.max_queue_depth);
                    let handle = tokio::spawn(drain_channel(
                        Arc::clone(&self.outbound),
                        self.opts.clone(),
                        channel_id.to_string(),
                        rx,
                    ));
                    self.workers.lock().await.push(handle);
                    queues.insert(channel_id.to_string(), tx.clone());
                    tx
                },
            }
        };

        match tx.try_send(payload) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(channel = %channel_id, "outbound queue full, dropping reply");
                false
            },
            Err(mpsc::error::TrySendError::Closed(payload)) => {
                // Worker was flushed away; start a fresh one and retry once.
                self.queues.lock().await.remove(channel_id);
                Box::pin(self.queue(channel_id, payload)).await
            },
        }
    }

    /// Drain everything still queued and wait for the workers to finish.
    /// Used on shutdown; queueing afterwards spawns fresh workers.
    pub async fn flush(&self) {
        self.queues.lock().await.clear();
        let workers = std::mem::take(&mut *self.workers.lock().await);
        debug!(workers = workers.len(), "flushing outbound queues");
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "outbound worker failed during flush");
            }
        }
    }
}

#[async_trait]
impl ReplySink for BatchSender {
    async fn reply(&self, channel_id: &str, payload: ReplyPayload) -> Result<()> {
        self.queue(channel_id, payload).await;
        Ok(())
    }
}

/// Per-channel worker: pull a batch, send it, pause if the queue is still
/// hot. Exits when the sender side is dropped and the queue runs dry.
async fn drain_channel(
    outbound: Arc<dyn Outbound>,
    opts: BatchOpts,
    channel_id: String,
    mut rx: mpsc::Receiver<ReplyPayload>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while batch.len() < opts.batch_size {
            match rx.try_recv() {
                Ok(payload) => batch.push(payload),
                Err(_) => break,
            }
        }

        for payload in &batch {
            if let Err(e) = outbound.send_payload(&channel_id, payload).await {
                warn!(channel = %channel_id, error = %e, "failed to send reply");
            }
        }

        if !rx.is_empty() {
            tokio::time::sleep(opts.batch_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformError;

    struct RecordingOutbound {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingOutbound {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
            self.send_payload(channel_id, &ReplyPayload::text(text)).await
        }

        async fn send_payload(
            &self,
            channel_id: &str,
            payload: &ReplyPayload,
        ) -> Result<(), PlatformError> {
            self.sent
                .lock()
                .await
                .push((channel_id.to_string(), payload.text.clone()));
            Ok(())
        }
    }

    fn fast_opts() -> BatchOpts {
        BatchOpts {
            batch_size: 10,
            batch_interval: Duration::from_millis(10),
            max_queue_depth: 100,
        }
    }

    #[tokio::test]
    async fn flush_delivers_everything_in_order() {
        let outbound = RecordingOutbound::new();
        let sender = BatchSender::new(Arc::clone(&outbound) as Arc<dyn Outbound>, fast_opts());

        for i in 0..5 {
            assert!(sender.queue("c1", ReplyPayload::text(format!("m{i}"))).await);
        }
        sender.flush().await;

        let sent = outbound.sent.lock().await;
        let texts: Vec<_> = sent.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    /// Outbound whose sends block until released, to pin the worker.
    struct StalledOutbound {
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl Outbound for StalledOutbound {
        async fn send_text(&self, channel_id: &str, text: &str) -> Result<(), PlatformError> {
            self.send_payload(channel_id, &ReplyPayload::text(text)).await
        }

        async fn send_payload(
            &self,
            _channel_id: &str,
            _payload: &ReplyPayload,
        ) -> Result<(), PlatformError> {
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn overflow_is_dropped() {
        let outbound = Arc::new(StalledOutbound {
            release: tokio::sync::Notify::new(),
        });
        let opts = BatchOpts {
            max_queue_depth: 1,
            ..fast_opts()
        };
        let sender = BatchSender::new(Arc::clone(&outbound) as Arc<dyn Outbound>, opts);

        // Worker picks up "a" and blocks inside send_payload.
        assert!(sender.queue("c1", ReplyPayload::text("a")).await);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // "b" fills the single queue slot; "c" has nowhere to go.
        assert!(sender.queue("c1", ReplyPayload::text("b")).await);
        assert!(!sender.queue("c1", ReplyPayload::text("c")).await);

        outbound.release.notify_waiters();
    }

    #[tokio::test]
    async fn channels_get_independent_queues() {
        let outbound = RecordingOutbound::new();
        let sender = BatchSender::new(Arc::clone(&outbound) as Arc<dyn Outbound>, fast_opts());

        sender.queue("c1", ReplyPayload::text("one")).await;
        sender.queue("c2", ReplyPayload::text("two")).await;
        sender.flush().await;

        let sent = outbound.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|(c, t)| c == "c1" && t == "one"));
        assert!(sent.iter().any(|(c, t)| c == "c2" && t == "two"));
    }

    #[tokio::test]
    async fn queueing_after_flush_restarts_workers() {
        let outbound = RecordingOutbound::new();
        let sender = BatchSender::new(Arc::clone(&outbound) as Arc<dyn Outbound>, fast_opts());

        sender.queue("c1", ReplyPayload::text("before")).await;
        sender.flush().await;
        sender.queue("c1", ReplyPayload::text("after")).await;
        sender.flush().await;

        let sent = outbound.sent.lock().await;
        assert_eq!(sent.len(), 2);
    }
}
