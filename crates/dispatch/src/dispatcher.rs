use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    thiserror::Error,
    tokio::{
        sync::{Mutex, mpsc},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    outpost_commands::{CommandRegistry, ExecutionContext},
    outpost_common::{InboundEvent, ReplyPayload, ReplySink},
};

use crate::parse::parse_command;

/// User-visible notice for a failed command. Internals stay in the logs.
const FAILURE_NOTICE: &str = "That command failed. Please try again.";
/// User-visible notice for a command that exceeded its deadline.
const TIMEOUT_NOTICE: &str = "That command took too long and was cancelled.";

/// Terminal state of one dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not addressed to the bot; no handler ran.
    Ignored,
    /// Prefixed like a command but nothing registered under that name.
    UnknownCommand,
    Completed,
    Failed,
    TimedOut,
}

/// A failure inside a handler, isolated to its invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler execution failed: {0}")]
    Execution(#[source] anyhow::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct DispatcherOpts {
    pub command_prefix: String,
    /// Per-invocation deadline.
    pub handler_timeout: Duration,
    /// Bounded depth of each per-channel queue; overflow is dropped.
    pub channel_queue_depth: usize,
}

impl Default for DispatcherOpts {
    fn default() -> Self {
        Self {
            command_prefix: "!".into(),
            handler_timeout: Duration::from_secs(30),
            channel_queue_depth: 64,
        }
    }
}

/// Resolves inbound events against the registry and runs handlers.
///
/// Events from one channel are processed in arrival order by a dedicated
/// worker; channels interleave freely. A handler failure or timeout ends
/// that invocation only — the dispatcher itself never goes down with it.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    sink: Arc<dyn ReplySink>,
    opts: DispatcherOpts,
    channels: Mutex<HashMap<String, mpsc::Sender<InboundEvent>>>,
    workers: Mutex<JoinSet<()>>,
    processed: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<CommandRegistry>,
        sink: Arc<dyn ReplySink>,
        opts: DispatcherOpts,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            sink,
            opts,
            channels: Mutex::new(HashMap::new()),
            workers: Mutex::new(JoinSet::new()),
            processed: AtomicU64::new(0),
        })
    }

    /// Intake loop. Runs until the platform closes the event stream or
    /// `cancel` fires (shutdown).
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("dispatcher intake cancelled");
                    break;
                },
                maybe = events.recv() => match maybe {
                    Some(event) => Self::route(&self, event).await,
                    None => {
                        info!("platform event stream closed");
                        break;
                    },
                },
            }
        }
    }

    /// Hand an event to its channel worker, spawning the worker on first
    /// contact with that channel.
    async fn route(this: &Arc<Self>, event: InboundEvent) {
        let channel_id = event.channel_id.clone();
        let tx = {
            let mut channels = this.channels.lock().await;
            match channels.get(&channel_id) {
                Some(tx) => tx.clone(),
                None => {
                    let (tx, rx) = mpsc::channel(this.opts.channel_queue_depth);
                    let dispatcher = Arc::clone(this);
                    let worker_channel = channel_id.clone();
                    this.workers
                        .lock()
                        .await
                        .spawn(dispatcher.channel_worker(worker_channel, rx));
                    channels.insert(channel_id.clone(), tx.clone());
                    tx
                },
            }
        };

        match tx.try_send(event) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(ev)) => {
                warn!(channel = %channel_id, event = %ev.id, "channel queue full, dropping event");
            },
            Err(mpsc::error::TrySendError::Closed(ev)) => {
                warn!(channel = %channel_id, event = %ev.id, "channel worker gone, dropping event");
            },
        }
    }

    /// Sequential per-channel loop: preserves arrival order within the
    /// channel, exits once the intake side is dropped and the queue drains.
    async fn channel_worker(self: Arc<Self>, channel_id: String, mut rx: mpsc::Receiver<InboundEvent>) {
        debug!(channel = %channel_id, "channel worker started");
        while let Some(event) = rx.recv().await {
            self.dispatch_event(event).await;
        }
        debug!(channel = %channel_id, "channel worker drained");
    }

    /// Run one event through `received → resolved → executing → outcome`.
    pub async fn dispatch_event(&self, event: InboundEvent) -> DispatchOutcome {
        let Some(parsed) = parse_command(&event.body, &self.opts.command_prefix) else {
            return DispatchOutcome::Ignored;
        };

        let Some(command) = self.registry.resolve(&parsed.name).await else {
            debug!(command = %parsed.name, channel = %event.channel_id, "unknown command");
            self.notify(&event.channel_id, format!("Unknown command: {}", parsed.name))
                .await;
            return DispatchOutcome::UnknownCommand;
        };

        let channel_id = event.channel_id.clone();
        let name = parsed.name.clone();
        let cancel = CancellationToken::new();
        let ctx = ExecutionContext::new(
            event,
            parsed.args,
            Arc::clone(&self.sink),
            Instant::now() + self.opts.handler_timeout,
            cancel.clone(),
        );
        debug!(command = %name, channel = %channel_id, "executing command");

        // Each invocation gets its own task so a panic stays contained.
        let handler = Arc::clone(&command.handler);
        let invocation = tokio::spawn(async move { handler.handle(&ctx).await });

        let outcome = match tokio::time::timeout(self.opts.handler_timeout, invocation).await {
            Ok(Ok(Ok(()))) => DispatchOutcome::Completed,
            Ok(Ok(Err(e))) => {
                self.report(&name, &channel_id, HandlerError::Execution(e));
                self.notify(&channel_id, FAILURE_NOTICE).await;
                DispatchOutcome::Failed
            },
            Ok(Err(join_err)) => {
                self.report(&name, &channel_id, HandlerError::Panicked(join_err.to_string()));
                self.notify(&channel_id, FAILURE_NOTICE).await;
                DispatchOutcome::Failed
            },
            Err(_) => {
                // Cooperative cancellation: flip the token and walk away.
                // The invocation task is abandoned, not awaited.
                cancel.cancel();
                warn!(
                    command = %name,
                    channel = %channel_id,
                    timeout_secs = self.opts.handler_timeout.as_secs_f64(),
                    "handler deadline exceeded"
                );
                self.notify(&channel_id, TIMEOUT_NOTICE).await;
                DispatchOutcome::TimedOut
            },
        };

        self.processed.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Events that reached a handler (any outcome) since startup.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Stop routing and drain in-flight channel workers, bounded by
    /// `drain_timeout`. Workers still busy after the deadline are abandoned.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        self.channels.lock().await.clear();

        let mut workers = self.workers.lock().await;
        let deadline = Instant::now() + drain_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, workers.join_next()).await {
                Ok(Some(result)) => {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        warn!(error = %e, "channel worker panicked during drain");
                    }
                },
                Ok(None) => {
                    debug!("all channel workers drained");
                    return;
                },
                Err(_) => break,
            }
        }

        warn!(
            abandoned = workers.len(),
            "drain timeout exceeded, abandoning in-flight handlers"
        );
        workers.abort_all();
    }

    fn report(&self, command: &str, channel_id: &str, error: HandlerError) {
        warn!(command, channel = %channel_id, error = %error, "command failed");
    }

    async fn notify(&self, channel_id: &str, text: impl Into<String>) {
        if let Err(e) = self
            .sink
            .reply(channel_id, ReplyPayload::text(text))
            .await
        {
            warn!(channel = %channel_id, error = %e, "failed to deliver notice");
        }
    }
}
