use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use {
    outpost_channels::{BatchOpts, BatchSender, Platform},
    outpost_commands::CommandRegistry,
    outpost_common::ReplySink,
    outpost_config::{OutpostConfig, schema::StorageBackend},
    outpost_dispatch::{Dispatcher, DispatcherOpts},
    outpost_extensions::{CoreExtension, ExtensionManager},
    outpost_gateway::HealthState,
    outpost_storage::{FileStore, KvStore, MemoryStore},
};

/// Owns the process lifecycle around one platform connection.
pub struct Supervisor {
    config: OutpostConfig,
    health: Arc<HealthState>,
}

impl Supervisor {
    pub fn new(config: OutpostConfig) -> Self {
        Self {
            config,
            health: HealthState::new(),
        }
    }

    pub fn health(&self) -> Arc<HealthState> {
        Arc::clone(&self.health)
    }

    /// Run until a termination signal arrives.
    pub async fn run(self, platform: Box<dyn Platform>) -> Result<()> {
        self.run_until(platform, shutdown_signal()).await
    }

    /// Run until `shutdown` resolves or the platform connection ends.
    ///
    /// Startup order matters for the health probe: the registry loads
    /// first, then the platform connects, and only then does `/health`
    /// turn green.
    pub async fn run_until(
        self,
        mut platform: Box<dyn Platform>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let config = &self.config;

        let storage = build_storage(config)?;
        let registry = Arc::new(CommandRegistry::new());

        let manager = ExtensionManager::new(Arc::clone(&registry));
        manager
            .load(Arc::new(CoreExtension::new(
                Arc::clone(&registry),
                Arc::clone(&storage),
            )))
            .await
            .context("loading core extension")?;
        self.health.set_registry_loaded();

        let events = platform
            .connect()
            .await
            .context("opening platform connection")?;
        self.health.set_platform_connected(true);
        info!(platform = platform.id(), "platform connected");

        let batcher = Arc::new(BatchSender::new(platform.outbound(), BatchOpts {
            batch_size: config.outbound.batch_size,
            batch_interval: Duration::from_millis(config.outbound.batch_interval_ms),
            max_queue_depth: config.outbound.max_queue_depth,
        }));

        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&batcher) as Arc<dyn ReplySink>,
            DispatcherOpts {
                command_prefix: config.dispatch.command_prefix.clone(),
                handler_timeout: Duration::from_secs(config.dispatch.handler_timeout_secs),
                channel_queue_depth: config.dispatch.channel_queue_depth,
            },
        );

        // Health endpoint on its own task: a stalled handler cannot touch it.
        let gateway = {
            let health = Arc::clone(&self.health);
            let bind = config.gateway.bind.clone();
            let port = config.gateway.port;
            tokio::spawn(async move {
                if let Err(e) = outpost_gateway::serve(&bind, port, health).await {
                    warn!(error = %e, "health gateway exited");
                }
            })
        };

        self.print_banner(registry.len().await);

        let intake_cancel = CancellationToken::new();
        let mut dispatch_run =
            tokio::spawn(Arc::clone(&dispatcher).run(events, intake_cancel.clone()));

        let stream_ended = tokio::select! {
            _ = shutdown => {
                info!("termination signal received, shutting down");
                false
            },
            _ = &mut dispatch_run => {
                // The platform closed the event stream underneath us —
                // connection-level failures escalate to process shutdown.
                warn!("platform event stream ended, shutting down");
                true
            },
        };

        // Stop intake, then let in-flight handlers finish (bounded).
        intake_cancel.cancel();
        if !stream_ended {
            let _ = dispatch_run.await;
        }
        self.health.set_platform_connected(false);

        let drain = Duration::from_secs(config.supervisor.drain_timeout_secs);
        dispatcher.shutdown(drain).await;
        batcher.flush().await;

        if let Err(e) = platform.disconnect().await {
            warn!(error = %e, "platform disconnect failed");
        }
        gateway.abort();

        info!(
            processed = dispatcher.processed(),
            "shutdown complete"
        );
        Ok(())
    }

    fn print_banner(&self, command_count: usize) {
        let lines = [
            format!("outpost v{}", self.health.version),
            format!("mode: {:?}", self.config.mode).to_lowercase(),
            format!("{command_count} commands registered"),
            format!(
                "health on {}:{}",
                self.config.gateway.bind, self.config.gateway.port
            ),
        ];
        let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
        info!("┌{}┐", "─".repeat(width));
        for line in &lines {
            info!("│  {:<w$}│", line, w = width - 2);
        }
        info!("└{}┘", "─".repeat(width));
    }
}

fn build_storage(config: &OutpostConfig) -> Result<Arc<dyn KvStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let path = config
                .storage
                .path
                .clone()
                .unwrap_or_else(|| outpost_config::data_dir().join("state.json"));
            let store = FileStore::open(&path)
                .with_context(|| format!("opening store at {}", path.display()))?;
            Ok(Arc::new(store))
        },
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use {
        outpost_channels::LoopbackPlatform,
        outpost_common::InboundEvent,
        outpost_config::schema::{GatewayConfig, StorageConfig, SupervisorConfig},
        tokio::sync::oneshot,
    };

    fn test_config() -> OutpostConfig {
        OutpostConfig {
            // Port 0 binds an ephemeral port so parallel tests never collide.
            gateway: GatewayConfig {
                bind: "127.0.0.1".into(),
                port: 0,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                path: None,
            },
            supervisor: SupervisorConfig {
                drain_timeout_secs: 2,
            },
            ..OutpostConfig::default()
        }
    }

    #[tokio::test]
    async fn full_lifecycle_ping_pong() {
        let (platform, mut handle) = LoopbackPlatform::new();
        let supervisor = Supervisor::new(test_config());
        let health = supervisor.health();
        assert!(!health.healthy());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(supervisor.run_until(Box::new(platform), async {
            let _ = stop_rx.await;
        }));

        handle
            .inject(InboundEvent::new("c1", "alice", "!ping"))
            .await
            .unwrap();

        let (channel, payload) =
            tokio::time::timeout(Duration::from_secs(5), handle.next_reply())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(channel, "c1");
        assert_eq!(payload.text, "pong");
        assert!(health.healthy());

        stop_tx.send(()).unwrap();
        run.await.unwrap().unwrap();
        assert!(!health.platform_connected());
    }

    #[tokio::test]
    async fn connection_loss_ends_the_run() {
        let (platform, handle) = LoopbackPlatform::new();
        let supervisor = Supervisor::new(test_config());

        let run = tokio::spawn(supervisor.run_until(
            Box::new(platform),
            std::future::pending::<()>(),
        ));

        // Give startup a moment, then sever the platform side.
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
