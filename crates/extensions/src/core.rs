use std::{sync::Arc, time::Instant};

use {anyhow::Result, async_trait::async_trait, tracing::debug};

use {
    outpost_commands::{CommandHandler, CommandRegistry, CommandSpec, ExecutionContext},
    outpost_storage::KvStore,
};

const STATUS_CHECKS_KEY: &str = "core.status_checks";

/// Built-in extension: the infrastructure commands every deployment gets.
pub struct CoreExtension {
    registry: Arc<CommandRegistry>,
    storage: Arc<dyn KvStore>,
    started_at: Instant,
}

impl CoreExtension {
    pub fn new(registry: Arc<CommandRegistry>, storage: Arc<dyn KvStore>) -> Self {
        Self {
            registry,
            storage,
            started_at: Instant::now(),
        }
    }
}

impl crate::manager::Extension for CoreExtension {
    fn id(&self) -> &str {
        "core"
    }

    fn commands(&self) -> Vec<(CommandSpec, Arc<dyn CommandHandler>)> {
        vec![
            (
                CommandSpec::new("ping", "Check that the bot is responding"),
                Arc::new(PingHandler) as Arc<dyn CommandHandler>,
            ),
            (
                CommandSpec::new("echo", "Repeat the given text"),
                Arc::new(EchoHandler) as Arc<dyn CommandHandler>,
            ),
            (
                CommandSpec::new("help", "List available commands"),
                Arc::new(HelpHandler {
                    registry: Arc::clone(&self.registry),
                }) as Arc<dyn CommandHandler>,
            ),
            (
                CommandSpec::new("status", "Show bot uptime and counters"),
                Arc::new(StatusHandler {
                    registry: Arc::clone(&self.registry),
                    storage: Arc::clone(&self.storage),
                    started_at: self.started_at,
                }) as Arc<dyn CommandHandler>,
            ),
        ]
    }
}

struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<()> {
        ctx.reply("pong").await
    }
}

struct EchoHandler;

#[async_trait]
impl CommandHandler for EchoHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<()> {
        let args = ctx.args();
        if args.is_empty() {
            ctx.reply("Usage: echo <text>").await
        } else {
            ctx.reply(args).await
        }
    }
}

struct HelpHandler {
    registry: Arc<CommandRegistry>,
}

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<()> {
        let specs = self.registry.specs().await;
        let mut lines = vec![format!("{} commands available:", specs.len())];
        for spec in specs {
            lines.push(format!("  {} — {}", spec.name, spec.description));
        }
        ctx.reply(lines.join("\n")).await
    }
}

struct StatusHandler {
    registry: Arc<CommandRegistry>,
    storage: Arc<dyn KvStore>,
    started_at: Instant,
}

#[async_trait]
impl CommandHandler for StatusHandler {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<()> {
        let checks = match self.storage.get(STATUS_CHECKS_KEY).await {
            Ok(Some(v)) => v.as_u64().unwrap_or(0) + 1,
            _ => 1,
        };
        if let Err(e) = self
            .storage
            .put(STATUS_CHECKS_KEY, serde_json::json!(checks))
            .await
        {
            debug!(error = %e, "failed to persist status counter");
        }

        let uptime = self.started_at.elapsed().as_secs();
        let commands = self.registry.len().await;
        ctx.reply(format!(
            "Up {uptime}s, {commands} commands registered, {checks} status checks served."
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use {
        crate::manager::ExtensionManager,
        outpost_common::{InboundEvent, ReplyPayload, ReplySink},
        outpost_storage::MemoryStore,
        std::time::Duration,
        tokio::sync::Mutex,
        tokio_util::sync::CancellationToken,
    };

    struct CollectingSink {
        replies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplySink for CollectingSink {
        async fn reply(&self, _channel_id: &str, payload: ReplyPayload) -> Result<()> {
            self.replies.lock().await.push(payload.text);
            Ok(())
        }
    }

    fn ctx_for(body: &str, args: &str, sink: Arc<CollectingSink>) -> ExecutionContext {
        ExecutionContext::new(
            InboundEvent::new("c1", "alice", body),
            args,
            sink,
            Instant::now() + Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    async fn loaded_core() -> (Arc<CommandRegistry>, Arc<MemoryStore>) {
        let registry = Arc::new(CommandRegistry::new());
        let storage = Arc::new(MemoryStore::new());
        let manager = ExtensionManager::new(Arc::clone(&registry));
        manager
            .load(Arc::new(CoreExtension::new(
                Arc::clone(&registry),
                Arc::clone(&storage) as Arc<dyn KvStore>,
            )))
            .await
            .unwrap();
        (registry, storage)
    }

    #[tokio::test]
    async fn core_registers_expected_commands() {
        let (registry, _storage) = loaded_core().await;
        assert_eq!(
            registry.command_names().await,
            vec!["echo", "help", "ping", "status"]
        );
    }

    #[tokio::test]
    async fn ping_replies_pong() {
        let (registry, _storage) = loaded_core().await;
        let sink = Arc::new(CollectingSink {
            replies: Mutex::new(Vec::new()),
        });

        let command = registry.resolve("ping").await.unwrap();
        command
            .handler
            .handle(&ctx_for("!ping", "", Arc::clone(&sink)))
            .await
            .unwrap();

        assert_eq!(*sink.replies.lock().await, vec!["pong"]);
    }

    #[tokio::test]
    async fn echo_without_args_prints_usage() {
        let (registry, _storage) = loaded_core().await;
        let sink = Arc::new(CollectingSink {
            replies: Mutex::new(Vec::new()),
        });

        let command = registry.resolve("echo").await.unwrap();
        command
            .handler
            .handle(&ctx_for("!echo", "", Arc::clone(&sink)))
            .await
            .unwrap();

        assert!(sink.replies.lock().await[0].starts_with("Usage:"));
    }

    #[tokio::test]
    async fn help_lists_every_command() {
        let (registry, _storage) = loaded_core().await;
        let sink = Arc::new(CollectingSink {
            replies: Mutex::new(Vec::new()),
        });

        let command = registry.resolve("help").await.unwrap();
        command
            .handler
            .handle(&ctx_for("!help", "", Arc::clone(&sink)))
            .await
            .unwrap();

        let text = sink.replies.lock().await[0].clone();
        for name in ["echo", "help", "ping", "status"] {
            assert!(text.contains(name), "help output missing {name}");
        }
    }

    #[tokio::test]
    async fn status_counts_checks_in_storage() {
        let (registry, storage) = loaded_core().await;
        let sink = Arc::new(CollectingSink {
            replies: Mutex::new(Vec::new()),
        });

        let command = registry.resolve("status").await.unwrap();
        for _ in 0..2 {
            command
                .handler
                .handle(&ctx_for("!status", "", Arc::clone(&sink)))
                .await
                .unwrap();
        }

        assert_eq!(
            storage.get(STATUS_CHECKS_KEY).await.unwrap(),
            Some(serde_json::json!(2))
        );
        assert!(sink.replies.lock().await[1].contains("2 status checks"));
    }
}
