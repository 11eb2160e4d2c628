use std::{collections::HashMap, sync::Arc};

use {thiserror::Error, tokio::sync::RwLock, tracing::debug};

use crate::handler::{CommandHandler, CommandSpec};

/// A command as held by the registry: its metadata plus the handler.
pub struct RegisteredCommand {
    pub spec: CommandSpec,
    pub handler: Arc<dyn CommandHandler>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("command already registered: {0}")]
    DuplicateCommand(String),
    #[error("command not registered: {0}")]
    NotFound(String),
}

/// Maps command identifiers to handlers.
///
/// Mutations go through the write lock, so two registrations can never race
/// on the same identifier and `resolve` never observes a half-applied
/// change. Resolution takes the read lock and stays cheap on the hot path.
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, Arc<RegisteredCommand>>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under `spec.name`.
    pub async fn register(
        &self,
        spec: CommandSpec,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RegistryError> {
        let name = spec.name.clone();
        let mut commands = self.commands.write().await;
        if commands.contains_key(&name) {
            return Err(RegistryError::DuplicateCommand(name));
        }
        debug!(command = %name, "registering command");
        commands.insert(name, Arc::new(RegisteredCommand { spec, handler }));
        Ok(())
    }

    /// Remove a command by identifier.
    pub async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let mut commands = self.commands.write().await;
        if commands.remove(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        debug!(command = %name, "unregistered command");
        Ok(())
    }

    /// Resolve an identifier to its command. `None` means "no such
    /// command" — not an error, so the dispatch hot path stays cheap.
    pub async fn resolve(&self, name: &str) -> Option<Arc<RegisteredCommand>> {
        self.commands.read().await.get(name).map(Arc::clone)
    }

    /// Sorted identifiers of all registered commands.
    pub async fn command_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.commands.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Metadata of all registered commands, sorted by identifier.
    pub async fn specs(&self) -> Vec<CommandSpec> {
        let mut specs: Vec<_> = self
            .commands
            .read()
            .await
            .values()
            .map(|c| c.spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub async fn len(&self) -> usize {
        self.commands.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.commands.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use {anyhow::Result, async_trait::async_trait};

    use crate::context::ExecutionContext;

    struct NoopHandler;

    #[async_trait]
    impl CommandHandler for NoopHandler {
        async fn handle(&self, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    fn spec(name: &str) -> CommandSpec {
        CommandSpec::new(name, "test command")
    }

    #[tokio::test]
    async fn resolve_reflects_registered_set() {
        let registry = CommandRegistry::new();
        registry
            .register(spec("ping"), Arc::new(NoopHandler))
            .await
            .unwrap();
        registry
            .register(spec("help"), Arc::new(NoopHandler))
            .await
            .unwrap();

        assert!(registry.resolve("ping").await.is_some());
        assert!(registry.resolve("help").await.is_some());
        assert!(registry.resolve("missing").await.is_none());
        assert_eq!(registry.command_names().await, vec!["help", "ping"]);

        registry.unregister("ping").await.unwrap();
        assert!(registry.resolve("ping").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let registry = CommandRegistry::new();
        registry
            .register(spec("ping"), Arc::new(NoopHandler))
            .await
            .unwrap();

        let err = registry
            .register(spec("ping"), Arc::new(NoopHandler))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand(name) if name == "ping"));

        // The original registration is untouched.
        assert!(registry.resolve("ping").await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn unregister_missing_fails() {
        let registry = CommandRegistry::new();
        let err = registry.unregister("ghost").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(name) if name == "ghost"));
    }

    #[tokio::test]
    async fn concurrent_reads_share_the_lock() {
        let registry = Arc::new(CommandRegistry::new());
        registry
            .register(spec("ping"), Arc::new(NoopHandler))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let reg = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                reg.resolve("ping").await.is_some()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
    }
}
