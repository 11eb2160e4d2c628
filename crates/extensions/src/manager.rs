use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Result,
    async_trait::async_trait,
    thiserror::Error,
    tokio::sync::Mutex,
    tracing::{debug, info},
};

use outpost_commands::{CommandHandler, CommandRegistry, CommandSpec, RegistryError};

/// A dynamically loadable bundle of related commands.
///
/// Extensions declare their commands; the manager does the actual registry
/// work, so every command an extension brought in is removed again when it
/// unloads — even if the extension forgets about one.
#[async_trait]
pub trait Extension: Send + Sync {
    /// Stable extension identifier.
    fn id(&self) -> &str;

    /// The commands this extension provides.
    fn commands(&self) -> Vec<(CommandSpec, Arc<dyn CommandHandler>)>;

    /// Called before the extension's commands are registered.
    async fn on_load(&self) -> Result<()> {
        Ok(())
    }

    /// Called after the extension's commands are unregistered.
    async fn on_unload(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("extension already loaded: {0}")]
    AlreadyLoaded(String),
    #[error("extension not loaded: {0}")]
    NotLoaded(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("extension hook failed: {0}")]
    Hook(#[source] anyhow::Error),
}

struct LoadedExtension {
    extension: Arc<dyn Extension>,
    command_names: Vec<String>,
}

/// Tracks loaded extensions and owns their registry footprint.
///
/// Load and unload are serialized behind one lock, so two loads can never
/// interleave their registrations.
pub struct ExtensionManager {
    registry: Arc<CommandRegistry>,
    loaded: Mutex<HashMap<String, LoadedExtension>>,
}

impl ExtensionManager {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Load an extension: run its hook, then register its commands.
    /// Rolls the registry back if any registration collides.
    pub async fn load(&self, extension: Arc<dyn Extension>) -> Result<(), ExtensionError> {
        let id = extension.id().to_string();
        let mut loaded = self.loaded.lock().await;
        if loaded.contains_key(&id) {
            return Err(ExtensionError::AlreadyLoaded(id));
        }

        extension.on_load().await.map_err(ExtensionError::Hook)?;

        let mut command_names: Vec<String> = Vec::new();
        for (spec, handler) in extension.commands() {
            let name = spec.name.clone();
            if let Err(e) = self.registry.register(spec, handler).await {
                for registered in &command_names {
                    let _ = self.registry.unregister(registered).await;
                }
                return Err(e.into());
            }
            command_names.push(name);
        }

        info!(extension = %id, commands = command_names.len(), "extension loaded");
        loaded.insert(id, LoadedExtension {
            extension,
            command_names,
        });
        Ok(())
    }

    /// Unload an extension, removing every command it registered.
    pub async fn unload(&self, id: &str) -> Result<(), ExtensionError> {
        let mut loaded = self.loaded.lock().await;
        let entry = loaded
            .remove(id)
            .ok_or_else(|| ExtensionError::NotLoaded(id.to_string()))?;

        for name in &entry.command_names {
            if let Err(e) = self.registry.unregister(name).await {
                debug!(extension = %id, command = %name, error = %e, "command already gone");
            }
        }
        entry
            .extension
            .on_unload()
            .await
            .map_err(ExtensionError::Hook)?;

        info!(extension = %id, "extension unloaded");
        Ok(())
    }

    /// Identifiers of currently loaded extensions, sorted.
    pub async fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.loaded.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
