use {anyhow::Result, async_trait::async_trait};

use crate::context::ExecutionContext;

/// The unit of code executed in response to a resolved command.
///
/// Implementations should watch `ctx.cancelled()` across long awaits so a
/// deadline overrun can wind the invocation down cooperatively.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &ExecutionContext) -> Result<()>;
}

/// Registration metadata for a command.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Identifier, unique within the registry.
    pub name: String,
    pub description: String,
    /// Optional permission tag checked by the platform integration.
    pub permission: Option<String>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            permission: None,
        }
    }

    pub fn with_permission(mut self, tag: impl Into<String>) -> Self {
        self.permission = Some(tag.into());
        self
    }
}
