//! Command handling: the handler trait, per-invocation execution context,
//! and the registry mapping command identifiers to handlers.

pub mod context;
pub mod handler;
pub mod registry;

pub use {
    context::ExecutionContext,
    handler::{CommandHandler, CommandSpec},
    registry::{CommandRegistry, RegisteredCommand, RegistryError},
};
