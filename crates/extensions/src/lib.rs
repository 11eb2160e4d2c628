//! Extension ("cog") system: bundles of related commands loaded and
//! unloaded as a unit through the shared command registry.

pub mod core;
pub mod manager;

pub use {
    core::CoreExtension,
    manager::{Extension, ExtensionError, ExtensionManager},
};
