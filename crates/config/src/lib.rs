//! Configuration: schema types, file discovery, and environment handling.
//!
//! Config lives in `outpost.{toml,yaml,yml,json}`, found project-local first
//! and then under `~/.config/outpost/`. String values may carry `${VAR}`
//! placeholders resolved from the environment, and the `MODE` variable
//! overrides the configured operational profile.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, data_dir, discover_and_load, load_config, set_config_dir},
    schema::{Mode, OutpostConfig},
};
