use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::OutpostConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["outpost.toml", "outpost.yaml", "outpost.yml", "outpost.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
/// Each call replaces the previous override.
pub fn set_config_dir(path: PathBuf) {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.lock() {
        *guard = Some(path);
    }
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    if let Ok(mut guard) = CONFIG_DIR_OVERRIDE.lock() {
        *guard = None;
    }
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE.lock().ok().and_then(|g| g.clone())
}

/// Load config from the given path (any supported format), with `${VAR}`
/// substitution applied before parsing.
pub fn load_config(path: &Path) -> anyhow::Result<OutpostConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let mut config: OutpostConfig = match ext {
        "toml" => toml::from_str(&raw)?,
        "yaml" | "yml" => serde_yaml::from_str(&raw)?,
        "json" => serde_json::from_str(&raw)?,
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./outpost.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/outpost/outpost.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to defaults (and writes a starter config file) when nothing
/// is found. The `MODE` environment variable always wins over the file.
pub fn discover_and_load() -> OutpostConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, writing default config");
        let mut config = OutpostConfig::default();
        apply_env_overrides(&mut config);
        if let Err(e) = write_default_config(&config) {
            warn!(error = %e, "failed to write default config file");
        }
        return config;
    }
    let mut config = OutpostConfig::default();
    apply_env_overrides(&mut config);
    config
}

/// Apply environment overrides: `MODE` selects the operational profile.
fn apply_env_overrides(config: &mut OutpostConfig) {
    if let Ok(raw) = std::env::var("MODE") {
        match raw.parse() {
            Ok(mode) => config.mode = mode,
            Err(e) => warn!(value = %raw, "ignoring MODE override: {e}"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return CONFIG_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists());
    }

    // Project-local
    if let Some(p) = CONFIG_FILENAMES
        .iter()
        .copied()
        .map(PathBuf::from)
        .find(|p| p.exists())
    {
        return Some(p);
    }

    // User-global: ~/.config/outpost/
    let dir = home_dir()?.join(".config").join("outpost");
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/outpost/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    home_dir().map(|h| h.join(".config").join("outpost"))
}

/// Returns the data directory (log file, file-backed store): `~/.outpost/`.
pub fn data_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".outpost"))
        .unwrap_or_else(|| PathBuf::from(".outpost"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// Write the starter config to the user-global config path.
/// Only called when no config file exists yet.
fn write_default_config(config: &OutpostConfig) -> anyhow::Result<()> {
    let path = config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("outpost.toml");
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))?;
    std::fs::write(&path, &toml_str)?;
    debug!(path = %path.display(), "wrote default config file");
    Ok(())
}

#[cfg(test)]
#[allow(unsafe_code)] // std::env::set_var is unsafe on edition 2024
mod tests {
    use super::*;
    use crate::schema::Mode;

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outpost.toml");
        std::fs::write(&path, "mode = \"development\"\n[gateway]\nport = 9999\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.mode, Mode::Development);
        assert_eq!(cfg.gateway.port, 9999);
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outpost.yaml");
        std::fs::write(&path, "dispatch:\n  command_prefix: \"/\"\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.dispatch.command_prefix, "/");
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outpost.ini");
        std::fs::write(&path, "mode=production").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn substitutes_env_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outpost.toml");
        unsafe { std::env::set_var("OUTPOST_TEST_PREFIX", "?") };
        std::fs::write(
            &path,
            "[dispatch]\ncommand_prefix = \"${OUTPOST_TEST_PREFIX}\"\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.dispatch.command_prefix, "?");
        unsafe { std::env::remove_var("OUTPOST_TEST_PREFIX") };
    }
}
