use std::{path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutpostConfig {
    pub mode: Mode,
    pub gateway: GatewayConfig,
    pub dispatch: DispatchConfig,
    pub supervisor: SupervisorConfig,
    pub outbound: OutboundConfig,
    pub storage: StorageConfig,
}

/// Operational profile. `MODE=development` attaches the loopback platform
/// and a stdin console; production expects a real platform integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Health endpoint bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Prefix marking a message body as a command invocation.
    pub command_prefix: String,
    /// Per-invocation deadline in seconds.
    pub handler_timeout_secs: u64,
    /// Bounded depth of each per-channel event queue.
    pub channel_queue_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_prefix: "!".into(),
            handler_timeout_secs: 30,
            channel_queue_depth: 64,
        }
    }
}

/// Shutdown drain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long to wait for in-flight handlers before abandoning them.
    pub drain_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Outbound reply batching, per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Replies sent back-to-back before pausing.
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    pub batch_interval_ms: u64,
    /// Queued replies per channel before new ones are dropped.
    pub max_queue_depth: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval_ms: 2000,
            max_queue_depth: 100,
        }
    }
}

/// Key-value store backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File path for the `file` backend. Defaults to `state.json` under the
    /// data directory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = OutpostConfig::default();
        assert_eq!(cfg.mode, Mode::Production);
        assert_eq!(cfg.dispatch.command_prefix, "!");
        assert!(cfg.dispatch.handler_timeout_secs > 0);
        assert!(cfg.supervisor.drain_timeout_secs > 0);
    }

    #[test]
    fn mode_parses_aliases() {
        assert_eq!("dev".parse::<Mode>().unwrap(), Mode::Development);
        assert_eq!("PRODUCTION".parse::<Mode>().unwrap(), Mode::Production);
        assert!("staging".parse::<Mode>().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: OutpostConfig = toml::from_str(
            r#"
            mode = "development"

            [dispatch]
            command_prefix = "."
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Development);
        assert_eq!(cfg.dispatch.command_prefix, ".");
        assert_eq!(cfg.dispatch.handler_timeout_secs, 30);
        assert_eq!(cfg.gateway.port, 8080);
    }
}
