//! Daemon configuration.

use std::path::Path;

use ncp_core::NcpConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Where the NCP is reached.
    pub link: LinkConfig,
    /// Control-core settings.
    pub ncp: NcpConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Link configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// `host:port` of the framed NCP socket.
    pub socket: String,
    /// Heartbeat tick while no deadline is armed, in milliseconds.
    pub idle_tick_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            socket: "127.0.0.1:4901".into(),
            idle_tick_ms: 1_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl DaemonConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&DaemonConfig::default()).unwrap();
        assert!(text.contains("[link]"));
        assert!(text.contains("command_response_timeout_ms"));
        assert!(text.contains("[ncp.phy]"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&DaemonConfig::default()).unwrap();
        let parsed: DaemonConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, DaemonConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: DaemonConfig = toml::from_str(
            r#"
            [link]
            socket = "10.0.0.2:9000"

            [ncp]
            enabled = false
            failure_threshold = 5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.link.socket, "10.0.0.2:9000");
        assert_eq!(parsed.link.idle_tick_ms, 1_000);
        assert!(!parsed.ncp.enabled);
        assert_eq!(parsed.ncp.failure_threshold, 5);
        assert_eq!(parsed.ncp.command_response_timeout_ms, 5_000);
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = DaemonConfig::load(Path::new("/nonexistent/ncpd.toml"));
        assert_eq!(cfg, DaemonConfig::default());
    }
}
