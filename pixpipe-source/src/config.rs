//! Configuration for the frame source.

use std::path::Path;
use std::time::Duration;

use pixpipe_core::SessionConfig;
use serde::{Deserialize, Serialize};

use crate::pattern::Pattern;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Frame dimensions and mode flags. Viewers must use the same values.
    pub session: SessionConfig,
    /// Frame generation.
    pub stream: StreamConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept viewers on.
    pub listen_address: String,
    /// Give up on a viewer that has not acknowledged for this long. 0 = never.
    pub ack_timeout_ms: u64,
}

/// Frame generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Upper bound on frames per second. 0 = as fast as the viewer acks.
    pub max_fps: u32,
    /// Test pattern to render.
    pub pattern: Pattern,
    /// Stop a session after this many frames. 0 = unlimited.
    pub frame_limit: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:7420".into(),
            ack_timeout_ms: 30_000,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_fps: 30,
            pattern: Pattern::default(),
            frame_limit: 0,
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

impl SourceConfig {
    /// Load from a TOML file, falling back to defaults.
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

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Minimum spacing between frames.
    pub fn frame_interval(&self) -> Option<Duration> {
        match self.stream.max_fps {
            0 => None,
            fps => Some(Duration::from_nanos(1_000_000_000 / fps as u64)),
        }
    }

    pub fn ack_timeout(&self) -> Option<Duration> {
        match self.network.ack_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&SourceConfig::default()).unwrap();
        assert!(text.contains("listen_address"));
        assert!(text.contains("pattern = \"gradient\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&SourceConfig::default()).unwrap();
        let parsed: SourceConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.listen_address, "0.0.0.0:7420");
        assert_eq!(parsed.session, SessionConfig::default());
        assert_eq!(parsed.stream.max_fps, 30);
    }

    #[test]
    fn frame_interval_from_fps() {
        let mut cfg = SourceConfig::default();
        cfg.stream.max_fps = 50;
        assert_eq!(cfg.frame_interval(), Some(Duration::from_millis(20)));
        cfg.stream.max_fps = 0;
        assert_eq!(cfg.frame_interval(), None);
    }

    #[test]
    fn write_default_then_load() {
        let path = std::env::temp_dir().join(format!("pixpipe-source-{}.toml", std::process::id()));
        SourceConfig::write_default(&path).unwrap();
        let cfg = SourceConfig::load(&path);
        assert_eq!(cfg.stream.pattern, Pattern::Gradient);
        std::fs::remove_file(&path).unwrap();
    }
}
