//! Configuration for the vdisp server.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vdisp_core::StreamSettings;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Call service listener.
    pub network: NetworkConfig,
    /// Encoder settings applied to every display.
    pub stream: StreamConfig,
    /// Idle shutdown.
    pub watchdog: WatchdogConfig,
    /// Bootstrap announcement targets.
    pub announce: AnnounceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the call service binds to. Loopback only in practice.
    pub listen_addr: String,
    /// Outbound packets buffered per client before frames are dropped
    /// and the sink is detached.
    pub callback_queue_depth: usize,
}

/// Encoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub mime_type: String,
    /// Bits per second used when a client asks for no particular bitrate.
    pub default_bitrate: u32,
    pub frame_rate: u32,
    pub keyframe_interval_secs: u32,
}

/// Idle watchdog timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Exit after this long with no call and no attached sink.
    pub idle_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

/// Where to announce the service at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnnounceConfig {
    /// Comma-separated `host:port` list.
    pub targets: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Log file path, appended to. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:27183".into(),
            callback_queue_depth: vdisp_core::network::DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let defaults = StreamSettings::default();
        Self {
            mime_type: defaults.mime_type,
            default_bitrate: defaults.default_bitrate,
            frame_rate: defaults.frame_rate,
            keyframe_interval_secs: defaults.keyframe_interval_secs,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 15_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: "/data/local/tmp/vdisp.log".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
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

    /// Encoder settings for the session manager.
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            mime_type: self.stream.mime_type.clone(),
            default_bitrate: if self.stream.default_bitrate > 0 {
                self.stream.default_bitrate
            } else {
                vdisp_core::display::DEFAULT_BITRATE
            },
            frame_rate: self.stream.frame_rate.max(1),
            keyframe_interval_secs: self.stream.keyframe_interval_secs,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog.idle_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog.poll_interval_ms.max(1))
    }

    /// Announcement targets, trimmed and de-duplicated in order.
    pub fn announce_targets(&self) -> Vec<String> {
        parse_targets(&self.announce.targets)
    }
}

/// Split a comma-separated target list. Entries are trimmed; empty and
/// repeated entries are dropped; first occurrence order is kept.
pub fn parse_targets(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim) {
        if entry.is_empty() || out.iter().any(|t| t == entry) {
            continue;
        }
        out.push(entry.to_string());
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("listen_addr"));
        assert!(text.contains("idle_timeout_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = ServerConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.watchdog.idle_timeout_ms, 15_000);
        assert_eq!(parsed.stream.default_bitrate, 4_000_000);
        assert_eq!(parsed.stream.frame_rate, 30);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: ServerConfig = toml::from_str("[watchdog]\nidle_timeout_ms = 500\n").unwrap();
        assert_eq!(parsed.idle_timeout(), Duration::from_millis(500));
        assert_eq!(parsed.poll_interval(), Duration::from_secs(1));
        assert_eq!(parsed.network.listen_addr, "127.0.0.1:27183");
    }

    #[test]
    fn zero_bitrate_falls_back() {
        let mut cfg = ServerConfig::default();
        cfg.stream.default_bitrate = 0;
        assert_eq!(cfg.stream_settings().default_bitrate, 4_000_000);
    }

    #[test]
    fn targets_are_trimmed_and_deduplicated() {
        assert_eq!(
            parse_targets(" a:1, b:2 ,,a:1, ,c:3"),
            vec!["a:1", "b:2", "c:3"]
        );
        assert!(parse_targets("").is_empty());
        assert!(parse_targets(" , ,").is_empty());
    }
}
