//! TOML-based configuration for the CamNode daemon.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\CamNode\camnode.toml`
//! - Linux:    `~/.config/camnode/camnode.toml`
//! - macOS:    `~/Library/Application Support/CamNode/camnode.toml`
//!
//! Every field has a default, so the daemon runs before a config file exists
//! and keeps working when an older file is missing newer fields. The defaults
//! are group `230.0.0.0`, port `4446`, a 3 second receive window, and the
//! handshake enabled.
//!
//! The file is read once at startup; nothing re-reads it while the daemon
//! runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use camnode_core::DEVICE_ID_MAX;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configured device id does not fit the 12-bit wire field.
    #[error("device id {0} is out of range (0..={DEVICE_ID_MAX})")]
    DeviceIdOutOfRange(u16),

    /// The receive window must be a positive duration.
    #[error("receive timeout must be greater than zero")]
    ZeroReceiveTimeout,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Identity and logging settings for this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Identifier advertised in discovery messages, `0..=4095`.
    #[serde(default = "default_device_id")]
    pub device_id: u16,
    /// `tracing` filter used when `RUST_LOG` is unset: `"error"`, `"warn"`,
    /// `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Multicast discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    /// IPv4 multicast group the node joins and probes.
    #[serde(default = "default_group")]
    pub group: String,
    /// UDP port for the discovery exchange.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Receive window per worker iteration, in milliseconds.
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Whether this node probes for a controller and tracks handshake
    /// completion. Replies to controller probes are sent either way.
    #[serde(default = "default_handshake")]
    pub handshake: bool,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_id() -> u16 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_group() -> String {
    "230.0.0.0".to_string()
}
fn default_port() -> u16 {
    4446
}
fn default_receive_timeout_ms() -> u64 {
    3000
}
fn default_handshake() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            port: default_port(),
            receive_timeout_ms: default_receive_timeout_ms(),
            handshake: default_handshake(),
        }
    }
}

impl AppConfig {
    /// Applies command-line overrides on top of the file-loaded values.
    ///
    /// CLI arguments win over the config file when both are present. Called
    /// before [`validate`](Self::validate), so an out-of-range override is
    /// rejected the same way as an out-of-range file value.
    pub fn apply_overrides(&mut self, device_id: Option<u16>) {
        if let Some(device_id) = device_id {
            self.node.device_id = device_id;
        }
    }

    /// Checks the constraints the schema itself cannot express.
    ///
    /// Called once at startup, after CLI overrides are applied and before
    /// anything is encoded or sent; this is where an out-of-range device id
    /// is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DeviceIdOutOfRange`] or
    /// [`ConfigError::ZeroReceiveTimeout`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.device_id > DEVICE_ID_MAX {
            return Err(ConfigError::DeviceIdOutOfRange(self.node.device_id));
        }
        // `UdpSocket::set_read_timeout` rejects a zero duration.
        if self.discovery.receive_timeout_ms == 0 {
            return Err(ConfigError::ZeroReceiveTimeout);
        }
        Ok(())
    }
}

impl DiscoveryConfig {
    /// The receive window as a [`Duration`].
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full default path of the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("camnode.toml"))
}

/// Loads `AppConfig` from `path`, or from the platform default location when
/// `path` is `None`. A missing file yields `AppConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Resolves the platform config base directory including the CamNode
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("CamNode"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("camnode"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/CamNode
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("CamNode")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
