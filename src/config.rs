//! Run configuration, read once at startup from a YAML file.

use crate::adb::BackendKind;
use crate::game_automation::match_image::config::{apply_overrides, validate_screens};
use crate::game_automation::match_image::{ScreenOverride, ScreenSpec, create_default_screens};
use crate::game_automation::types::ScreenState;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_PACKAGE: &str = "com.bandainamcoent.idolmaster_gakuen";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AdbConfig {
    pub server: ServerConfig,
    pub device_serial: String,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl AdbConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Stage bounds, in seconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    pub detect_credit_screen: u64,
    pub detect_setup_screen: u64,
    pub gakuen_running: u64,
    pub download_start: u64,
    pub download_finish: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            detect_credit_screen: 60,
            detect_setup_screen: 120,
            gakuen_running: 120,
            download_start: 120,
            download_finish: 1800,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Screenshots and templates are shrunk by this factor before matching
    pub downscale: u32,
    pub default_threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            downscale: 4,
            default_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Same panel, either orientation.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        (self.width, self.height) == (width, height) || (self.width, self.height) == (height, width)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    /// `user_rotation` to pin before the run; `null` leaves rotation alone
    pub rotation: Option<u8>,
    pub expected_resolution: Option<Resolution>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            rotation: Some(3),
            expected_resolution: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    pub adb: AdbConfig,
    #[serde(default = "default_package")]
    pub package: String,
    /// Template images; relative paths resolve against the working directory
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default)]
    pub uninstall: bool,
    #[serde(default = "enabled")]
    pub install: bool,
    #[serde(default = "enabled")]
    pub wait_for_download: bool,
    #[serde(default = "enabled")]
    pub exit_when_done: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub screens: BTreeMap<ScreenState, ScreenOverride>,
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_package() -> String {
    DEFAULT_PACKAGE.to_string()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Read, parse and validate `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.adb.server.host.trim().is_empty() {
            return invalid("adb.server.host must not be empty");
        }
        if self.adb.server.port == 0 {
            return invalid("adb.server.port must not be 0");
        }
        if self.adb.device_serial.trim().is_empty() {
            return invalid("adb.device_serial must not be empty");
        }
        if self.adb.command_timeout_secs == 0 {
            return invalid("adb.command_timeout_secs must be positive");
        }
        if self.package.trim().is_empty() {
            return invalid("package must not be empty");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be positive");
        }
        if self.matching.downscale == 0 {
            return invalid("matching.downscale must be at least 1");
        }
        let t = self.matching.default_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return invalid("matching.default_threshold must be in (0, 1]");
        }
        if self.device.rotation.is_some_and(|r| r > 3) {
            return invalid("device.rotation must be 0, 1, 2 or 3");
        }
        if self.screens.contains_key(&ScreenState::Unknown) {
            return invalid("screens.unknown cannot be configured");
        }
        validate_screens(&self.screens()).map_err(ConfigError::Invalid)
    }

    /// Built-in screen table with this config's overrides applied.
    pub fn screens(&self) -> Vec<ScreenSpec> {
        apply_overrides(
            create_default_screens(self.matching.default_threshold),
            &self.screens,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
