//! TOML configuration for the endpoint.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working endpoint that connects to `127.0.0.1:8080` and drives the
//! in-memory pin driver:
//!
//! ```toml
//! [endpoint]
//! log_level = "debug"
//!
//! [network]
//! controller_host = "10.0.0.2"
//! controller_port = 8080
//!
//! [camera]
//! probe_count = 4
//! default_fps = 15
//! idle_poll_ms = 100
//!
//! [chassis]
//! left_pins = [3, 5, 7, 16]
//! right_pins = [15, 19, 21, 23]
//! tick_interval_us = 1000
//! pin_driver = "sysfs"
//!
//! [[chassis.line_map]]
//! header = 3
//! line = 12
//! ```
//!
//! Chassis pins are positions on the 40-pin header.  `line_map` gives the
//! kernel GPIO line behind each one and is only consulted by the sysfs
//! driver.  The default map is the Orange Pi H3 header.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::application::drive_chassis::ChassisSettings;
use crate::application::manage_devices::RegistrySettings;
use crate::infrastructure::network::SessionSettings;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
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

    /// The values parse but cannot be used.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    #[serde(default)]
    pub endpoint: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub chassis: ChassisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    #[serde(default = "default_controller_host")]
    pub controller_host: String,
    #[serde(default = "default_controller_port")]
    pub controller_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraConfig {
    /// Camera ids `0..probe_count` are probed on `GetCameraList`.
    #[serde(default = "default_probe_count")]
    pub probe_count: u8,
    /// Frame rate a newly enumerated camera streams at.
    #[serde(default = "default_fps")]
    pub default_fps: u8,
    /// Capture loop poll interval while no camera is open.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

/// Which [`PinDriver`](crate::application::drive_chassis::PinDriver) to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PinDriverKind {
    /// Record pin writes in memory; no hardware.
    #[default]
    Mock,
    /// Linux `/sys/class/gpio`.
    Sysfs,
}

/// Kernel GPIO line behind one header pin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinLine {
    pub header: u8,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChassisConfig {
    #[serde(default = "default_left_pins")]
    pub left_pins: Vec<u8>,
    #[serde(default = "default_right_pins")]
    pub right_pins: Vec<u8>,
    #[serde(default = "default_tick_interval_us")]
    pub tick_interval_us: u64,
    #[serde(default)]
    pub pin_driver: PinDriverKind,
    #[serde(default = "default_line_map")]
    pub line_map: Vec<PinLine>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_controller_host() -> String {
    "127.0.0.1".to_string()
}
fn default_controller_port() -> u16 {
    8080
}
fn default_probe_count() -> u8 {
    10
}
fn default_fps() -> u8 {
    10
}
fn default_idle_poll_ms() -> u64 {
    100
}
fn default_left_pins() -> Vec<u8> {
    vec![3, 5, 7, 16]
}
fn default_right_pins() -> Vec<u8> {
    vec![15, 19, 21, 23]
}
fn default_tick_interval_us() -> u64 {
    1000
}
fn default_line_map() -> Vec<PinLine> {
    // Orange Pi H3: PA12 PA11 PA6 PC4 / PA3 PC0 PC1 PC2.
    [(3, 12), (5, 11), (7, 6), (16, 68), (15, 3), (19, 64), (21, 65), (23, 66)]
        .into_iter()
        .map(|(header, line)| PinLine { header, line })
        .collect()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            controller_host: default_controller_host(),
            controller_port: default_controller_port(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            probe_count: default_probe_count(),
            default_fps: default_fps(),
            idle_poll_ms: default_idle_poll_ms(),
        }
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            left_pins: default_left_pins(),
            right_pins: default_right_pins(),
            tick_interval_us: default_tick_interval_us(),
            pin_driver: PinDriverKind::default(),
            line_map: default_line_map(),
        }
    }
}

// ── Validation and conversion ─────────────────────────────────────────────────

fn pin_array(name: &str, pins: &[u8]) -> Result<[u8; 4], ConfigError> {
    pins.try_into().map_err(|_| {
        ConfigError::Invalid(format!(
            "chassis.{name} needs exactly 4 pins, got {}",
            pins.len()
        ))
    })
}

impl EndpointConfig {
    /// Rejects values the endpoint cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let left = pin_array("left_pins", &self.chassis.left_pins)?;
        let right = pin_array("right_pins", &self.chassis.right_pins)?;

        let mut seen = BTreeSet::new();
        for pin in left.iter().chain(right.iter()) {
            if !seen.insert(*pin) {
                return Err(ConfigError::Invalid(format!(
                    "chassis pin {pin} is assigned more than once"
                )));
            }
        }

        let mut mapped = BTreeSet::new();
        for entry in &self.chassis.line_map {
            if !mapped.insert(entry.header) {
                return Err(ConfigError::Invalid(format!(
                    "chassis.line_map lists header pin {} more than once",
                    entry.header
                )));
            }
        }
        if self.chassis.pin_driver == PinDriverKind::Sysfs {
            if let Some(pin) = seen.iter().find(|pin| !mapped.contains(*pin)) {
                return Err(ConfigError::Invalid(format!(
                    "chassis pin {pin} has no entry in chassis.line_map"
                )));
            }
        }

        if self.camera.default_fps == 0 {
            return Err(ConfigError::Invalid("camera.default_fps must be at least 1".into()));
        }
        if self.camera.idle_poll_ms == 0 {
            return Err(ConfigError::Invalid("camera.idle_poll_ms must be at least 1".into()));
        }
        if self.chassis.tick_interval_us == 0 {
            return Err(ConfigError::Invalid(
                "chassis.tick_interval_us must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `host:port` of the controller.
    pub fn controller_addr(&self) -> String {
        format!(
            "{}:{}",
            self.network.controller_host, self.network.controller_port
        )
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            probe_count: self.camera.probe_count,
            default_fps: self.camera.default_fps,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            idle_poll: Duration::from_millis(self.camera.idle_poll_ms),
        }
    }

    /// Header pin to kernel GPIO line, for the sysfs driver.
    pub fn line_map(&self) -> BTreeMap<u8, u32> {
        self.chassis
            .line_map
            .iter()
            .map(|entry| (entry.header, entry.line))
            .collect()
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a pin list is not exactly 4 long.
    pub fn chassis_settings(&self) -> Result<ChassisSettings, ConfigError> {
        Ok(ChassisSettings {
            left_pins: pin_array("left_pins", &self.chassis.left_pins)?,
            right_pins: pin_array("right_pins", &self.chassis.right_pins)?,
            tick_interval: Duration::from_micros(self.chassis.tick_interval_us),
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses and validates TOML text.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`] for
/// unusable values.
pub fn parse_config(content: &str) -> Result<EndpointConfig, ConfigError> {
    let config: EndpointConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates the file at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, including when it does
/// not exist.
pub fn load_config(path: &Path) -> Result<EndpointConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file (or no path) yields the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<EndpointConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(EndpointConfig::default());
    };
    match load_config(path) {
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            warn!("config file {} not found, using defaults", path.display());
            Ok(EndpointConfig::default())
        }
        other => other,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
