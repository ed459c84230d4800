//! Configuration file support for rfunit.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (RFUNIT_*)
//! 3. Local config file (./rfunit.toml)
//! 4. Global config file (~/.config/rfunit/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use rfunit::RfUnitConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default dump output file.
pub const DEFAULT_DUMP_FILE: &str = "dump.bin";
/// Default flash input file.
pub const DEFAULT_FLASH_FILE: &str = "flash.bin";

/// Bus configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    /// I2C character device (e.g., "/dev/i2c-1").
    pub device: Option<String>,
    /// Transport backend name ("linux" or "dummy").
    pub transport: Option<String>,
    /// 7-bit device address.
    pub address: Option<u8>,
}

/// Default file locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Where dumps are written.
    pub dump: Option<PathBuf>,
    /// Image flashed by `auto`.
    pub flash: Option<PathBuf>,
}

/// Timing overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Fixed wait after the bootloader entry command, in seconds.
    pub boot_wait_secs: Option<u64>,
    /// Heartbeat interval during that wait, in seconds.
    pub heartbeat_secs: Option<u64>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Bus configuration.
    #[serde(default)]
    pub bus: BusConfig,
    /// File locations.
    #[serde(default)]
    pub files: FilesConfig,
    /// Timing overrides.
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("rfunit.toml")) {
            debug!("Loaded local config from rfunit.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rfunit").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.bus.device.is_some() {
            self.bus.device = other.bus.device;
        }
        if other.bus.transport.is_some() {
            self.bus.transport = other.bus.transport;
        }
        if other.bus.address.is_some() {
            self.bus.address = other.bus.address;
        }

        if other.files.dump.is_some() {
            self.files.dump = other.files.dump;
        }
        if other.files.flash.is_some() {
            self.files.flash = other.files.flash;
        }

        if other.timing.boot_wait_secs.is_some() {
            self.timing.boot_wait_secs = other.timing.boot_wait_secs;
        }
        if other.timing.heartbeat_secs.is_some() {
            self.timing.heartbeat_secs = other.timing.heartbeat_secs;
        }
    }

    /// Dump output path.
    pub fn dump_path(&self) -> PathBuf {
        self.files
            .dump
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DUMP_FILE))
    }

    /// Flash input path.
    pub fn flash_path(&self) -> PathBuf {
        self.files
            .flash
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FLASH_FILE))
    }

    /// Apply timing overrides on top of a controller configuration.
    pub fn apply_timing(&self, mut unit: RfUnitConfig) -> RfUnitConfig {
        if let Some(secs) = self.timing.boot_wait_secs {
            unit = unit.with_boot_wait(Duration::from_secs(secs));
        }
        if let Some(secs) = self.timing.heartbeat_secs {
            unit = unit.with_heartbeat(Duration::from_secs(secs));
        }
        unit
    }
}
