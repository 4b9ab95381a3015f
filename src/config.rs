//! Configuration for the `rawterm` binary.
//!
//! The library itself takes no configuration; this is the terminal tool's
//! TOML schema, file resolution and environment overrides.

use crate::port::traits::{Handshake, Mode, Parity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "rawterm.toml";
const CONFIG_PATH_ENV: &str = "RAWTERM_CONFIG";
const DEVICE_ENV: &str = "RAWTERM_DEVICE";
const BAUD_ENV: &str = "RAWTERM_BAUD";

/// Errors from loading the `rawterm` configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file that was explicitly requested or found
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Environment override did not parse
    #[error("failed to parse environment variable '{var}': {message}")]
    EnvParse { var: &'static str, message: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration for `rawterm`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device to open; auto-discovered when absent
    pub device: Option<String>,
    /// Line parameters applied after open
    pub line: LineConfig,
    /// Read policy installed after open; the port default when absent
    pub read: Option<ReadConfig>,
}

/// Line-parameter section, mirroring [`Mode`] field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Baud rate in bits per second
    pub baud: u32,
    /// Data bits per character (5 to 8)
    pub data_bits: u8,
    /// Parity scheme
    pub parity: Parity,
    /// Stop bits (1 or 2)
    pub stop_bits: u8,
    /// Flow control
    pub handshake: Handshake,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud: 38_400,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            handshake: Handshake::None,
        }
    }
}

impl LineConfig {
    /// Translate into the library's line-parameter type.
    pub fn to_mode(&self) -> Mode {
        Mode {
            baud_rate: self.baud,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            handshake: self.handshake,
        }
    }
}

/// Read-policy section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    /// Minimum bytes a read waits for (POSIX only)
    pub min_bytes: usize,
    /// Read timeout in milliseconds; 0 blocks until data
    pub timeout_ms: u64,
}

impl ReadConfig {
    /// The timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration using the standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `explicit` path from the command line
    /// 2. `RAWTERM_CONFIG` environment variable
    /// 3. `./rawterm.toml`
    /// 4. `$XDG_CONFIG_HOME/rawterm/rawterm.toml` (`%APPDATA%` on Windows)
    /// 5. Built-in defaults
    ///
    /// An explicitly named file (1 or 2) that cannot be read is an error;
    /// the probed locations (3 and 4) fall through silently. The
    /// `RAWTERM_DEVICE` and `RAWTERM_BAUD` variables override the result.
    pub fn load(explicit: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match resolve_path(explicit) {
            Some(path) => load_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(device) = std::env::var(DEVICE_ENV) {
            self.device = Some(device);
        }
        if let Ok(baud) = std::env::var(BAUD_ENV) {
            self.line.baud = baud.parse().map_err(|_| ConfigError::EnvParse {
                var: BAUD_ENV,
                message: format!("'{baud}' is not a baud rate"),
            })?;
        }
        Ok(())
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    config_dir()
        .map(|dir| dir.join("rawterm").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
    }
}

fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&content)?)
}
