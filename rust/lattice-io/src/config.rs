// rust/lattice-io/src/config.rs

//! Configuration for lattice I/O sessions.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values. A parsed
//! [`IoConfig`] is handed to every reader and writer explicitly; nothing in
//! the crate reads process-wide settings behind the caller's back.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{LatticeError, Result};

/// Default byte budget of the I/O node's transfer buffer.
pub const DEFAULT_BUFFER_BUDGET: usize = 262_144;

// Top-level I/O configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub storage: StorageConfig,
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path that relative file names are resolved against.
    pub base_path: PathBuf,
    // Buffer size in bytes for the OS-level file handles.
    pub buffer_size: usize,
    // Whether to memory-map files opened for reading.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

/// Data movement options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes the I/O node may hold before flushing to (or after refilling
    /// from) the record. At least one site is always buffered.
    pub buffer_budget_bytes: usize,
    /// Whether global (non-field) data read by the master is broadcast to
    /// every node. Host-side conversion turns this off.
    pub broadcast_globals: bool,
}

/// How chatty a session is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Off,
    /// Open and close events only.
    #[default]
    Low,
    Medium,
    /// One event per record.
    Regular,
    /// Per-flush and per-handshake detail.
    Debug,
}

impl FromStr for Verbosity {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "regular" => Ok(Self::Regular),
            "debug" => Ok(Self::Debug),
            other => Err(LatticeError::config(format!("unknown verbosity '{other}'"))),
        }
    }
}

// Logging options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbosity: Verbosity,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: false,
            mmap_threshold: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            buffer_budget_bytes: DEFAULT_BUFFER_BUDGET,
            broadcast_globals: true,
        }
    }
}

impl FromStr for IoConfig {
    type Err = LatticeError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| LatticeError::config_with_source("failed to parse TOML config", e))
    }
}

impl IoConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LatticeError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `LIO_` and name the section and field,
    // e.g. `LIO_TRANSFER_BUFFER_BUDGET_BYTES` or `LIO_LOGGING_VERBOSITY`.
    // Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("LIO_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        env_override("LIO_STORAGE_BUFFER_SIZE", &mut self.storage.buffer_size);
        env_override("LIO_STORAGE_USE_MMAP", &mut self.storage.use_mmap);
        env_override("LIO_STORAGE_MMAP_THRESHOLD", &mut self.storage.mmap_threshold);
        env_override(
            "LIO_TRANSFER_BUFFER_BUDGET_BYTES",
            &mut self.transfer.buffer_budget_bytes,
        );
        env_override(
            "LIO_TRANSFER_BROADCAST_GLOBALS",
            &mut self.transfer.broadcast_globals,
        );
        env_override("LIO_LOGGING_VERBOSITY", &mut self.logging.verbosity);
        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.storage.buffer_size == 0 {
            return Err(LatticeError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        if self.transfer.buffer_budget_bytes == 0 {
            return Err(LatticeError::config(
                "transfer.buffer_budget_bytes must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Replaces `slot` with the parsed value of `key`, if set and parseable.
fn env_override<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(v) = std::env::var(key).ok().and_then(|val| val.parse().ok()) {
        *slot = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = IoConfig::default();

        assert_eq!(config.storage.base_path, PathBuf::from("."));
        assert_eq!(config.storage.buffer_size, 64 * 1024);
        assert!(!config.storage.use_mmap);

        assert_eq!(config.transfer.buffer_budget_bytes, 262_144);
        assert!(config.transfer.broadcast_globals);

        assert_eq!(config.logging.verbosity, Verbosity::Low);
    }

    #[test]
    fn test_default_validates() {
        assert!(IoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_str_empty() {
        let config: IoConfig = "".parse().unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_str_full() {
        let toml = r#"
            [storage]
            base_path = "/scratch/lattice"
            buffer_size = 131072
            use_mmap = true
            mmap_threshold = 2097152

            [transfer]
            buffer_budget_bytes = 4096
            broadcast_globals = false

            [logging]
            verbosity = "debug"
        "#;

        let config: IoConfig = toml.parse().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/scratch/lattice"));
        assert_eq!(config.storage.buffer_size, 131072);
        assert!(config.storage.use_mmap);
        assert_eq!(config.storage.mmap_threshold, 2097152);
        assert_eq!(config.transfer.buffer_budget_bytes, 4096);
        assert!(!config.transfer.broadcast_globals);
        assert_eq!(config.logging.verbosity, Verbosity::Debug);
    }

    #[test]
    fn test_from_str_invalid_toml() {
        let result: std::result::Result<IoConfig, _> = "invalid = [".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [transfer]
            buffer_budget_bytes = 1024
            "#
        )
        .unwrap();

        let config = IoConfig::from_file(file.path()).unwrap();
        assert_eq!(config.transfer.buffer_budget_bytes, 1024);
    }

    #[test]
    fn test_from_file_not_found() {
        assert!(IoConfig::from_file("/nonexistent/lattice.toml").is_err());
    }

    #[test]
    fn test_validate_zero_budget() {
        let mut config = IoConfig::default();
        config.transfer.buffer_budget_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("buffer_budget_bytes"));
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Debug > Verbosity::Regular);
        assert!(Verbosity::Off < Verbosity::Low);
        assert_eq!("REGULAR".parse::<Verbosity>().unwrap(), Verbosity::Regular);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    // Env vars are process-global, so all override cases live in one test.
    #[test]
    fn test_env_overrides() {
        for (key, _) in std::env::vars() {
            if key.starts_with("LIO_") {
                std::env::remove_var(&key);
            }
        }

        std::env::set_var("LIO_TRANSFER_BUFFER_BUDGET_BYTES", "512");
        std::env::set_var("LIO_LOGGING_VERBOSITY", "off");
        std::env::set_var("LIO_STORAGE_BUFFER_SIZE", "not_a_number");

        let config = IoConfig::default().with_env_overrides();
        assert_eq!(config.transfer.buffer_budget_bytes, 512);
        assert_eq!(config.logging.verbosity, Verbosity::Off);
        assert_eq!(config.storage.buffer_size, 64 * 1024);

        std::env::remove_var("LIO_TRANSFER_BUFFER_BUDGET_BYTES");
        std::env::remove_var("LIO_LOGGING_VERBOSITY");
        std::env::remove_var("LIO_STORAGE_BUFFER_SIZE");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let original = IoConfig::default();
        let toml_str = toml::to_string(&original).unwrap();
        let parsed: IoConfig = toml_str.parse().unwrap();

        assert_eq!(original.storage.base_path, parsed.storage.base_path);
        assert_eq!(
            original.transfer.buffer_budget_bytes,
            parsed.transfer.buffer_budget_bytes
        );
        assert_eq!(original.logging.verbosity, parsed.logging.verbosity);
    }
}
