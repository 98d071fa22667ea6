//! Configuration management module
//!
//! Benchmark parameters are explicit values handed to each entry point.
//! `Settings` optionally loads defaults from a TOML file which command line
//! flags then override.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BenchError, Result, APP_NAME, CONFIG_FILE, GIB, MIB};

const MAX_DURATION_SECS: f64 = 3600.0;
const MAX_WORKERS: usize = 512;
const MAX_CHUNK_SIZE: u64 = 256 * MIB;
const MAX_TOTAL_SIZE: u64 = 1024 * GIB;

/// Compute benchmark parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Per-worker benchmark length in seconds
    pub duration_secs: f64,
    /// Number of parallel workers
    pub worker_count: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            worker_count: 4,
        }
    }
}

impl ComputeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration_secs(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Requested per-worker duration
    ///
    /// Only meaningful once `validate` has passed; invalid values map to zero.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_secs).unwrap_or(Duration::ZERO)
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(BenchError::ConfigError(format!(
                "Duration must be a positive number of seconds, got {}",
                self.duration_secs
            )));
        }

        if self.duration_secs > MAX_DURATION_SECS {
            return Err(BenchError::ConfigError(format!(
                "Duration too long: {}s (max: {}s)",
                self.duration_secs, MAX_DURATION_SECS
            )));
        }

        if self.worker_count == 0 {
            return Err(BenchError::ConfigError(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.worker_count > MAX_WORKERS {
            return Err(BenchError::ConfigError(format!(
                "Too many workers: {} (max: {})",
                self.worker_count, MAX_WORKERS
            )));
        }

        Ok(())
    }
}

/// Storage benchmark parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File created on the device under test
    pub target_path: PathBuf,
    /// Amount of data to write and read back
    pub total_size: u64,
    /// Size of each write/read call
    pub chunk_size: u64,
    /// Flush file data to the device before the write timer stops
    pub sync_on_close: bool,
}

impl StorageConfig {
    /// Create a configuration with default sizes for the given target file
    pub fn new(target_path: impl Into<PathBuf>) -> Self {
        let defaults = StorageSettings::default();
        Self {
            target_path: target_path.into(),
            total_size: defaults.total_size,
            chunk_size: defaults.chunk_size,
            sync_on_close: defaults.sync_on_close,
        }
    }

    pub fn with_total_size(mut self, size: u64) -> Self {
        self.total_size = size;
        self
    }

    pub fn with_chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }

    /// Chunk count needed to reach `total_size`; the last chunk is written whole
    pub fn chunk_count(&self) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Size of the file on disk after the write phase
    pub fn file_size_on_disk(&self) -> u64 {
        crate::util::round_up_to_multiple(self.total_size, self.chunk_size)
    }

    /// Validate sizes and target path shape
    ///
    /// Reachability of the target is checked at run time, not here.
    pub fn validate(&self) -> Result<()> {
        if self.target_path.as_os_str().is_empty() {
            return Err(BenchError::ConfigError(
                "Target path must not be empty".to_string(),
            ));
        }

        if self.total_size == 0 {
            return Err(BenchError::ConfigError(
                "Total size must be greater than 0".to_string(),
            ));
        }

        if self.total_size > MAX_TOTAL_SIZE {
            return Err(BenchError::ConfigError(format!(
                "Total size too large: {} bytes (max: {} bytes)",
                self.total_size, MAX_TOTAL_SIZE
            )));
        }

        if self.chunk_size == 0 {
            return Err(BenchError::ConfigError(
                "Chunk size must be greater than 0".to_string(),
            ));
        }

        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(BenchError::ConfigError(format!(
                "Chunk size too large: {} bytes (max: {} bytes)",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }

        if self.chunk_size > self.total_size {
            return Err(BenchError::ConfigError(format!(
                "Chunk size ({} bytes) must not exceed total size ({} bytes)",
                self.chunk_size, self.total_size
            )));
        }

        Ok(())
    }
}

/// Storage defaults as they appear in the settings file
///
/// The target has no default since it is device specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub target_path: Option<PathBuf>,
    pub total_size: u64,
    pub chunk_size: u64,
    pub sync_on_close: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            target_path: None,
            total_size: 2 * GIB,
            chunk_size: 4 * MIB,
            sync_on_close: false,
        }
    }
}

impl StorageSettings {
    /// Resolve into a runnable configuration, requiring a target path
    pub fn into_config(self) -> Result<StorageConfig> {
        let target_path = self.target_path.ok_or_else(|| {
            BenchError::ConfigError(
                "No target path given; pass --target or set storage.target_path".to_string(),
            )
        })?;

        let config = StorageConfig {
            target_path,
            total_size: self.total_size,
            chunk_size: self.chunk_size,
            sync_on_close: self.sync_on_close,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Settings file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compute: ComputeConfig,
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from the standard location
    /// Returns defaults if the file doesn't exist
    pub fn load() -> Result<Self> {
        match Self::config_file_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            BenchError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Get the standard configuration file path
    /// Uses $CONFIG_HOME/hwbench/hwbench.toml
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            BenchError::ConfigError("Unable to determine config directory".to_string())
        })?;

        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
