//! TOML configuration for a sort run.
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//! Lookup order: an explicit path, the `SENSORSORT_CONFIG` environment
//! variable, `/etc/sensorsort/sensorsort.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accel::Backend;
use crate::error::{SortError, SortResult};
use crate::input::Field;
use crate::sort::profile::Resolution;

pub const CONFIG_ENV: &str = "SENSORSORT_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/sensorsort/sensorsort.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorSortConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub sort: SortConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SensorSortConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded sensorsort configuration");
        Ok(config)
    }

    /// Load `explicit` if given (errors are fatal), otherwise fall back
    /// through the environment variable, the system path and the defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        Ok(Self::load_or_default())
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "SENSORSORT_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Element type the dataset is parsed into and sorted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Int,
    Uint,
    #[default]
    Float,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Text file with one record per line.
    pub path: Option<PathBuf>,
    pub element_type: ElementType,
    /// Zero-based measurement column; the last column when unset.
    pub column: Option<usize>,
}

impl InputConfig {
    pub fn field(&self) -> Field {
        match self.column {
            Some(i) => Field::Index(i),
            None => Field::Last,
        }
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: Backend,
    /// OpenCL platform index.
    pub platform: usize,
    /// Device index within the platform.
    pub device: usize,
}

// ---------------------------------------------------------------------------
// Sort
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Work-group size used when `use_preferred` is off.
    pub local_size: usize,
    /// Use the kernel's preferred work-group multiple instead of `local_size`.
    pub use_preferred: bool,
    /// Log work-group sizing before every stage.
    pub verbose_kernel: bool,
    /// Collect per-launch timestamps.
    pub profiling: bool,
    pub resolution: Resolution,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            local_size: 32,
            use_preferred: false,
            verbose_kernel: true,
            profiling: false,
            resolution: Resolution::Microseconds,
        }
    }
}

impl SortConfig {
    /// Checks that need no device information.
    pub fn validate(&self) -> SortResult<()> {
        if !self.use_preferred && self.local_size == 0 {
            return Err(SortError::Configuration(
                "sort.local_size must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
