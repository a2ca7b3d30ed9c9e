//! Engine configuration.
//!
//! Supports loading configuration from:
//! - a TOML file passed by the caller (`--config` on the CLI)
//! - environment variables (`ENABLE_ADAFDT_CACHE`, `ADATYPES_*`)
//!
//! Every value has a default matching the usual server buffer layout, so an
//! empty file is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AdaError, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Buffer sizing.
    pub buffer: BufferConfig,
    /// Plausibility limits for occurrence counters.
    pub limits: LimitConfig,
    /// Definition cache.
    pub cache: CacheConfig,
    /// Mainframe record layout (zero-occurrence padding).
    pub mainframe: bool,
    /// Default tracing filter for the CLI.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            limits: LimitConfig::default(),
            cache: CacheConfig::default(),
            mainframe: false,
            log_filter: "info".to_string(),
        }
    }
}

/// Buffer sizing used by the format buffer generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Block size of the first partial LOB read.
    pub partial_lob_size: u32,
    /// Chunk size for LOB stores.
    pub store_lob_block: u32,
    /// Record buffer estimate for one PE or MU payload.
    pub multiple_size: u32,
    /// Record buffer estimate for a variable length field.
    pub variable_length_estimate: u32,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            partial_lob_size: 4096,
            store_lob_block: 40960,
            multiple_size: 2048,
            variable_length_estimate: 512,
        }
    }
}

/// Occurrence plausibility limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum period group occurrences.
    pub max_pe_occurrences: u32,
    /// Maximum occurrences of any other counted structure.
    pub max_occurrences: u32,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_pe_occurrences: 10000,
            max_occurrences: 4000,
        }
    }
}

/// Definition cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache enabled.
    pub enabled: bool,
    /// Seconds between sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sweep_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Default configuration with environment overrides applied.
    pub fn load() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();
        config
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AdaError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        toml::from_str(&content).map_err(|e| AdaError::Config {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Apply environment variable overrides.
    pub fn apply_env_vars(&mut self) {
        if let Ok(val) = std::env::var("ENABLE_ADAFDT_CACHE") {
            self.cache.enabled = val == "1";
        }
        if let Ok(val) = std::env::var("ADATYPES_MAINFRAME") {
            self.mainframe = val == "1";
        }
        if let Ok(val) = std::env::var("ADATYPES_PARTIAL_LOB_SIZE") {
            if let Ok(size) = val.parse() {
                self.buffer.partial_lob_size = size;
            }
        }
        if let Ok(val) = std::env::var("ADATYPES_LOG") {
            self.log_filter = val;
        }
    }

    /// Generate the default configuration as TOML.
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Builder: switch mainframe layout on or off.
    pub fn with_mainframe(mut self, mainframe: bool) -> Self {
        self.mainframe = mainframe;
        self
    }

    /// Builder: partial LOB block size.
    pub fn with_partial_lob_size(mut self, size: u32) -> Self {
        self.buffer.partial_lob_size = size;
        self
    }
}
