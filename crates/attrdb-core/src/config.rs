//! Runtime configuration.
//!
//! Every section implements [`Default`] so that an empty TOML document (or a
//! bare `[section]` header) produces a working configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Hard per-request window enforced by the attribute store.
pub const MAX_RESULTS_PER_REQUEST: u32 = 2500;

/// Maximum UTF-8 byte length of a single attribute value.
pub const MAX_VALUE_BYTES: usize = 1024;

/// Chunk size used when a value exceeds [`MAX_VALUE_BYTES`]; leaves room for
/// the four-digit sequence suffix.
pub const CHUNK_BYTES: usize = 1020;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cursor.page_size must be greater than zero")]
    ZeroPageSize,

    #[error("save.chunk_bytes must be greater than zero")]
    ZeroChunkBytes,

    #[error("save.chunk_bytes ({chunk}) exceeds save.max_value_bytes ({max})")]
    ChunkExceedsValueLimit { chunk: usize, max: usize },
}

///
/// Config
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Config {
    pub cursor: CursorConfig,
    pub save: SaveConfig,

    /// Log every issued query and write at info level.
    pub debug: bool,
}

impl Config {
    /// Parse and validate a TOML configuration document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cursor.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.save.chunk_bytes == 0 {
            return Err(ConfigError::ZeroChunkBytes);
        }
        if self.save.chunk_bytes > self.save.max_value_bytes {
            return Err(ConfigError::ChunkExceedsValueLimit {
                chunk: self.save.chunk_bytes,
                max: self.save.max_value_bytes,
            });
        }

        Ok(())
    }
}

///
/// CursorConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Items requested per select call; capped at [`MAX_RESULTS_PER_REQUEST`].
    pub page_size: u32,

    /// Passed through unchanged to every select call.
    pub consistent_read: bool,

    /// When set, `size()` materializes the result set instead of issuing
    /// count-only queries.
    pub load_all_on_size: bool,
}

impl CursorConfig {
    /// Page size after applying the store's per-request cap.
    #[must_use]
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_RESULTS_PER_REQUEST)
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_RESULTS_PER_REQUEST,
            consistent_read: true,
            load_all_on_size: false,
        }
    }
}

///
/// SaveConfig
///

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct SaveConfig {
    pub max_value_bytes: usize,
    pub chunk_bytes: usize,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            max_value_bytes: MAX_VALUE_BYTES,
            chunk_bytes: CHUNK_BYTES,
        }
    }
}

///
/// TESTS
///
