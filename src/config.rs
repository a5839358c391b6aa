//! Buffer sizing.
//!
//! Can be loaded from a TOML file, every field being optional:
//!
//! ```toml
//! timestamp_buffer_capacity = 4096
//! value_buffer_capacity = 4096
//! max_append_attempts = 4
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::errors::{Result, TsBufError};

/// Smallest value store: the first value of a buffer is 32 raw bits.
pub const MIN_VALUE_BUFFER_CAPACITY: usize = 4;

/// Smallest residual store: the widest residual is 4 + 32 bits.
pub const MIN_TIMESTAMP_BUFFER_CAPACITY: usize = 5;

/// Largest store of either kind. Stores are allocated up front, including
/// when a capacity is read back from a stream.
pub const MAX_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

/// Capacities of the buffers a series allocates when it rotates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BufferConfig {
    /// Bytes of each timestamp residual store.
    #[serde(default = "default_timestamp_buffer_capacity")]
    pub timestamp_buffer_capacity: usize,

    /// Bytes of each value store.
    #[serde(default = "default_value_buffer_capacity")]
    pub value_buffer_capacity: usize,

    /// Buffers tried by a single push, the current one included.
    #[serde(default = "default_max_append_attempts")]
    pub max_append_attempts: usize,
}

fn default_timestamp_buffer_capacity() -> usize {
    4096
}

fn default_value_buffer_capacity() -> usize {
    4096
}

fn default_max_append_attempts() -> usize {
    4
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            timestamp_buffer_capacity: default_timestamp_buffer_capacity(),
            value_buffer_capacity: default_value_buffer_capacity(),
            max_append_attempts: default_max_append_attempts(),
        }
    }
}

impl BufferConfig {
    pub fn new(timestamp_buffer_capacity: usize, value_buffer_capacity: usize) -> Self {
        Self {
            timestamp_buffer_capacity,
            value_buffer_capacity,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BufferConfig =
            toml::from_str(content).map_err(|e| TsBufError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks that a fresh buffer can always take one sample and that no
    /// buffer exceeds [`MAX_BUFFER_CAPACITY`].
    ///
    /// With a single attempt, a full buffer could never rotate.
    pub fn validate(&self) -> Result<()> {
        for (name, capacity) in [
            ("timestamp_buffer_capacity", self.timestamp_buffer_capacity),
            ("value_buffer_capacity", self.value_buffer_capacity),
        ] {
            if capacity > MAX_BUFFER_CAPACITY {
                return Err(TsBufError::InvalidConfig(format!(
                    "{} is {}, at most {} bytes are allowed",
                    name, capacity, MAX_BUFFER_CAPACITY
                )));
            }
        }
        if self.value_buffer_capacity < MIN_VALUE_BUFFER_CAPACITY {
            return Err(TsBufError::InvalidConfig(format!(
                "value_buffer_capacity is {}, at least {} bytes are needed",
                self.value_buffer_capacity, MIN_VALUE_BUFFER_CAPACITY
            )));
        }
        if self.timestamp_buffer_capacity < MIN_TIMESTAMP_BUFFER_CAPACITY {
            return Err(TsBufError::InvalidConfig(format!(
                "timestamp_buffer_capacity is {}, at least {} bytes are needed",
                self.timestamp_buffer_capacity, MIN_TIMESTAMP_BUFFER_CAPACITY
            )));
        }
        if self.max_append_attempts < 2 {
            return Err(TsBufError::InvalidConfig(format!(
                "max_append_attempts is {}, at least 2 are needed",
                self.max_append_attempts
            )));
        }
        Ok(())
    }
}
