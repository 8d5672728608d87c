//! Input configuration.
//!
//! Configuration is plain YAML. Every key is optional and falls back to the
//! defaults below.
//!
//! ```yaml
//! max_frame_size: 67108864
//! max_decompressed_size: 268435456
//! read_buffer_size: 8192
//! default_window_size: 1
//! no_beats_prefix: false
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{BeatsError, Result};

const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;
const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;
const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// Settings shared by the frame decoder, the normalizer and the connection handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeatsConfig {
    /// Largest length prefix accepted for any frame field.
    pub max_frame_size: usize,
    /// Largest inflated size accepted for a compressed frame.
    pub max_decompressed_size: usize,
    /// Bytes requested from the transport per read.
    pub read_buffer_size: usize,
    /// Window assumed until the peer sends its first window-size frame.
    pub default_window_size: u32,
    /// Insert flattened beat fields without the family prefix.
    pub no_beats_prefix: bool,
}

impl Default for BeatsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            default_window_size: 1,
            no_beats_prefix: false,
        }
    }
}

impl BeatsConfig {
    /// Parse and validate a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: BeatsConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| BeatsError::config_error("<inline>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the decoder relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(BeatsError::config_error("<config>", "max_frame_size must be positive"));
        }
        if self.max_decompressed_size < self.max_frame_size {
            return Err(BeatsError::config_error(
                "<config>",
                format!(
                    "max_decompressed_size ({}) must not be smaller than max_frame_size ({})",
                    self.max_decompressed_size, self.max_frame_size
                ),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(BeatsError::config_error("<config>", "read_buffer_size must be positive"));
        }
        if self.default_window_size == 0 {
            return Err(BeatsError::config_error(
                "<config>",
                "default_window_size must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Load a configuration file from disk.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<BeatsConfig> {
    let path = path.as_ref();
    debug!("Loading beats input configuration from {}", path.display());

    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;

    let config: BeatsConfig = serde_yaml_ng::from_str(&yaml)
        .map_err(|e| BeatsError::config_error(path, e.to_string()))
        .with_context(|| format!("parsing configuration file {}", path.display()))?;

    config.validate().map_err(|e| match e {
        BeatsError::Config { details, .. } => BeatsError::config_error(path, details),
        other => other,
    })?;

    Ok(config)
}
