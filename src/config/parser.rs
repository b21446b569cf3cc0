//! Streamers file parsing (JSON object keyed by channel name).

use std::collections::BTreeMap;
use std::path::Path;

use crate::common::error::ConfigError;
use crate::config::types::StreamerConfig;

/// Load the streamer table from a JSON file.
pub fn load_streamers(path: impl AsRef<Path>) -> Result<BTreeMap<String, StreamerConfig>, ConfigError> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.display().to_string(),
        source: e,
    })?;
    load_streamers_str(&content)
}

/// Load the streamer table from a JSON string.
pub fn load_streamers_str(content: &str) -> Result<BTreeMap<String, StreamerConfig>, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
