//! Configuration loading and types.

pub mod env;
pub mod parser;
pub mod types;
pub mod validate;

use crate::common::error::ConfigError;
use env::config_from_env;
use parser::load_streamers;
use types::Config;
use validate::validate_config;

/// Read the environment and streamers file, then validate the result.
pub fn load_and_validate() -> Result<Config, ConfigError> {
    let mut config = config_from_env();
    config.streamers = load_streamers(&config.streamers_file)?;
    validate_config(&config)?;
    Ok(config)
}
