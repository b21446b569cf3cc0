//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::common::types::MAX_CHANNELS;
use crate::config::types::Config;

/// Validate a configuration, reporting every problem at once.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Streamers
    if config.streamers.is_empty() {
        errors.push(format!("{} defines no streamers", config.streamers_file));
    }
    if config.streamers.len() > MAX_CHANNELS {
        errors.push(format!(
            "{} streamers configured, at most {} allowed",
            config.streamers.len(),
            MAX_CHANNELS
        ));
    }
    for (channel, streamer) in &config.streamers {
        if channel.trim_start_matches('#').trim().is_empty() {
            errors.push("streamer with an empty channel name".to_string());
        }
        if streamer.bot_name.trim().is_empty() {
            errors.push(format!("{}.BotName is required", channel));
        }
        if streamer.value_regex.is_empty() {
            errors.push(format!("{}.ValueRegex is required", channel));
        } else if let Err(e) = Regex::new(&streamer.value_regex) {
            errors.push(format!(
                "{}.ValueRegex is not a valid regex: '{}' ({})",
                channel, streamer.value_regex, e
            ));
        }
    }

    // Chat login
    if config.twitch.nick.is_empty() != config.twitch.oauth.is_empty() {
        errors.push("TWITCH_NICK and TWITCH_OAUTH must be set together".to_string());
    }
    if config.twitch.host.is_empty() {
        errors.push("TWITCH_HOST is required".to_string());
    }
    if config.twitch.port == 0 {
        errors.push("TWITCH_PORT must be non-zero".to_string());
    }

    // Console
    if let Some(ref console) = config.console {
        if console.port == 0 {
            errors.push("DISCORD_BOT_SERVER_PORT must be a non-zero port".to_string());
        }
        if console.identity.trim().is_empty() {
            errors.push("CONSOLE_IDENTITY must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
