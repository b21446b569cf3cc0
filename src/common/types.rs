//! Shared types used across the application.

use rand::Rng;

use crate::common::error::ConfigError;

/// Maximum number of channels joined over a single chat connection.
pub const MAX_CHANNELS: usize = 50;

/// Chat login credentials. Passed through to the server untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub nick: String,
    pub oauth: String,
}

impl Credentials {
    pub fn new(nick: impl Into<String>, oauth: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            oauth: oauth.into(),
        }
    }

    /// Read-only login that Twitch accepts without a token.
    pub fn anonymous() -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(10_000..100_000);
        Self {
            nick: format!("justinfan{}", suffix),
            oauth: "SCHMOOPIIE".to_string(),
        }
    }

    /// Credentials from config, falling back to an anonymous login.
    pub fn from_parts(nick: &str, oauth: &str) -> Self {
        if nick.is_empty() && oauth.is_empty() {
            Self::anonymous()
        } else {
            Self::new(nick, oauth)
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.nick.starts_with("justinfan")
    }
}

/// The channels joined by one chat connection, normalized to `#name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    channels: Vec<String>,
}

impl ChannelSet {
    pub fn new<I, S>(channels: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for channel in channels {
            let name = format!("#{}", channel_key(channel.as_ref()));
            if name.len() > 1 && !normalized.contains(&name) {
                normalized.push(name);
            }
        }

        if normalized.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels {
                count: normalized.len(),
                max: MAX_CHANNELS,
            });
        }

        Ok(Self {
            channels: normalized,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Lookup key for a channel: no leading `#`, lower-cased.
pub fn channel_key(channel: &str) -> String {
    channel.trim().trim_start_matches('#').to_lowercase()
}
