//! Configuration type definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protocol::chat::{DEFAULT_HOST, DEFAULT_PORT};

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment name, e.g. "development" or "production".
    pub env: String,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub twitch: TwitchConfig,
    /// `None` when no console port is configured.
    pub console: Option<ConsoleConfig>,
    /// Donations at or above this amount are announced on the console.
    pub notify_threshold: u64,
    /// Where the streamer table was loaded from.
    pub streamers_file: String,
    /// Monitored channels keyed by channel name.
    pub streamers: BTreeMap<String, StreamerConfig>,
}

/// Raw chat logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub folder: String,
    /// Enables the unknown-line log together with `log_unknown_message`.
    pub log_all: bool,
    pub log_unknown_message: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the donation file, or `:memory:` for an in-process store.
    pub dsn: String,
}

/// DSN that selects the in-process store.
pub const IN_MEMORY_DSN: &str = ":memory:";

impl StoreConfig {
    /// True when donations should not be persisted. An empty DSN counts.
    pub fn in_memory(&self) -> bool {
        let dsn = self.dsn.trim();
        dsn.is_empty() || dsn == IN_MEMORY_DSN
    }
}

/// Chat server endpoint and login. Empty nick and token mean anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchConfig {
    pub host: String,
    pub port: u16,
    pub nick: String,
    pub oauth: String,
}

/// Remote console endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub host: String,
    pub port: u16,
    /// Name announced to the console on connect.
    pub identity: String,
}

impl ConsoleConfig {
    pub fn addr(&self) -> String {
        let host = if self.host.is_empty() {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("{}:{}", host, self.port)
    }
}

/// One entry of the streamers file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamerConfig {
    /// Account that posts donation notices in this channel.
    pub bot_name: String,
    /// Pattern whose first match is the amount.
    pub value_regex: String,
    /// Substring a message must contain to be considered.
    #[serde(default)]
    pub line_filter_contain: String,
    /// Write every chat line of this channel to its raw log.
    #[serde(default)]
    pub log_message: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            logging: LoggingConfig {
                folder: "./logs/".to_string(),
                log_all: true,
                log_unknown_message: true,
            },
            store: StoreConfig {
                dsn: "donations.jsonl".to_string(),
            },
            twitch: TwitchConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                nick: String::new(),
                oauth: String::new(),
            },
            console: None,
            notify_threshold: 10_000,
            streamers_file: "./streamers.json".to_string(),
            streamers: BTreeMap::new(),
        }
    }
}
