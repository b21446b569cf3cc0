//! Environment variables.
//!
//! Every setting has a default; a value that fails to parse is ignored
//! in favour of the default.
//! - `ENV`, `LOG_FOLDER`, `LOG_ALL`, `LOG_UNKNOWN_MESSAGE`
//! - `DB_DSN` - donation file path
//! - `TWITCH_OAUTH`, `TWITCH_NICK`, `TWITCH_HOST`, `TWITCH_PORT`
//! - `DISCORD_BOT_SERVER_HOST`, `DISCORD_BOT_SERVER_PORT` - console endpoint
//! - `CONSOLE_IDENTITY` - name announced to the console
//! - `DONATION_NOTIFY_THRESHOLD`
//! - `STREAMERS_FILE`

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::config::types::{Config, ConsoleConfig};

const DEFAULT_CONSOLE_IDENTITY: &str = "TwitchDonoCalculator";

/// Build a config (without streamers) from the process environment.
pub fn config_from_env() -> Config {
    config_from_lookup(|key| env::var(key).ok())
}

/// Build a config (without streamers) from `lookup`.
pub fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let mut config = Config::default();
    let vars = Vars(&lookup);

    config.env = vars.string("ENV", config.env);
    config.logging.folder = vars.string("LOG_FOLDER", config.logging.folder);
    config.logging.log_all = vars.flag("LOG_ALL", config.logging.log_all);
    config.logging.log_unknown_message =
        vars.flag("LOG_UNKNOWN_MESSAGE", config.logging.log_unknown_message);

    config.store.dsn = vars.string("DB_DSN", config.store.dsn);

    config.twitch.oauth = vars.string("TWITCH_OAUTH", config.twitch.oauth);
    config.twitch.nick = vars.string("TWITCH_NICK", config.twitch.nick);
    config.twitch.host = vars.string("TWITCH_HOST", config.twitch.host);
    config.twitch.port = vars.parsed("TWITCH_PORT", config.twitch.port);

    config.console = lookup("DISCORD_BOT_SERVER_PORT").map(|port| ConsoleConfig {
        host: vars.string("DISCORD_BOT_SERVER_HOST", String::new()),
        port: port.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid DISCORD_BOT_SERVER_PORT={:?}", port);
            0
        }),
        identity: vars.string("CONSOLE_IDENTITY", DEFAULT_CONSOLE_IDENTITY.to_string()),
    });

    config.notify_threshold = vars.parsed("DONATION_NOTIFY_THRESHOLD", config.notify_threshold);
    config.streamers_file = vars.string("STREAMERS_FILE", config.streamers_file);

    config
}

struct Vars<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, key: &str, default: String) -> String {
        (self.0)(key).unwrap_or(default)
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        match (self.0)(key) {
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid {}={:?}", key, value);
                default
            }),
            None => default,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match (self.0)(key) {
            Some(value) => parse_bool(&value).unwrap_or_else(|| {
                warn!("Ignoring invalid {}={:?}", key, value);
                default
            }),
            None => default,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = config_from_lookup(lookup(&[]));
        assert_eq!(config.env, "development");
        assert_eq!(config.logging.folder, "./logs/");
        assert!(config.logging.log_all);
        assert_eq!(config.twitch.host, "irc.chat.twitch.tv");
        assert_eq!(config.twitch.port, 6667);
        assert!(config.console.is_none());
        assert_eq!(config.notify_threshold, 10_000);
        assert_eq!(config.streamers_file, "./streamers.json");
    }

    #[test]
    fn test_overrides() {
        let config = config_from_lookup(lookup(&[
            ("LOG_ALL", "false"),
            ("TWITCH_NICK", "watcher"),
            ("TWITCH_OAUTH", "oauth:abc"),
            ("DB_DSN", "/tmp/d.jsonl"),
            ("DISCORD_BOT_SERVER_PORT", "4000"),
            ("DONATION_NOTIFY_THRESHOLD", "500"),
        ]));
        assert!(!config.logging.log_all);
        assert_eq!(config.twitch.nick, "watcher");
        assert_eq!(config.twitch.oauth, "oauth:abc");
        assert_eq!(config.store.dsn, "/tmp/d.jsonl");
        assert_eq!(config.notify_threshold, 500);

        let console = config.console.unwrap();
        assert_eq!(console.addr(), "127.0.0.1:4000");
        assert_eq!(console.identity, "TwitchDonoCalculator");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from_lookup(lookup(&[
            ("LOG_UNKNOWN_MESSAGE", "maybe"),
            ("TWITCH_PORT", "not-a-port"),
            ("DONATION_NOTIFY_THRESHOLD", "-5"),
        ]));
        assert!(config.logging.log_unknown_message);
        assert_eq!(config.twitch.port, 6667);
        assert_eq!(config.notify_threshold, 10_000);
    }

    #[test]
    fn test_invalid_console_port_is_zero() {
        let config = config_from_lookup(lookup(&[("DISCORD_BOT_SERVER_PORT", "abc")]));
        assert_eq!(config.console.unwrap().port, 0);
    }
}
