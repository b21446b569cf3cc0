//! Turns classified chat messages into recorded donations.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::common::error::ConfigError;
use crate::common::messages::Donation;
use crate::common::types::channel_key;
use crate::config::types::{Config, StreamerConfig};
use crate::console::dispatcher::ConsoleSink;
use crate::ingest::extractor::DonationPattern;
use crate::ingest::rawlog::{RawLog, UNKNOWN_LOG};
use crate::protocol::chat::{ChatMessage, Notice, PrivateChat};
use crate::store::DonationStore;

/// A monitored channel with its compiled donation pattern.
#[derive(Debug, Clone)]
pub struct Streamer {
    /// Channel key (no leading `#`).
    pub channel: String,
    /// Account whose messages carry donation notices.
    pub bot_name: String,
    pub log_messages: bool,
    pattern: DonationPattern,
}

impl Streamer {
    pub fn from_config(channel: &str, config: &StreamerConfig) -> Result<Self, ConfigError> {
        let channel = channel_key(channel);
        let pattern =
            DonationPattern::new(&channel, &config.line_filter_contain, &config.value_regex)?;
        Ok(Self {
            channel,
            bot_name: config.bot_name.clone(),
            log_messages: config.log_message,
            pattern,
        })
    }

    /// Amount in `text`, with zero treated as no donation.
    pub fn find_donation(&self, text: &str) -> Option<u64> {
        self.pattern.extract(text).filter(|amount| *amount > 0)
    }
}

/// Consumes classified messages for every monitored channel.
///
/// Safe to call from several tasks at once.
pub struct DonationHandler {
    streamers: HashMap<String, Streamer>,
    store: Arc<dyn DonationStore>,
    console: Arc<dyn ConsoleSink>,
    raw_log: Option<RawLog>,
    log_unknown: bool,
    notify_threshold: u64,
}

impl DonationHandler {
    pub fn new(
        streamers: impl IntoIterator<Item = Streamer>,
        store: Arc<dyn DonationStore>,
        console: Arc<dyn ConsoleSink>,
        notify_threshold: u64,
    ) -> Self {
        Self {
            streamers: streamers
                .into_iter()
                .map(|s| (s.channel.clone(), s))
                .collect(),
            store,
            console,
            raw_log: None,
            log_unknown: false,
            notify_threshold,
        }
    }

    /// Build from the loaded config. Fails if any pattern does not compile.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn DonationStore>,
        console: Arc<dyn ConsoleSink>,
    ) -> Result<Self, ConfigError> {
        let streamers = config
            .streamers
            .iter()
            .map(|(channel, streamer)| Streamer::from_config(channel, streamer))
            .collect::<Result<Vec<_>, _>>()?;

        // Per-streamer `LogMessage` stands on its own; only the unknown
        // log is gated by `LOG_ALL`.
        let log_unknown = config.logging.log_all && config.logging.log_unknown_message;
        Ok(Self::new(streamers, store, console, config.notify_threshold)
            .with_raw_log(RawLog::new(&config.logging.folder), log_unknown))
    }

    pub fn with_raw_log(mut self, raw_log: RawLog, log_unknown: bool) -> Self {
        self.raw_log = Some(raw_log);
        self.log_unknown = log_unknown;
        self
    }

    /// Channel keys of every monitored streamer.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.streamers.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Process one message. Returns the donation if one was recorded.
    pub fn handle(&self, message: &ChatMessage) -> Option<Donation> {
        match message {
            ChatMessage::PrivateChat(chat) => self.on_chat(chat),
            ChatMessage::Notice(notice) => self.on_notice(notice),
            ChatMessage::Unknown { raw } => {
                if self.log_unknown {
                    self.write_raw(UNKNOWN_LOG, raw);
                }
                None
            }
            ChatMessage::Ping { .. } => None,
        }
    }

    fn streamer(&self, channel: &str) -> Option<&Streamer> {
        let streamer = self.streamers.get(&channel_key(channel));
        if streamer.is_none() {
            debug!("Message for unmonitored channel {}", channel);
        }
        streamer
    }

    fn on_chat(&self, chat: &PrivateChat) -> Option<Donation> {
        let streamer = self.streamer(&chat.channel)?;
        if streamer.log_messages {
            self.write_raw(&streamer.channel, &chat.raw);
        }

        if !chat.sender.eq_ignore_ascii_case(&streamer.bot_name) {
            return None;
        }

        let amount = streamer.find_donation(&chat.text)?;
        debug!("Donation notice from {}", chat.sender_host);
        self.record(Donation::new(&chat.sender, &streamer.channel, amount, &chat.text))
    }

    fn on_notice(&self, notice: &Notice) -> Option<Donation> {
        let streamer = self.streamer(&notice.channel)?;
        let amount = streamer.find_donation(&notice.text)?;
        self.record(Donation::new("", &streamer.channel, amount, &notice.text))
    }

    fn record(&self, donation: Donation) -> Option<Donation> {
        info!(
            "Donation of {} in {} from {}",
            donation.amount, donation.channel, donation.send_from
        );

        if let Err(e) = self.store.insert(&donation) {
            error!("Failed to save donation: {}", e);
        }

        if donation.amount >= self.notify_threshold {
            self.console.send(&donation.console_notice());
        }

        Some(donation)
    }

    fn write_raw(&self, name: &str, line: &str) {
        let Some(raw_log) = &self.raw_log else {
            return;
        };
        if let Err(e) = raw_log.append(name, line) {
            warn!("Failed to write raw log {}: {}", name, e);
            self.console
                .send(&format!("ERROR when creating log file: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::dispatcher::RecordingSink;
    use crate::protocol::chat::message::classify;
    use crate::store::MemoryStore;

    fn streamer_config() -> StreamerConfig {
        StreamerConfig {
            bot_name: "StreamElements".to_string(),
            value_regex: r"\d+(\.\d+)?".to_string(),
            line_filter_contain: "donated".to_string(),
            log_message: false,
        }
    }

    fn handler() -> (DonationHandler, Arc<MemoryStore>, Arc<RecordingSink>) {
        let store = Arc::new(MemoryStore::new());
        let console = Arc::new(RecordingSink::default());
        let streamer = Streamer::from_config("#Bar", &streamer_config()).unwrap();
        let handler = DonationHandler::new([streamer], store.clone(), console.clone(), 10_000);
        (handler, store, console)
    }

    #[test]
    fn test_bot_donation_is_recorded() {
        let (handler, store, console) = handler();
        let line = ":streamelements!streamelements@streamelements.tmi.twitch.tv PRIVMSG #bar :Alice donated $12.50 to the cause";

        let donation = handler.handle(&classify(line)).unwrap();
        assert_eq!(donation.amount, 12);
        assert_eq!(donation.channel, "bar");
        assert_eq!(donation.send_from, "Alice");
        assert_eq!(donation.user, "streamelements");

        assert_eq!(store.records().len(), 1);
        // Below the notify threshold.
        assert!(console.messages().is_empty());
    }

    #[test]
    fn test_other_senders_are_ignored() {
        let (handler, store, _) = handler();
        let line = ":foo!foo@foo.tmi.twitch.tv PRIVMSG #bar :I donated 500000";
        assert!(handler.handle(&classify(line)).is_none());
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_large_donation_notifies_console() {
        let (handler, _, console) = handler();
        let line = ":streamelements!se@se.tmi.twitch.tv PRIVMSG #bar :Bob donated 25000.99";

        handler.handle(&classify(line)).unwrap();
        assert_eq!(console.messages(), vec!["bar just got  25000 donation"]);
    }

    #[test]
    fn test_notice_donation_has_no_user() {
        let (handler, store, _) = handler();
        let line = ":tmi.twitch.tv USERNOTICE #bar :Carol donated 300 via alerts";

        let donation = handler.handle(&classify(line)).unwrap();
        assert_eq!(donation.user, "");
        assert_eq!(donation.amount, 300);
        assert_eq!(store.records()[0].send_from, "Carol");
    }

    #[test]
    fn test_zero_amount_is_skipped() {
        let (handler, store, _) = handler();
        let line = ":streamelements!se@se.tmi.twitch.tv PRIVMSG #bar :Dan donated 0.50";
        assert!(handler.handle(&classify(line)).is_none());
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_unmonitored_channel_and_other_kinds() {
        let (handler, _, _) = handler();
        let line = ":streamelements!se@se.tmi.twitch.tv PRIVMSG #elsewhere :Eve donated 50";
        assert!(handler.handle(&classify(line)).is_none());
        assert!(handler.handle(&classify("PING :tmi.twitch.tv")).is_none());
        assert!(handler.handle(&classify("garbage")).is_none());
    }

    #[test]
    fn test_raw_logging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let console = Arc::new(RecordingSink::default());
        let mut config = streamer_config();
        config.log_message = true;
        let streamer = Streamer::from_config("bar", &config).unwrap();
        let handler = DonationHandler::new([streamer], store, console, 10_000)
            .with_raw_log(RawLog::new(dir.path()), true);

        let chat = ":foo!foo@foo.tmi.twitch.tv PRIVMSG #bar :hello world";
        handler.handle(&classify(chat));
        handler.handle(&classify(":tmi.twitch.tv 001 justinfan1 :Welcome"));

        let bar = std::fs::read_to_string(dir.path().join("bar.log")).unwrap();
        assert_eq!(bar.trim_end(), chat);
        let unknown = std::fs::read_to_string(dir.path().join("unknown.log")).unwrap();
        assert!(unknown.contains("001 justinfan1"));
    }

    fn logging_config(folder: &std::path::Path, log_all: bool) -> Config {
        let mut streamer = streamer_config();
        streamer.log_message = true;
        let mut config = Config::default();
        config.logging.folder = folder.to_string_lossy().into_owned();
        config.logging.log_all = log_all;
        config.logging.log_unknown_message = true;
        config.streamers.insert("bar".to_string(), streamer);
        config
    }

    #[test]
    fn test_streamer_log_ignores_log_all() {
        let dir = tempfile::tempdir().unwrap();
        let config = logging_config(dir.path(), false);
        let handler = DonationHandler::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingSink::default()),
        )
        .unwrap();

        let chat = ":foo!foo@foo.tmi.twitch.tv PRIVMSG #bar :hello world";
        handler.handle(&classify(chat));
        handler.handle(&classify(":tmi.twitch.tv 001 justinfan1 :Welcome"));

        let bar = std::fs::read_to_string(dir.path().join("bar.log")).unwrap();
        assert_eq!(bar.trim_end(), chat);
        // The unknown log still needs LOG_ALL.
        assert!(!dir.path().join("unknown.log").exists());
    }

    #[test]
    fn test_unknown_log_with_log_all() {
        let dir = tempfile::tempdir().unwrap();
        let config = logging_config(dir.path(), true);
        let handler = DonationHandler::from_config(
            &config,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingSink::default()),
        )
        .unwrap();

        handler.handle(&classify(":tmi.twitch.tv 001 justinfan1 :Welcome"));
        let unknown = std::fs::read_to_string(dir.path().join("unknown.log")).unwrap();
        assert!(unknown.contains("001 justinfan1"));
    }

    #[test]
    fn test_channels_are_keys() {
        let (handler, _, _) = handler();
        assert_eq!(handler.channels(), vec!["bar"]);
    }
}
