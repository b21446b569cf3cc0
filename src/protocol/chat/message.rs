//! Classification of raw chat lines.
//!
//! Wire shapes:
//! - `PING :tmi.twitch.tv`
//! - `:<sender>!<sender>@<sender>.tmi.twitch.tv PRIVMSG #<channel> :<text>`
//! - `:tmi.twitch.tv USERNOTICE #<channel> :<text>`
//!
//! Every line maps to exactly one [`ChatMessage`]; classification never fails.

/// Keep-alive request from the server.
pub const PING_MARKER: &str = "PING";
/// Keep-alive reply sent back to the server.
pub const PONG_MARKER: &str = "PONG";

const PRIVMSG: &str = "PRIVMSG";
const USERNOTICE: &str = "USERNOTICE";

/// A chat message sent by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateChat {
    pub raw: String,
    /// Login name, the prefix up to the first `!`.
    pub sender: String,
    /// Full prefix token, e.g. `foo!foo@foo.tmi.twitch.tv`.
    pub sender_host: String,
    /// Target channel including the leading `#`.
    pub channel: String,
    pub text: String,
}

/// A system notice (subs, gifts, raids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub raw: String,
    pub channel: String,
    pub text: String,
}

/// A classified chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    Ping { raw: String },
    PrivateChat(PrivateChat),
    Notice(Notice),
    Unknown { raw: String },
}

impl ChatMessage {
    /// The line as received, trailing whitespace removed.
    pub fn raw(&self) -> &str {
        match self {
            Self::Ping { raw } | Self::Unknown { raw } => raw,
            Self::PrivateChat(m) => &m.raw,
            Self::Notice(m) => &m.raw,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::PrivateChat(_) => "privmsg",
            Self::Notice(_) => "notice",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// The channel this message was addressed to, if any.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::PrivateChat(m) => Some(&m.channel),
            Self::Notice(m) => Some(&m.channel),
            _ => None,
        }
    }
}

/// Classify one raw line.
///
/// The line is split on `:` into at most three segments: an empty
/// segment before the prefix, the metadata, and the text. The metadata
/// tokens are `<prefix> <command> <channel>`.
pub fn classify(raw_line: &str) -> ChatMessage {
    let line = raw_line.trim_end();
    let raw = line.to_string();

    if line.starts_with(PING_MARKER) {
        return ChatMessage::Ping { raw };
    }

    let segments: Vec<&str> = line.splitn(3, ':').collect();
    if segments.len() < 3 {
        return ChatMessage::Unknown { raw };
    }

    let meta: Vec<&str> = segments[1].split_whitespace().collect();
    if meta.len() < 3 {
        return ChatMessage::Unknown { raw };
    }

    let prefix = meta[0];
    let channel = meta[2].trim().to_string();
    let text = segments[2].to_string();

    match meta[1] {
        PRIVMSG => {
            let sender = prefix.split('!').next().unwrap_or_default().trim();
            ChatMessage::PrivateChat(PrivateChat {
                sender: sender.to_string(),
                sender_host: prefix.to_string(),
                channel,
                text,
                raw,
            })
        }
        USERNOTICE => ChatMessage::Notice(Notice { channel, text, raw }),
        _ => ChatMessage::Unknown { raw },
    }
}

/// Reply for a ping line: the marker swapped, the payload kept.
pub fn pong_for(ping_line: &str) -> String {
    let line = ping_line.trim();
    match line.strip_prefix(PING_MARKER) {
        Some(rest) => format!("{}{}", PONG_MARKER, rest),
        None => line.to_string(),
    }
}
