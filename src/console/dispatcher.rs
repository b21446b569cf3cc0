//! Command registry and dispatch for console command lines.
//!
//! A command line looks like `<meta> <meta> <command> [args...]`. The
//! first two tokens belong to the console and are skipped.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

/// Number of leading tokens reserved for console routing metadata.
pub const META_TOKENS: usize = 2;

const HELP: &str = "help";
const HELP_SEPARATOR: &str = "-----------------";

/// Somewhere to write console output.
pub trait ConsoleSink: Send + Sync {
    /// Queue one message. Never blocks.
    fn send(&self, text: &str);
}

/// One parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// Trimmed line as received.
    pub raw: String,
    /// Lower-cased command name.
    pub command: String,
    /// Lower-cased tokens after the command name.
    pub args: Vec<String>,
}

type HandlerFn = dyn Fn(&CommandInvocation, &dyn ConsoleSink) + Send + Sync;

/// A registered command: its handler and help text.
#[derive(Clone)]
pub struct CommandHandler {
    func: Arc<HandlerFn>,
    help: String,
}

impl CommandHandler {
    pub fn new<F>(help: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CommandInvocation, &dyn ConsoleSink) + Send + Sync + 'static,
    {
        let help = help.into();
        Self {
            func: Arc::new(func),
            help: if help.is_empty() {
                "No help message provided.".to_string()
            } else {
                help
            },
        }
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    fn call(&self, invocation: &CommandInvocation, sink: &dyn ConsoleSink) {
        (self.func)(invocation, sink)
    }
}

/// Name-keyed command handlers. Filled at startup, read-only afterwards.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name` (case-insensitive). Replaces any
    /// earlier registration of the same name.
    pub fn register(&mut self, name: &str, handler: CommandHandler) {
        self.handlers.insert(name.to_lowercase(), handler);
    }

    #[cfg(test)]
    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// One `name: help` entry per command.
    pub fn help_listing(&self) -> String {
        if self.handlers.is_empty() {
            return "No commands available.".to_string();
        }

        self.handlers
            .iter()
            .map(|(name, handler)| help_entry(name, handler))
            .collect()
    }

    /// Parse a command line and route it to its handler.
    pub fn dispatch(&self, raw_line: &str, sink: &dyn ConsoleSink) {
        let raw = raw_line.trim();
        let lowered = raw.to_lowercase();
        let tokens: Vec<&str> = lowered.split_whitespace().collect();

        if tokens.len() <= META_TOKENS || tokens[META_TOKENS] == HELP {
            sink.send(&self.help_listing());
            return;
        }

        let command = tokens[META_TOKENS];
        let args: Vec<String> = tokens[META_TOKENS + 1..]
            .iter()
            .map(|arg| arg.to_string())
            .collect();

        let Some(handler) = self.handlers.get(command) else {
            debug!("Unknown console command: {}", command);
            sink.send(&format!("Unknown command: {}\n", command));
            sink.send(&self.help_listing());
            return;
        };

        if args.first().map(String::as_str) == Some(HELP) {
            sink.send(&help_entry(command, handler));
            return;
        }

        debug!("Dispatching console command {} {:?}", command, args);
        let invocation = CommandInvocation {
            raw: raw.to_string(),
            command: command.to_string(),
            args,
        };
        handler.call(&invocation, sink);
    }
}

fn help_entry(name: &str, handler: &CommandHandler) -> String {
    format!("{}: {}\n{}\n", name, handler.help(), HELP_SEPARATOR)
}

/// Collects console output in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingSink {
    pub sent: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ConsoleSink for RecordingSink {
    fn send(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }
}
