//! Remote console: connection, command dispatch and commands.

pub mod client;
pub mod commands;
pub mod dispatcher;

pub use client::{ConsoleClient, ConsoleHandle};
pub use commands::register_commands;
pub use dispatcher::CommandRegistry;
