//! Chat server connection and line protocol.

pub mod codec;
pub mod connector;
pub mod message;

pub use connector::{ChatConnection, DEFAULT_HOST, DEFAULT_PORT};
pub use message::{ChatMessage, Notice, PrivateChat};
