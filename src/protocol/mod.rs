//! Wire protocols: the chat server line protocol and the console bridge.

pub mod chat;
pub mod console;
