//! Console bridge wire protocol.

pub mod codec;

pub use codec::{frame_message, new_console_framed, ConsoleFrame, ConsoleLine};
