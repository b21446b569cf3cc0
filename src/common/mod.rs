//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod reconnect;
pub mod types;

pub use error::ConnectionResult;
pub use types::{ChannelSet, Credentials};
