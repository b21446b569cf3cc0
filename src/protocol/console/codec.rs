//! Console bridge codec.
//!
//! Outbound:
//! - `SET_NAME:<identity>\n`
//! - `GET_DELIMITER:\n`
//! - `<payload>\n<delimiter>\n`
//!
//! Inbound:
//! - `DELIMITER:<delim>\n`
//! - anything else is a command line

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::error::ConnectionError;

const SET_NAME: &str = "SET_NAME:";
const GET_DELIMITER: &str = "GET_DELIMITER:";
const DELIMITER: &str = "DELIMITER:";

/// Longest accepted inbound line.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// A line received from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// The frame delimiter assigned by the console.
    Delimiter(String),
    /// An operator command.
    Command(String),
}

impl ConsoleLine {
    pub fn parse(line: &str) -> Self {
        match line.strip_prefix(DELIMITER) {
            Some(delimiter) => Self::Delimiter(delimiter.trim().to_string()),
            None => Self::Command(line.to_string()),
        }
    }
}

/// A frame written to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleFrame {
    SetName(String),
    GetDelimiter,
    /// A message already framed by [`frame_message`].
    Message(Bytes),
}

/// Frame a payload: trimmed, then newline, delimiter, newline.
pub fn frame_message(payload: &str, delimiter: &str) -> Bytes {
    let payload = payload.trim();
    let mut buf = BytesMut::with_capacity(payload.len() + delimiter.len() + 2);
    buf.put_slice(payload.as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(delimiter.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Line codec for the console connection.
#[derive(Debug, Default)]
pub struct ConsoleCodec {
    scanned: usize,
}

impl Decoder for ConsoleCodec {
    type Item = ConsoleLine;
    type Error = ConnectionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;

                let line = src.split_to(end + 1);
                let text = String::from_utf8_lossy(&line[..end]);
                Ok(Some(ConsoleLine::parse(text.trim_end_matches('\r'))))
            }
            None => {
                if src.len() > MAX_LINE_LENGTH {
                    return Err(ConnectionError::LineTooLong {
                        max: MAX_LINE_LENGTH,
                    });
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                src.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<ConsoleFrame> for ConsoleCodec {
    type Error = ConnectionError;

    fn encode(&mut self, item: ConsoleFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ConsoleFrame::SetName(identity) => {
                dst.reserve(SET_NAME.len() + identity.len() + 1);
                dst.put_slice(SET_NAME.as_bytes());
                dst.put_slice(identity.as_bytes());
                dst.put_u8(b'\n');
            }
            ConsoleFrame::GetDelimiter => {
                dst.reserve(GET_DELIMITER.len() + 1);
                dst.put_slice(GET_DELIMITER.as_bytes());
                dst.put_u8(b'\n');
            }
            ConsoleFrame::Message(frame) => {
                dst.reserve(frame.len());
                dst.put_slice(&frame);
            }
        }
        Ok(())
    }
}

/// A framed console connection.
pub type ConsoleFramed<S> = Framed<S, ConsoleCodec>;

pub fn new_console_framed<S: AsyncRead + AsyncWrite>(stream: S) -> ConsoleFramed<S> {
    Framed::new(stream, ConsoleCodec::default())
}
