//! Line codec for the chat connection.
//!
//! Inbound lines end in `\r\n` (a bare `\n` is accepted too). Outbound
//! lines get `\r\n` appended.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use crate::common::error::ConnectionError;

/// Longest accepted inbound line, terminator included.
pub const MAX_LINE_LENGTH: usize = 8191;

/// Frames the chat byte stream into text lines.
#[derive(Debug, Default)]
pub struct ChatLineCodec {
    /// Bytes already scanned for a newline.
    scanned: usize,
}

impl Decoder for ChatLineCodec {
    type Item = String;
    type Error = ConnectionError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;

                let mut line = src.split_to(end);
                src.advance(1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }

                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
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
        // A trailing partial line is discarded with the connection.
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

impl<T: AsRef<str>> Encoder<T> for ChatLineCodec {
    type Error = ConnectionError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// A framed chat connection.
pub type ChatFramed<S> = Framed<S, ChatLineCodec>;

/// Wrap a stream in the chat line codec.
pub fn new_chat_framed<S: AsyncRead + AsyncWrite>(stream: S) -> ChatFramed<S> {
    Framed::new(stream, ChatLineCodec::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_crlf_and_lf() {
        let mut codec = ChatLineCodec::default();
        let mut buf = BytesMut::from("PING :tmi.twitch.tv\r\n:a!a@a PRIVMSG #b :c\n");

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PING :tmi.twitch.tv")
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(":a!a@a PRIVMSG #b :c")
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_partial_line() {
        let mut codec = ChatLineCodec::default();
        let mut buf = BytesMut::from("PING :tmi");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b".twitch.tv\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PING :tmi.twitch.tv")
        );
    }

    #[test]
    fn test_decode_rejects_oversized_line() {
        let mut codec = ChatLineCodec::default();
        let mut buf = BytesMut::from(vec![b'a'; MAX_LINE_LENGTH + 1].as_slice());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ConnectionError::LineTooLong { .. })
        ));
    }

    #[test]
    fn test_decode_eof_drops_partial() {
        let mut codec = ChatLineCodec::default();
        let mut buf = BytesMut::from("half a li");
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = ChatLineCodec::default();
        let mut buf = BytesMut::new();
        codec.encode("NICK justinfan123", &mut buf).unwrap();
        assert_eq!(&buf[..], b"NICK justinfan123\r\n");
    }
}
