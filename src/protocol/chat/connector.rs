//! Chat server TCP connection and login.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::common::error::{ConnectionError, ConnectionResult};
use crate::common::types::{ChannelSet, Credentials};
use crate::protocol::chat::codec::{new_chat_framed, ChatFramed};
use crate::protocol::chat::message::{classify, pong_for, ChatMessage, PING_MARKER};

/// Default chat endpoint.
pub const DEFAULT_HOST: &str = "irc.chat.twitch.tv";
pub const DEFAULT_PORT: u16 = 6667;

/// Deadline for the server to confirm the login.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(30);

const AUTH_FAILURE_MARKERS: [&str; 2] = ["Login authentication failed", "Improperly formatted auth"];

/// An authenticated chat connection with its channels joined.
///
/// Owned by a single reading task.
pub struct ChatConnection<S> {
    framed: ChatFramed<S>,
}

impl ChatConnection<TcpStream> {
    /// Dial the chat server, log in and join `channels`.
    pub async fn connect(
        host: &str,
        port: u16,
        credentials: &Credentials,
        channels: &ChannelSet,
    ) -> ConnectionResult<Self> {
        let addr = format!("{}:{}", host, port);
        info!("Connecting to chat server at {}", addr);

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ConnectionError::ConnectFailed {
                addr: addr.clone(),
                source: e,
            })?;

        Self::handshake(stream, credentials, channels, AUTH_TIMEOUT).await
    }
}

impl<S> ChatConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Send the login lines and wait for the welcome or a failure marker.
    pub async fn handshake(
        stream: S,
        credentials: &Credentials,
        channels: &ChannelSet,
        deadline: Duration,
    ) -> ConnectionResult<Self> {
        let mut framed = new_chat_framed(stream);

        framed.feed(format!("PASS {}", credentials.oauth)).await?;
        framed.feed(format!("NICK {}", credentials.nick)).await?;
        for channel in channels.iter() {
            framed.feed(format!("JOIN {}", channel)).await?;
        }
        SinkExt::<String>::flush(&mut framed).await?;
        debug!(
            "Sent login for {} and {} JOIN lines",
            credentials.nick,
            channels.len()
        );

        match tokio::time::timeout(deadline, wait_for_welcome(&mut framed, &credentials.nick)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConnectionError::AuthTimeout {
                    secs: deadline.as_secs(),
                })
            }
        }

        info!(
            "Logged in as {}, joined {} channel(s)",
            credentials.nick,
            channels.len()
        );

        Ok(Self { framed })
    }

    /// Read the next line. Pings are answered before the line is returned.
    pub async fn read_line(&mut self) -> ConnectionResult<String> {
        let line = next_line(&mut self.framed).await?;
        if line.starts_with(PING_MARKER) {
            answer_ping(&mut self.framed, &line).await?;
        }
        Ok(line)
    }

    /// Read and classify the next line.
    pub async fn read_message(&mut self) -> ConnectionResult<ChatMessage> {
        let line = self.read_line().await?;
        Ok(classify(&line))
    }

    /// Flush pending writes and shut the socket down.
    pub async fn close(&mut self) -> ConnectionResult<()> {
        SinkExt::<String>::close(&mut self.framed).await
    }
}

async fn next_line<S>(framed: &mut ChatFramed<S>) -> ConnectionResult<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match framed.next().await {
        Some(line) => line,
        None => Err(ConnectionError::ConnectionClosed),
    }
}

async fn answer_ping<S>(framed: &mut ChatFramed<S>, line: &str) -> ConnectionResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pong = pong_for(line);
    debug!("Answering keep-alive: {}", pong);
    framed.send(pong).await
}

async fn wait_for_welcome<S>(framed: &mut ChatFramed<S>, nick: &str) -> ConnectionResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let welcome = format!("001 {}", nick.to_lowercase());

    loop {
        let line = next_line(framed).await?;

        if line.starts_with(PING_MARKER) {
            answer_ping(framed, &line).await?;
            continue;
        }

        if let Some(marker) = AUTH_FAILURE_MARKERS.iter().find(|m| line.contains(*m)) {
            return Err(ConnectionError::AuthFailed {
                reason: marker.to_string(),
            });
        }

        if line.to_lowercase().contains(&welcome) {
            return Ok(());
        }

        debug!("Login pending, skipping: {}", line);
    }
}
