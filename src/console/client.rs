//! Outbound connection to the remote console.
//!
//! The client announces its name, asks for a frame delimiter, then runs a
//! reader (delimiter updates and command lines) and a writer (the outbound
//! queue) side by side until the socket drops.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::error::{ConnectionError, ConnectionResult};
use crate::common::reconnect::{retry_until_connected, wait_or_cancel, RetryPolicy, RetryState};
use crate::config::types::ConsoleConfig;
use crate::console::dispatcher::{CommandRegistry, ConsoleSink};
use crate::protocol::console::{
    frame_message, new_console_framed, ConsoleFrame, ConsoleLine,
};

#[derive(Default)]
struct Shared {
    /// Empty until the console announces one.
    delimiter: RwLock<String>,
    /// Present only while a connection is up.
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

/// Cheap, cloneable handle for writing to the console.
///
/// Writes made while no connection is up are dropped.
#[derive(Clone, Default)]
pub struct ConsoleHandle {
    shared: Arc<Shared>,
}

impl ConsoleHandle {
    /// A handle with no connection behind it; every write is dropped.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Frame `text` with the current delimiter and queue it.
    pub fn enqueue(&self, text: &str) {
        let outbound = self
            .shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(tx) = outbound.as_ref() else {
            debug!("Console not connected, dropping message");
            return;
        };

        let frame = frame_message(text, &self.delimiter());
        if tx.send(frame).is_err() {
            debug!("Console writer gone, dropping message");
        }
    }

    pub fn delimiter(&self) -> String {
        self.shared
            .delimiter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[cfg(test)]
    pub fn is_connected(&self) -> bool {
        self.shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set_delimiter(&self, delimiter: String) {
        *self
            .shared
            .delimiter
            .write()
            .unwrap_or_else(PoisonError::into_inner) = delimiter;
    }

    fn attach(&self) -> mpsc::UnboundedReceiver<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    fn detach(&self) {
        self.shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl ConsoleSink for ConsoleHandle {
    fn send(&self, text: &str) {
        self.enqueue(text);
    }
}

/// Owns the console connection lifecycle.
pub struct ConsoleClient {
    config: ConsoleConfig,
    registry: Arc<CommandRegistry>,
    handle: ConsoleHandle,
    policy: RetryPolicy,
}

impl ConsoleClient {
    pub fn new(config: ConsoleConfig, registry: Arc<CommandRegistry>, handle: ConsoleHandle) -> Self {
        Self {
            config,
            registry,
            handle,
            policy: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    pub fn handle(&self) -> ConsoleHandle {
        self.handle.clone()
    }

    #[cfg(test)]
    fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Connect, serve the session, and reconnect after drops until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let addr = self.config.addr();
        let mut retry = RetryState::new(self.policy.clone());

        loop {
            let connected = retry_until_connected(&mut retry, &cancel, &addr, || {
                let addr = addr.clone();
                async move {
                    TcpStream::connect(&addr)
                        .await
                        .map_err(|source| ConnectionError::ConnectFailed { addr, source })
                }
            })
            .await;

            let stream = match connected {
                Ok(stream) => stream,
                Err(ConnectionError::Cancelled) => break,
                Err(e) => {
                    error!("Console connection abandoned: {}", e);
                    break;
                }
            };

            info!("Connected to console at {}", addr);
            match self.run_session(stream, &cancel).await {
                Ok(()) => info!("Console connection closed"),
                Err(ConnectionError::Cancelled) => break,
                Err(e) => warn!("Console connection lost: {}", e),
            }

            if wait_or_cancel(self.policy.interval, &cancel).await.is_err() {
                break;
            }
        }

        self.handle.detach();
        info!("Console task ended");
    }

    /// Handshake and pump one connection until it closes.
    pub async fn run_session<S>(&self, stream: S, cancel: &CancellationToken) -> ConnectionResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = new_console_framed(stream);
        framed
            .feed(ConsoleFrame::SetName(self.config.identity.clone()))
            .await?;
        framed.feed(ConsoleFrame::GetDelimiter).await?;
        framed.flush().await?;

        let mut outbound = self.handle.attach();
        let (mut sink, mut lines) = framed.split();

        let reader = async {
            while let Some(line) = lines.next().await {
                match line? {
                    ConsoleLine::Delimiter(delimiter) => {
                        debug!("Console delimiter set to {:?}", delimiter);
                        self.handle.set_delimiter(delimiter);
                    }
                    ConsoleLine::Command(command) => {
                        self.registry.dispatch(&command, &self.handle);
                    }
                }
            }
            Ok::<(), ConnectionError>(())
        };

        let writer = async {
            while let Some(frame) = outbound.recv().await {
                sink.send(ConsoleFrame::Message(frame)).await?;
            }
            Ok::<(), ConnectionError>(())
        };

        let result = tokio::select! {
            result = reader => result,
            result = writer => result,
            _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
        };

        self.handle.detach();
        result
    }
}
