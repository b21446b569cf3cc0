//! Chat ingestion loop: stay connected and feed every line to the handler.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::error::{ConnectionError, ConnectionResult};
use crate::common::reconnect::{retry_until_connected, wait_or_cancel, RetryPolicy, RetryState};
use crate::common::types::{ChannelSet, Credentials};
use crate::ingest::handler::DonationHandler;
use crate::protocol::chat::{ChatConnection, ChatMessage};

/// Handler calls allowed in flight at once.
pub const MAX_IN_FLIGHT: usize = 32;

pub struct IngestClient {
    host: String,
    port: u16,
    credentials: Credentials,
    channels: ChannelSet,
    handler: Arc<DonationHandler>,
    permits: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl IngestClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        channels: ChannelSet,
        handler: Arc<DonationHandler>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            channels,
            handler,
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
            policy: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run until cancelled. Returns an error only when login is rejected.
    pub async fn run(self, cancel: CancellationToken) -> ConnectionResult<()> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let mut retry = RetryState::new(self.policy.clone());

        loop {
            let connected = retry_until_connected(&mut retry, &cancel, &endpoint, || {
                ChatConnection::connect(&self.host, self.port, &self.credentials, &self.channels)
            })
            .await;

            let conn = match connected {
                Ok(conn) => conn,
                Err(ConnectionError::Cancelled) => break,
                Err(e) => {
                    error!("Chat login rejected: {}", e);
                    return Err(e);
                }
            };

            match self.run_session(conn, &cancel).await {
                Ok(()) => info!("Chat connection closed"),
                Err(ConnectionError::Cancelled) => break,
                Err(e) => warn!("Chat connection lost: {}, reconnecting", e),
            }

            if wait_or_cancel(self.policy.interval, &cancel).await.is_err() {
                break;
            }
        }

        info!("Chat ingestion stopped");
        Ok(())
    }

    /// Read one connection until it drops or `cancel` fires.
    pub async fn run_session<S>(
        &self,
        mut conn: ChatConnection<S>,
        cancel: &CancellationToken,
    ) -> ConnectionResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let message = tokio::select! {
                message = conn.read_message() => message,
                _ = cancel.cancelled() => {
                    let _ = conn.close().await;
                    return Err(ConnectionError::Cancelled);
                }
            };

            match message {
                Ok(ping @ ChatMessage::Ping { .. }) => debug!("Keep-alive answered: {}", ping.raw()),
                Ok(message) => self.dispatch(message).await?,
                Err(ConnectionError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Hand a message to the handler without blocking the reader, bounded
    /// by the permit pool.
    async fn dispatch(&self, message: ChatMessage) -> ConnectionResult<()> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ConnectionError::Cancelled)?;

        debug!(
            "Dispatching {} message for {}",
            message.kind(),
            message.channel().unwrap_or("-")
        );
        let handler = self.handler.clone();
        tokio::task::spawn_blocking(move || {
            handler.handle(&message);
            drop(permit);
        });
        Ok(())
    }
}
