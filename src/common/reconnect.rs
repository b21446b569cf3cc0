//! Fixed-interval reconnection with a cooldown after a failed window.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBackoff, ConstantBuilder};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::common::error::{ConnectionError, ConnectionResult};

/// Retry timing for dialing an endpoint.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between consecutive attempts.
    pub interval: Duration,
    /// How long a round of attempts may last before backing off.
    pub window: Duration,
    /// Pause after a round has failed.
    pub cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ConstantBackoff {
        let interval_ms = self.interval.as_millis().max(1);
        let attempts = (self.window.as_millis() / interval_ms).max(1) as usize;
        ConstantBuilder::default()
            .with_delay(self.interval)
            .with_max_times(attempts)
            .build()
    }
}

/// Tracks the current round of attempts and produces the next delay.
pub struct RetryState {
    policy: RetryPolicy,
    backoff: ConstantBackoff,
    round_started: Option<Instant>,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.backoff();
        Self {
            policy,
            backoff,
            round_started: None,
        }
    }

    /// Delay to wait after a failed attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_at(Instant::now())
    }

    /// Delay to wait after an attempt that failed at `now`.
    pub fn next_delay_at(&mut self, now: Instant) -> Duration {
        let started = *self.round_started.get_or_insert(now);
        let expired = now.saturating_duration_since(started) >= self.policy.window;

        match self.backoff.next() {
            Some(delay) if !expired => delay,
            _ => {
                self.reset();
                self.policy.cooldown
            }
        }
    }

    /// Start a fresh round, e.g. after a successful connection.
    pub fn reset(&mut self) {
        self.backoff = self.policy.backoff();
        self.round_started = None;
    }
}

/// Sleep for `delay` unless cancellation fires first.
pub async fn wait_or_cancel(delay: Duration, cancel: &CancellationToken) -> ConnectionResult<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
    }
}

/// Run `attempt` until it succeeds, fails fatally, or `cancel` fires.
///
/// Transient failures are spaced by the delays from `state`. A success
/// resets the round.
pub async fn retry_until_connected<T, F, Fut>(
    state: &mut RetryState,
    cancel: &CancellationToken,
    endpoint: &str,
    mut attempt: F,
) -> ConnectionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ConnectionResult<T>>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }

        let result = tokio::select! {
            result = attempt() => result,
            _ = cancel.cancelled() => return Err(ConnectionError::Cancelled),
        };

        match result {
            Ok(value) => {
                state.reset();
                return Ok(value);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let delay = state.next_delay();
                warn!(
                    "Failed to connect to {}: {}, retrying in {:.1}s...",
                    endpoint,
                    e,
                    delay.as_secs_f64()
                );
                wait_or_cancel(delay, cancel).await?;
            }
        }
    }
}
