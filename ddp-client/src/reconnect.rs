//! Reconnection strategies
//!
//! A single [`crate::DdpClient`] never reconnects; its transport is done once
//! closed. [`crate::ReconnectingClient`] layers reconnection on top, asking a
//! strategy how long to wait before each new connection and when to stop.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: doubling delays up to a cap, optional jitter
//! - **FixedDelay**: the same delay every time
//! - **NoReconnect**: give up on the first drop
//!
//! Implement [`ReconnectionStrategy`] for anything else.
//!
//! # Examples
//!
//! ```rust
//! use ddp_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_millis(250), Duration::from_secs(8))
//!     .with_max_attempts(5);
//! assert_eq!(backoff.next_delay(2), Some(Duration::from_secs(1)));
//! assert_eq!(backoff.next_delay(5), None);
//! ```

use std::time::Duration;

/// Decides whether and when to reconnect after the connection drops
///
/// `attempt` counts consecutive failed connections since the last one that
/// opened, starting at 0. `reset()` is called each time a connection opens.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next attempt, or `None` to give up
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    fn reset(&mut self);
}

/// Exponential backoff with optional jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Delays run `min_delay * 2^attempt`, capped at `max_delay`; unlimited attempts
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            current_attempt: 0,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random extra delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ExponentialBackoff {
    /// 100ms to 30s, 10 attempts, jitter on
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.current_attempt = attempt;

        if matches!(self.max_attempts, Some(max) if attempt >= max) {
            return None;
        }

        let cap = self.max_delay.as_millis() as u64;
        let base = (self.min_delay.as_millis() as u64)
            .checked_mul(2u64.checked_pow(attempt).unwrap_or(u64::MAX))
            .unwrap_or(u64::MAX);
        let delay = base.min(cap);

        if self.jitter {
            use rand::Rng;
            let extra = rand::thread_rng().gen_range(0..=delay / 4);
            return Some(Duration::from_millis(delay + extra));
        }

        Some(Duration::from_millis(delay))
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {}
}

/// Never reconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
