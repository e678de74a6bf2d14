//! 🔄 RetryingFetcher: asks the remote again, and again, and again, a little slower each time.
//!
//! 🎬 *[the remote returns 503. the fetcher sighs, sleeps 0.6s, asks again.]*
//! *[503. sleeps 0.9s. asks again.]*
//! *[200 OK. nobody upstream ever finds out. that's the whole job.]*
//!
//! 🧠 Knowledge graph:
//! - Sleep = `base * (1 + jitter)`, jitter uniform in `[0, policy.jitter)`, clamped to `max_delay`,
//!   and never shorter than the previous sleep. So the sleep sequence is non-decreasing and bounded.
//! - After each failure the base grows by [`Growth`] and is clamped to `max_delay`.
//! - Transient errors retry forever unless `max_attempts` says otherwise.
//! - Terminal errors (not found, forbidden, garbage) get `terminal_attempts` tries total, then
//!   surface as an `Err` so the walker can publish a failure instead of spinning forever.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backends::{ProviderError, TreeProvider};
use crate::common::{ChildPage, Entry, NodeId, Operation};

/// 📈 How the backoff base grows after each failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Growth {
    /// ✖️ `base * factor`.
    Multiplicative(f64),
    /// 💥 `(base in ms)²`. Bug-compatible with the old tool. Subtle as a brick.
    Squared,
}

impl Growth {
    fn grow(self, base: Duration, max: Duration) -> Duration {
        let next_secs = match self {
            Growth::Multiplicative(factor) => base.as_secs_f64() * factor,
            Growth::Squared => {
                let millis = base.as_secs_f64() * 1000.0;
                millis * millis / 1000.0
            }
        };
        // -- 🧯 overflow or NaN means "very big", and very big means the ceiling
        Duration::try_from_secs_f64(next_secs)
            .unwrap_or(max)
            .max(base)
            .min(max)
    }
}

/// 🔧 Validated retry settings. Build one from [`RetryConfig`](super::config::RetryConfig).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub growth: Growth,
    pub jitter: f64,
    pub terminal_attempts: u32,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(120),
            growth: Growth::Multiplicative(1.5),
            jitter: 0.5,
            terminal_attempts: 3,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.base_delay.min(self.max_delay),
            max: self.max_delay,
            growth: self.growth,
            jitter: self.jitter,
            last: Duration::ZERO,
        }
    }

    /// 🧮 How many attempts an error of this flavour gets in total. `None` = unlimited.
    fn attempt_budget(&self, err: &ProviderError) -> Option<u32> {
        if err.is_retryable() {
            self.max_attempts
        } else {
            Some(self.terminal_attempts)
        }
    }
}

/// ⏳ The sequence of sleeps for one call's string of failures. Infinite, non-decreasing, bounded.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    growth: Growth,
    jitter: f64,
    last: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(rand::random::<f64>())
    }

    /// 🎲 Same as [`next_delay`](Self::next_delay) with the dice already rolled (`unit` in `[0, 1)`).
    pub fn next_delay_with(&mut self, unit: f64) -> Duration {
        let unit = if unit.is_finite() { unit.clamp(0.0, 1.0) } else { 0.0 };
        let stretched = self.base.mul_f64(1.0 + unit * self.jitter).min(self.max);
        let delay = stretched.max(self.last);
        self.last = delay;
        self.base = self.growth.grow(self.base, self.max);
        delay
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}

/// 📡 Wraps a provider's two read calls in the same patient retry loop.
#[derive(Debug)]
pub(crate) struct RetryingFetcher<P> {
    provider: Arc<P>,
    policy: RetryPolicy,
    retries: AtomicU64,
}

impl<P: TreeProvider> RetryingFetcher<P> {
    pub(crate) fn new(provider: Arc<P>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            retries: AtomicU64::new(0),
        }
    }

    /// 📊 Sleeps taken so far, across every call.
    pub(crate) fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub(crate) async fn get_node(&self, id: &NodeId) -> Result<Entry, ProviderError> {
        self.with_retry(Operation::GetNode, id, None, || self.provider.get_node(id))
            .await
    }

    pub(crate) async fn list_children(
        &self,
        id: &NodeId,
        cursor: Option<&str>,
    ) -> Result<ChildPage, ProviderError> {
        self.with_retry(Operation::ListChildren, id, cursor, || {
            self.provider.list_children(id, cursor)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: Operation,
        id: &NodeId,
        cursor: Option<&str>,
        mut call: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut backoff = self.policy.backoff();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let err = match call().await {
                Ok(value) => {
                    debug!("📡 {}({}, {:?}): {:?}", operation, id, cursor, started.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            if self
                .policy
                .attempt_budget(&err)
                .is_some_and(|budget| attempt >= budget)
            {
                warn!(
                    "💀 Giving up on {}({}, {:?}) after {} attempt(s): {}",
                    operation, id, cursor, attempt, err
                );
                return Err(err);
            }

            let delay = backoff.next_delay();
            self.retries.fetch_add(1, Ordering::Relaxed);
            warn!(
                "🔄 Failed {}({}, {:?}) on attempt {}: {}. Retrying in {:?}",
                operation, id, cursor, attempt, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
