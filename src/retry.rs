// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retry-with-backoff execution of page queries.
//!
//! Every query that goes through [`ResilientFetcher`] is paced twice: failed
//! attempts wait out the [`RetryPolicy`] backoff schedule, and a successful
//! attempt is followed by a throttle proportional to how long it took. Both
//! waits are deliberate rate limits against the remote site.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, error, info};

use crate::error::RetryExhausted;

/// Maximum number of attempts for a retried query
pub const MAX_ATTEMPTS: u32 = 10;

const FIRST_RETRY_DELAY: Duration = Duration::from_millis(10_000);
const SECOND_RETRY_DELAY: Duration = Duration::from_millis(60_000);
const LATER_RETRY_STEP: Duration = Duration::from_millis(30_000);

const THROTTLE_PADDING: Duration = Duration::from_millis(500);
const THROTTLE_CAP: Duration = Duration::from_millis(10_000);

/// Fixed backoff schedule for retried queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the 0-based `attempt` failed
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        match attempt {
            0 => FIRST_RETRY_DELAY,
            1 => SECOND_RETRY_DELAY,
            n => LATER_RETRY_STEP * n,
        }
    }

    /// Pause after a successful query that took `elapsed`
    pub fn throttle_delay(&self, elapsed: Duration) -> Duration {
        (elapsed + THROTTLE_PADDING).min(THROTTLE_CAP)
    }
}

/// Something that can wait for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A successfully fetched page: the parsed document and the body it came from
#[derive(Debug)]
pub struct FetchedPage {
    pub document: Html,
    pub raw: String,
}

/// Runs page queries under a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct ResilientFetcher<S = TokioSleeper> {
    policy: RetryPolicy,
    sleeper: S,
}

impl ResilientFetcher<TokioSleeper> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, TokioSleeper)
    }
}

impl Default for ResilientFetcher<TokioSleeper> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl<S: Sleeper> ResilientFetcher<S> {
    pub fn with_sleeper(policy: RetryPolicy, sleeper: S) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `query` until it yields a non-empty body or attempts run out
    ///
    /// `query` performs a single request and returns the body text, or `None`
    /// when the request failed. Empty bodies count as failures. `operation`
    /// names the query in log output.
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        mut query: F,
    ) -> Result<FetchedPage, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<String>>,
    {
        let max_attempts = self.policy.max_attempts;

        for attempt in 0..max_attempts {
            let started = Instant::now();

            if let Some(raw) = query().await.filter(|body| !body.is_empty()) {
                let throttle = self.policy.throttle_delay(started.elapsed());
                debug!(
                    operation,
                    attempt = attempt + 1,
                    throttle_ms = throttle.as_millis() as u64,
                    "Query succeeded"
                );
                self.sleeper.sleep(throttle).await;

                let document = Html::parse_document(&raw);
                return Ok(FetchedPage { document, raw });
            }

            error!(
                operation,
                attempt = attempt + 1,
                max_attempts,
                "No response for query"
            );

            if attempt + 1 < max_attempts {
                let delay = self.policy.backoff_delay(attempt);
                info!(
                    operation,
                    retry = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after backoff"
                );
                self.sleeper.sleep(delay).await;
            }
        }

        Err(RetryExhausted {
            operation: operation.to_string(),
            attempts: max_attempts,
        })
    }
}
