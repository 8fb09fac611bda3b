//! Crawl supervisor - whole-attempt retries and the single-flight guard
//!
//! A failed attempt is never resumed. The supervisor closes the session,
//! launches a new one, reloads the seen index from the store, and walks the
//! listing again from the first page. Records stored before the failure are
//! kept, so a retry only appends what the failed attempt did not reach.

use crate::config::CrawlConfig;
use crate::crawler::traversal::{CrawlReport, Traversal, TraversalSettings};
use crate::render::{RenderSession, Renderer};
use crate::storage::Storage;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How many attempts a crawl may make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    /// Retry until an attempt succeeds
    Unbounded,
    /// Give up after this many attempts
    Bounded(u32),
}

/// Retry behaviour for whole crawl attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub limit: AttemptLimit,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retry forever with no delay
    pub fn unbounded() -> Self {
        Self {
            limit: AttemptLimit::Unbounded,
            backoff: Duration::ZERO,
        }
    }

    /// At most `max_attempts` attempts with no delay
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            limit: AttemptLimit::Bounded(max_attempts.max(1)),
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns true if another attempt may follow `attempts_made` failures
    pub fn allows_retry(&self, attempts_made: u32) -> bool {
        match self.limit {
            AttemptLimit::Unbounded => true,
            AttemptLimit::Bounded(max) => attempts_made < max,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl From<&CrawlConfig> for RetryPolicy {
    fn from(config: &CrawlConfig) -> Self {
        let policy = match config.max_attempts {
            0 => Self::unbounded(),
            n => Self::bounded(n),
        };
        policy.with_backoff(Duration::from_millis(config.retry_backoff_ms))
    }
}

/// Result of asking the supervisor to crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A traversal reached its last page (or page cap)
    Completed { report: CrawlReport, attempts: u32 },
    /// Another crawl held the guard; nothing was done
    Skipped,
}

/// Runs crawls one at a time and retries failed attempts
pub struct Supervisor<R: Renderer, S: Storage> {
    renderer: R,
    store: Arc<S>,
    settings: TraversalSettings,
    policy: RetryPolicy,
    guard: Arc<Semaphore>,
}

impl<R: Renderer, S: Storage> Supervisor<R, S> {
    pub fn new(
        renderer: R,
        store: Arc<S>,
        settings: TraversalSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            renderer,
            store,
            settings,
            policy,
            guard: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns true while a crawl holds the guard
    pub fn is_running(&self) -> bool {
        self.guard.available_permits() == 0
    }

    /// Runs one crawl to completion, retrying per the policy
    ///
    /// Returns `RunOutcome::Skipped` immediately if a crawl is already in
    /// progress. With a bounded policy the last attempt's error is returned
    /// once the attempts are used up.
    pub async fn run(&self) -> Result<RunOutcome> {
        let Ok(_permit) = self.guard.clone().try_acquire_owned() else {
            tracing::warn!("A crawl is already running, skipping this trigger");
            return Ok(RunOutcome::Skipped);
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            tracing::info!("Starting crawl attempt {}", attempts);

            match self.attempt().await {
                Ok(report) => {
                    tracing::info!(
                        "Crawl finished after {} attempt(s): {} new records",
                        attempts,
                        report.records_appended
                    );
                    return Ok(RunOutcome::Completed { report, attempts });
                }
                Err(e) => {
                    tracing::error!("Crawl attempt {} failed: {}", attempts, e);
                    if !self.policy.allows_retry(attempts) {
                        tracing::error!("Giving up after {} attempt(s)", attempts);
                        return Err(e);
                    }
                    if !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                    tracing::info!("Retrying with a fresh session");
                }
            }
        }
    }

    /// One attempt: fresh session, fresh seen index, full traversal
    async fn attempt(&self) -> Result<CrawlReport> {
        let mut session = self.renderer.launch().await?;

        let result = Traversal::new(&mut session, self.store.as_ref(), &self.settings)
            .run()
            .await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close browser session: {}", e);
        }

        result
    }
}
