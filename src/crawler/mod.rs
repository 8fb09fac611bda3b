//! Crawler module for walking the product listing
//!
//! This module contains the crawl logic, including:
//! - The page-by-page traversal state machine
//! - Whole-attempt retries behind a single-flight guard
//! - The cron trigger that runs crawls on a schedule

mod schedule;
mod supervisor;
mod traversal;

pub use schedule::{run_scheduled, run_scheduled_until, start_scheduler, trigger, CrawlSchedule};
pub use supervisor::{AttemptLimit, RetryPolicy, RunOutcome, Supervisor};
pub use traversal::{CrawlReport, Traversal, TraversalSettings};

use crate::config::Config;
use crate::render::ChromeRenderer;
use crate::storage::JsonStore;
use crate::Result;
use std::sync::Arc;

/// Builds the production supervisor for a configuration
///
/// # Arguments
///
/// * `config` - The validated harvester configuration
///
/// # Returns
///
/// A supervisor driving headless Chromium against the configured JSON store
pub fn build_supervisor(config: &Config) -> Supervisor<ChromeRenderer, JsonStore> {
    Supervisor::new(
        ChromeRenderer::new(config.browser.clone()),
        Arc::new(JsonStore::new(&config.output.store_path)),
        TraversalSettings::from(config),
        RetryPolicy::from(&config.crawl),
    )
}

/// Runs a single supervised crawl
///
/// # Arguments
///
/// * `config` - The validated harvester configuration
///
/// # Returns
///
/// * `Ok(RunOutcome)` - How the crawl ended
/// * `Err(HarvestError)` - Every allowed attempt failed
pub async fn crawl_once(config: &Config) -> Result<RunOutcome> {
    build_supervisor(config).run().await
}

/// Triggers a crawl at startup (if configured) and then on every schedule tick
/// until Ctrl-C
pub async fn serve_schedule(config: &Config) -> Result<()> {
    let supervisor = Arc::new(build_supervisor(config));
    run_scheduled(supervisor, &config.crawl.schedule, config.crawl.run_at_startup).await
}
