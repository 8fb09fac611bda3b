//! Schedule trigger for recurring crawls
//!
//! One crawl runs when the scheduler starts and another on every tick of the
//! configured cron expression, evaluated in the local time zone. Every
//! trigger goes through the supervisor's single-flight guard, so a tick that
//! lands during a long crawl is skipped.

use crate::crawler::supervisor::{RunOutcome, Supervisor};
use crate::render::Renderer;
use crate::storage::Storage;
use crate::{HarvestError, Result};
use chrono::{DateTime, Local};
use std::future::Future;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

fn schedule_error(context: &str, e: JobSchedulerError) -> HarvestError {
    HarvestError::Schedule(format!("{}: {}", context, e))
}

/// Runs one supervised crawl and logs how it ended
pub async fn trigger<R, S>(supervisor: &Supervisor<R, S>)
where
    R: Renderer,
    S: Storage,
{
    match supervisor.run().await {
        Ok(RunOutcome::Completed { report, attempts }) => tracing::info!(
            "Scheduled crawl completed in {} attempt(s), {} pages, {} new records",
            attempts,
            report.pages_visited,
            report.records_appended
        ),
        Ok(RunOutcome::Skipped) => tracing::info!("Scheduled crawl skipped"),
        Err(e) => tracing::error!("Scheduled crawl failed: {}", e),
    }
}

/// A started scheduler with the crawl job registered
pub struct CrawlSchedule {
    scheduler: JobScheduler,
    job_id: Uuid,
}

impl CrawlSchedule {
    /// When the crawl job fires next, in local time
    pub async fn next_run(&mut self) -> Result<Option<DateTime<Local>>> {
        let next = self
            .scheduler
            .next_tick_for_job(self.job_id)
            .await
            .map_err(|e| schedule_error("reading next tick", e))?;
        Ok(next.map(|tick| tick.with_timezone(&Local)))
    }

    /// Stops ticking; a crawl already running is not interrupted
    pub async fn shutdown(mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| schedule_error("shutting down scheduler", e))
    }
}

/// Builds the cron job that triggers a crawl on every tick of `cron`
fn crawl_job<R, S>(supervisor: Arc<Supervisor<R, S>>, cron: &str) -> Result<Job>
where
    R: Renderer + 'static,
    S: Storage + 'static,
{
    Job::new_async_tz(cron, Local, move |_uuid, _scheduler| {
        let supervisor = supervisor.clone();
        Box::pin(async move {
            trigger(&supervisor).await;
        })
    })
    .map_err(|e| schedule_error(&format!("invalid schedule '{}'", cron), e))
}

/// Starts a scheduler that triggers a crawl on every `cron` tick
pub async fn start_scheduler<R, S>(
    supervisor: Arc<Supervisor<R, S>>,
    cron: &str,
) -> Result<CrawlSchedule>
where
    R: Renderer + 'static,
    S: Storage + 'static,
{
    let job = crawl_job(supervisor, cron)?;

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| schedule_error("creating scheduler", e))?;
    let job_id = scheduler
        .add(job)
        .await
        .map_err(|e| schedule_error("adding crawl job", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| schedule_error("starting scheduler", e))?;

    let mut schedule = CrawlSchedule { scheduler, job_id };
    match schedule.next_run().await? {
        Some(next) => tracing::info!("Crawl scheduled with '{}', next run at {}", cron, next),
        None => tracing::warn!("Schedule '{}' never fires", cron),
    }
    Ok(schedule)
}

/// Serves the schedule until Ctrl-C
pub async fn run_scheduled<R, S>(
    supervisor: Arc<Supervisor<R, S>>,
    cron: &str,
    run_at_startup: bool,
) -> Result<()>
where
    R: Renderer + 'static,
    S: Storage + 'static,
{
    run_scheduled_until(supervisor, cron, run_at_startup, tokio::signal::ctrl_c()).await
}

/// Serves the schedule until `shutdown` resolves
///
/// With `run_at_startup` a crawl is triggered right away, alongside the
/// scheduler. A startup crawl still running at shutdown is aborted.
pub async fn run_scheduled_until<R, S, F>(
    supervisor: Arc<Supervisor<R, S>>,
    cron: &str,
    run_at_startup: bool,
    shutdown: F,
) -> Result<()>
where
    R: Renderer + 'static,
    S: Storage + 'static,
    F: Future<Output = std::io::Result<()>>,
{
    let schedule = start_scheduler(supervisor.clone(), cron).await?;

    let startup = run_at_startup.then(|| {
        let supervisor = supervisor.clone();
        tokio::spawn(async move { trigger(&supervisor).await })
    });

    let signal = shutdown.await;
    tracing::info!("Shutting down scheduler");

    if let Some(handle) = startup {
        handle.abort();
    }
    schedule.shutdown().await?;

    signal?;
    Ok(())
}
