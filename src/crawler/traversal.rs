//! Page traversal engine - one crawl attempt over the paginated listing
//!
//! This module walks the rendered table page by page:
//! - Opening the listing and waiting for the table to render
//! - Optionally enlarging the page length so fewer pages are needed
//! - Reading rows, skipping known registration numbers, storing new records
//! - Following the "next page" control until it is absent or disabled
//!
//! Any page-level failure ends the attempt. Retrying is the supervisor's job,
//! since a retry needs a fresh browser session.

use crate::config::{Config, SelectorConfig};
use crate::record::{candidate_id, normalize_row, RawRow};
use crate::render::{PageCondition, RenderSession};
use crate::state::{SeenIndex, TraversalState};
use crate::storage::{Storage, StorageError};
use crate::{HarvestError, Result};
use std::time::Duration;

/// Everything a traversal needs to know about the listing
#[derive(Debug, Clone)]
pub struct TraversalSettings {
    pub base_url: String,
    pub page_length: Option<u32>,
    pub selectors: SelectorConfig,
    pub table_timeout: Duration,
    pub overlay_timeout: Duration,
    /// Stop after this many pages; `None` walks to the last page
    pub max_pages: Option<u32>,
}

impl From<&Config> for TraversalSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.source.base_url.clone(),
            page_length: config.source.page_length,
            selectors: config.selectors.clone(),
            table_timeout: config.timeouts.table(),
            overlay_timeout: config.timeouts.overlay(),
            max_pages: (config.crawl.max_pages > 0).then_some(config.crawl.max_pages),
        }
    }
}

/// Counters for one crawl attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_visited: u32,
    pub rows_seen: u64,
    pub records_appended: u64,
    pub duplicates_skipped: u64,
    pub malformed_dropped: u64,
    /// The page cap ended the attempt before the last page
    pub page_cap_reached: bool,
}

/// One crawl attempt bound to a live session
pub struct Traversal<'a, R: RenderSession, S: Storage + ?Sized> {
    session: &'a mut R,
    store: &'a S,
    settings: &'a TraversalSettings,
    seen: SeenIndex,
    state: TraversalState,
    report: CrawlReport,
}

impl<'a, R: RenderSession, S: Storage> Traversal<'a, R, S> {
    /// Creates a traversal, bootstrapping the seen index from the store
    pub fn new(session: &'a mut R, store: &'a S, settings: &'a TraversalSettings) -> Self {
        let seen = SeenIndex::load(store);
        Self {
            session,
            store,
            settings,
            seen,
            state: TraversalState::AwaitingTable,
            report: CrawlReport::default(),
        }
    }
}

impl<'a, R: RenderSession, S: Storage + ?Sized> Traversal<'a, R, S> {
    /// Runs the page loop until the last page or the first fatal error
    pub async fn run(mut self) -> Result<CrawlReport> {
        self.await_table().await?;
        self.apply_page_length().await?;
        self.transition(TraversalState::Extracting)?;

        loop {
            self.extract_page().await?;

            if !self.advance().await? {
                break;
            }
        }

        tracing::info!(
            "Traversal done: {} pages, {} rows, {} new, {} known, {} malformed",
            self.report.pages_visited,
            self.report.rows_seen,
            self.report.records_appended,
            self.report.duplicates_skipped,
            self.report.malformed_dropped
        );

        Ok(self.report)
    }

    /// Opens the listing and waits for the table to render
    async fn await_table(&mut self) -> Result<()> {
        let settings = self.settings;
        let selector = &settings.selectors.table_wrapper;
        let page_load = |message: String| HarvestError::PageLoad {
            selector: selector.clone(),
            message,
        };

        self.session
            .goto(&settings.base_url)
            .await
            .map_err(|e| page_load(e.to_string()))?;
        self.session
            .wait_for_selector(selector, settings.table_timeout)
            .await
            .map_err(|e| page_load(e.to_string()))?;

        tracing::debug!("Table is ready");
        Ok(())
    }

    /// Requests a larger page length when the listing offers the input
    async fn apply_page_length(&mut self) -> Result<()> {
        let settings = self.settings;
        let Some(length) = settings.page_length else {
            return Ok(());
        };
        let selectors = &settings.selectors;

        let present = self
            .session
            .exists(&selectors.page_length_input)
            .await
            .map_err(|e| self.page_error(e))?;
        if !present {
            tracing::debug!("No page-length input, keeping the default page size");
            return Ok(());
        }

        tracing::info!("Setting rows per page to {}", length);
        self.session
            .set_input_value(&selectors.page_length_input, &length.to_string())
            .await
            .map_err(|e| self.page_error(e))?;
        self.session
            .wait_for_condition(
                &PageCondition::OverlayHidden(selectors.overlay.clone()),
                settings.overlay_timeout,
            )
            .await
            .map_err(|e| self.page_error(e))?;

        Ok(())
    }

    /// Reads the current page and stores every new record on it
    async fn extract_page(&mut self) -> Result<()> {
        let page = self.report.pages_visited + 1;
        let settings = self.settings;
        let selectors = &settings.selectors;

        self.session
            .wait_for_selector(&selectors.rows, settings.table_timeout)
            .await
            .map_err(|e| self.page_error(e))?;
        let rows = self
            .session
            .read_rows(&selectors.rows)
            .await
            .map_err(|e| self.page_error(e))?;

        tracing::debug!("Page {}: {} rows", page, rows.len());
        self.report.pages_visited = page;
        self.ingest_rows(rows)
    }

    /// Normalizes and stores rows not yet in the seen index, top to bottom
    fn ingest_rows(&mut self, rows: Vec<RawRow>) -> Result<()> {
        for row in rows {
            self.report.rows_seen += 1;

            let id = match candidate_id(&row) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!("Dropping row on page {}: {}", self.report.pages_visited, e);
                    self.report.malformed_dropped += 1;
                    continue;
                }
            };

            if self.seen.contains(&id) {
                self.report.duplicates_skipped += 1;
                continue;
            }

            let record = match normalize_row(&row) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Dropping row {}: {}", id, e);
                    self.report.malformed_dropped += 1;
                    continue;
                }
            };

            match self.store.append(record) {
                Ok(()) => {
                    tracing::debug!("Stored {}", id);
                    self.report.records_appended += 1;
                }
                Err(StorageError::Duplicate(_)) => {
                    tracing::warn!("{} was already in the store but not in the seen index", id);
                    self.report.duplicates_skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
            self.seen.insert(id);
        }

        Ok(())
    }

    /// Moves to the next page if there is one
    ///
    /// Returns false once the traversal is `Done`.
    async fn advance(&mut self) -> Result<bool> {
        let settings = self.settings;
        let selectors = &settings.selectors;
        let control = self
            .session
            .next_control(&selectors.next_button)
            .await
            .map_err(|e| self.page_error(e))?;

        if !control.is_enabled() {
            self.transition(TraversalState::NoNextPage)?;
            tracing::info!("Last page reached ({:?} next control)", control);
            self.transition(TraversalState::Done)?;
            return Ok(false);
        }

        self.transition(TraversalState::HasNextPage)?;

        if let Some(cap) = settings.max_pages {
            if self.report.pages_visited >= cap {
                tracing::info!("Page cap of {} reached, stopping", cap);
                self.report.page_cap_reached = true;
                self.transition(TraversalState::Done)?;
                return Ok(false);
            }
        }

        tracing::debug!("Navigating to page {}", self.report.pages_visited + 1);
        let overlay_shown = PageCondition::OverlayVisible(selectors.overlay.clone());
        self.session
            .watch(&overlay_shown)
            .await
            .map_err(|e| self.page_error(e))?;
        self.session
            .click(&selectors.next_button)
            .await
            .map_err(|e| self.page_error(e))?;

        // The overlay must be seen going up before its disappearance means
        // the new page has rendered.
        for condition in [
            overlay_shown,
            PageCondition::OverlayHidden(selectors.overlay.clone()),
        ] {
            self.session
                .wait_for_condition(&condition, settings.overlay_timeout)
                .await
                .map_err(|e| self.page_error(e))?;
        }

        self.transition(TraversalState::Extracting)?;
        Ok(true)
    }

    fn transition(&mut self, next: TraversalState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!("{} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn page_error(&self, error: crate::RenderError) -> HarvestError {
        HarvestError::PageTraversal {
            page: self.report.pages_visited + 1,
            message: error.to_string(),
        }
    }
}
