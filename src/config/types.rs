use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub output: OutputConfig,
}

/// Where the listing lives
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// URL of the paginated product listing
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Rows per page to request through the page-length input, if the page has one
    #[serde(rename = "page-length", default)]
    pub page_length: Option<u32>,
}

/// CSS selectors for the rendered listing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Wrapper that exists once the table script has rendered
    #[serde(rename = "table-wrapper")]
    pub table_wrapper: String,

    /// One match per data row
    pub rows: String,

    /// The "next page" control
    #[serde(rename = "next-button")]
    pub next_button: String,

    /// Blocking overlay shown while the table reloads
    pub overlay: String,

    /// Input that sets the number of rows per page
    #[serde(rename = "page-length-input")]
    pub page_length_input: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            table_wrapper: "#table_wrapper".to_string(),
            rows: "table tbody tr".to_string(),
            next_button: ".pagination-wrapper #custom_table_next".to_string(),
            overlay: ".block-ui-overlay".to_string(),
            page_length_input: "#customLength".to_string(),
        }
    }
}

/// Wait budgets (milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for the table and its rows to render
    #[serde(rename = "table-ms")]
    pub table_ms: u64,

    /// How long to wait for each phase of the loading overlay
    #[serde(rename = "overlay-ms")]
    pub overlay_ms: u64,
}

impl TimeoutConfig {
    pub fn table(&self) -> Duration {
        Duration::from_millis(self.table_ms)
    }

    pub fn overlay(&self) -> Duration {
        Duration::from_millis(self.overlay_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            table_ms: 60_000,
            overlay_ms: 600_000,
        }
    }
}

/// Crawl supervision settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum pages visited per attempt (0 = no cap)
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Maximum attempts per crawl (0 = retry until success)
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay between failed attempts
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,

    /// Cron expression (seconds first) for recurring crawls
    pub schedule: String,

    /// Run one crawl immediately when the scheduler starts
    #[serde(rename = "run-at-startup")]
    pub run_at_startup: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            max_attempts: 0,
            retry_backoff_ms: 0,
            schedule: "0 0 23 * * *".to_string(),
            run_at_startup: true,
        }
    }
}

/// Headless browser launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    #[serde(rename = "no-sandbox")]
    pub no_sandbox: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            executable: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the JSON store document
    #[serde(rename = "store-path")]
    pub store_path: String,
}
