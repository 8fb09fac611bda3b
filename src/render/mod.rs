//! Rendering capability used by the traversal engine
//!
//! The listing is rendered client-side, so pages are driven through a real
//! browser. The crawler only depends on the two traits defined here:
//! - [`Renderer`] launches a fresh session per crawl attempt
//! - [`RenderSession`] navigates, waits, reads rows, and clicks
//!
//! [`ChromeRenderer`] is the production implementation on top of a headless
//! Chromium. Tests substitute scripted sessions.
//!
//! Every method is fallible and every wait takes an explicit timeout; a
//! session is stateful and must not be reused after an error.

mod chrome;
mod table;

pub use chrome::{ChromeRenderer, ChromeSession};
pub use table::parse_rows;

use crate::record::RawRow;
use crate::RenderResult;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Page conditions the engine can wait on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCondition {
    /// The overlay element exists and is displayed
    OverlayVisible(String),

    /// The overlay element is gone or hidden
    OverlayHidden(String),
}

impl fmt::Display for PageCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlayVisible(selector) => write!(f, "overlay {} to appear", selector),
            Self::OverlayHidden(selector) => write!(f, "overlay {} to disappear", selector),
        }
    }
}

/// State of the "next page" control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextControl {
    Absent,
    Disabled,
    Enabled,
}

impl NextControl {
    /// Returns true if activating the control would load another page
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// One live browser session on the listing
pub trait RenderSession: Send {
    /// Navigates to `url` and waits for the load to settle
    fn goto(&mut self, url: &str) -> impl Future<Output = RenderResult<()>> + Send;

    /// Waits until `selector` matches at least one element
    fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = RenderResult<()>> + Send;

    /// Starts recording `condition` in the page
    ///
    /// A later `wait_for_condition` on the same condition succeeds if it held
    /// at any moment since this call, even if it no longer holds.
    fn watch(
        &mut self,
        condition: &PageCondition,
    ) -> impl Future<Output = RenderResult<()>> + Send;

    /// Waits until `condition` holds, or has held since it was last watched
    fn wait_for_condition(
        &mut self,
        condition: &PageCondition,
        timeout: Duration,
    ) -> impl Future<Output = RenderResult<()>> + Send;

    /// Returns true if `selector` currently matches an element
    fn exists(&mut self, selector: &str) -> impl Future<Output = RenderResult<bool>> + Send;

    /// Reads every currently rendered row matching `row_selector`
    fn read_rows(
        &mut self,
        row_selector: &str,
    ) -> impl Future<Output = RenderResult<Vec<RawRow>>> + Send;

    /// Inspects the "next page" control
    fn next_control(
        &mut self,
        selector: &str,
    ) -> impl Future<Output = RenderResult<NextControl>> + Send;

    /// Sets an input's value and fires its `change` event
    fn set_input_value(
        &mut self,
        selector: &str,
        value: &str,
    ) -> impl Future<Output = RenderResult<()>> + Send;

    /// Clicks the first element matching `selector`
    fn click(&mut self, selector: &str) -> impl Future<Output = RenderResult<()>> + Send;

    /// Shuts the session down
    fn close(self) -> impl Future<Output = RenderResult<()>> + Send;
}

/// Factory for fresh sessions
pub trait Renderer: Send + Sync {
    type Session: RenderSession;

    /// Launches a new session with no state carried over from earlier ones
    fn launch(&self) -> impl Future<Output = RenderResult<Self::Session>> + Send;
}
