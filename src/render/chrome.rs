//! Headless Chromium implementation of the rendering capability
//!
//! Each session owns its own browser process and event handler task. The
//! handler is aborted when the session is closed or dropped so no task
//! outlives the browser.

use crate::config::BrowserConfig;
use crate::record::RawRow;
use crate::render::table::parse_rows;
use crate::render::{NextControl, PageCondition, RenderSession, Renderer};
use crate::{RenderError, RenderResult};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// How often DOM conditions are re-checked while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Page-global object where watched conditions are latched
const LATCH: &str = "window.__harvestLatch";

/// Launches headless Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    config: BrowserConfig,
}

impl ChromeRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> RenderResult<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .request_timeout(Duration::from_secs(60))
            .window_size(1920, 1080)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(RenderError::Launch)
    }
}

impl Renderer for ChromeRenderer {
    type Session = ChromeSession;

    async fn launch(&self) -> RenderResult<ChromeSession> {
        info!("Launching browser");

        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser event handler task completed");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(RenderError::Launch(format!("failed to open page: {}", e)));
            }
        };

        Ok(ChromeSession {
            browser,
            handler,
            page,
        })
    }
}

/// A live Chromium browser with one page open on the listing
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
}

impl ChromeSession {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> RenderResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| RenderError::Script(e.to_string()))
    }

    async fn poll_until<F>(&self, what: String, timeout: Duration, script: F) -> RenderResult<()>
    where
        F: Fn() -> String,
    {
        let start = Instant::now();
        loop {
            if self.eval::<bool>(script()).await? {
                trace!("{} after {:?}", what, start.elapsed());
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(RenderError::Timeout {
                    what,
                    after: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Encodes a selector as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// JavaScript expression that is true while `condition` holds
fn condition_expr(condition: &PageCondition) -> String {
    match condition {
        PageCondition::OverlayVisible(selector) => format!(
            "(() => {{ const el = document.querySelector({}); \
             return !!el && el.style.display !== 'none'; }})()",
            js_string(selector)
        ),
        PageCondition::OverlayHidden(selector) => format!(
            "(() => {{ const el = document.querySelector({}); \
             return !el || el.style.display === 'none'; }})()",
            js_string(selector)
        ),
    }
}

/// Installs a MutationObserver that latches `condition` the moment it holds
///
/// The observer runs inside the page, so a state that lasts less than one
/// poll interval is still recorded.
fn watch_script(condition: &PageCondition) -> String {
    format!(
        "(() => {{ const key = {key}; const check = () => {expr}; \
         const latch = ({latch} = {latch} || {{}}); \
         if (latch[key] && latch[key].observer) latch[key].observer.disconnect(); \
         const entry = {{ held: false, observer: null }}; latch[key] = entry; \
         if (check()) {{ entry.held = true; return true; }} \
         entry.observer = new MutationObserver(() => {{ \
           if (check()) {{ entry.held = true; entry.observer.disconnect(); }} }}); \
         entry.observer.observe(document.documentElement, \
           {{ attributes: true, childList: true, subtree: true }}); \
         return true; }})()",
        key = js_string(&condition.to_string()),
        expr = condition_expr(condition),
        latch = LATCH,
    )
}

/// True if `condition` holds now or was latched since it was last watched
fn condition_script(condition: &PageCondition) -> String {
    format!(
        "(() => {{ const entry = {latch} && {latch}[{key}]; \
         return (!!entry && entry.held) || {expr}; }})()",
        key = js_string(&condition.to_string()),
        expr = condition_expr(condition),
        latch = LATCH,
    )
}

impl RenderSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> RenderResult<()> {
        info!("Opening {}", url);
        let navigation_error = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        self.page.goto(url).await.map_err(navigation_error)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(navigation_error)?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> RenderResult<()> {
        let script = format!("!!document.querySelector({})", js_string(selector));
        self.poll_until(selector.to_string(), timeout, || script.clone())
            .await
    }

    async fn watch(&mut self, condition: &PageCondition) -> RenderResult<()> {
        trace!("Watching for {}", condition);
        self.eval::<bool>(watch_script(condition)).await?;
        Ok(())
    }

    async fn wait_for_condition(
        &mut self,
        condition: &PageCondition,
        timeout: Duration,
    ) -> RenderResult<()> {
        let script = condition_script(condition);
        self.poll_until(condition.to_string(), timeout, || script.clone())
            .await
    }

    async fn exists(&mut self, selector: &str) -> RenderResult<bool> {
        self.eval(format!("!!document.querySelector({})", js_string(selector)))
            .await
    }

    async fn read_rows(&mut self, row_selector: &str) -> RenderResult<Vec<RawRow>> {
        let html = self
            .page
            .content()
            .await
            .map_err(|e| RenderError::Script(format!("failed to read page content: {}", e)))?;
        parse_rows(&html, row_selector)
    }

    async fn next_control(&mut self, selector: &str) -> RenderResult<NextControl> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return 'absent'; \
             const off = el.disabled || el.classList.contains('disabled') \
               || el.getAttribute('aria-disabled') === 'true'; \
             return off ? 'disabled' : 'enabled'; }})()",
            js_string(selector)
        );

        match self.eval::<String>(script).await?.as_str() {
            "absent" => Ok(NextControl::Absent),
            "disabled" => Ok(NextControl::Disabled),
            "enabled" => Ok(NextControl::Enabled),
            other => Err(RenderError::Script(format!(
                "unexpected next-control state '{}'",
                other
            ))),
        }
    }

    async fn set_input_value(&mut self, selector: &str, value: &str) -> RenderResult<()> {
        let script = format!(
            "(() => {{ const input = document.querySelector({}); \
             if (!input) return false; \
             input.value = {}; \
             input.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            js_string(selector),
            js_string(value)
        );

        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(RenderError::ElementNotFound(selector.to_string()))
        }
    }

    async fn click(&mut self, selector: &str) -> RenderResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| RenderError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| RenderError::Script(format!("click on {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn close(mut self) -> RenderResult<()> {
        debug!("Closing browser");
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| RenderError::Script(format!("failed to close browser: {}", e)))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
