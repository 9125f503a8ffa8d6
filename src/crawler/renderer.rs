//! Rendered-page fetching
//!
//! Listing pages only carry their results after client-side JavaScript runs,
//! so the first page of every location goes through a headless browser. The
//! [`Renderer`] trait is the seam; [`ChromiumRenderer`] is the real
//! implementation and needs the `browser` feature.

use crate::config::BrowserConfig;
use crate::{Result, ScrapeError};
use async_trait::async_trait;
use std::fmt::Display;
use std::time::Duration;

/// A browser session that can render a URL once its wait conditions hold
///
/// One session serves one location's crawl. Callers must pair every
/// successful [`start`](Renderer::start) with [`close`](Renderer::close),
/// whatever happens in between.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Launches the browser session
    ///
    /// A failure here is [`crate::ScrapeError::BrowserLaunch`], which aborts the run.
    async fn start(&mut self) -> Result<()>;

    /// Navigates to `url` and returns the rendered HTML
    ///
    /// Each entry of `wait_for` is an element predicate: an XPath expression if
    /// it starts with `/`, a CSS selector otherwise. If any predicate does not
    /// hold within the per-condition timeout the page is reloaded, up to the
    /// configured number of reloads, before failing with
    /// [`crate::ScrapeError::RenderTimeout`].
    async fn render(&self, url: &str, wait_for: &[String]) -> Result<String>;

    /// Shuts the session down; calling it without a session is a no-op
    async fn close(&mut self) -> Result<()>;
}

/// Returns true if a wait condition is an XPath expression
pub fn is_xpath(condition: &str) -> bool {
    condition.starts_with('/')
}

/// The page operations the wait-and-reload loop drives
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[async_trait]
trait PageDriver: Send + Sync {
    type Error: Display + Send;

    async fn goto(&self, url: &str) -> std::result::Result<(), Self::Error>;

    /// Checks a single element predicate once
    async fn has_element(&self, condition: &str) -> bool;

    async fn reload(&self) -> std::result::Result<(), Self::Error>;

    async fn content(&self) -> std::result::Result<String, Self::Error>;
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, Copy)]
struct WaitPolicy {
    condition_timeout: Duration,
    poll_interval: Duration,
    max_reloads: u32,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl WaitPolicy {
    fn from_config(config: &BrowserConfig) -> Self {
        Self {
            condition_timeout: Duration::from_secs(config.wait_timeout_secs),
            poll_interval: Duration::from_millis(250),
            max_reloads: config.max_reloads,
        }
    }
}

/// Navigates to `url` and returns its content once every condition holds
///
/// A condition that does not hold within the timeout triggers a reload and a
/// fresh round of waiting. After `max_reloads` reloads the page is declared
/// timed out.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
async fn render_page<P: PageDriver>(
    page: &P,
    url: &str,
    wait_for: &[String],
    policy: WaitPolicy,
) -> Result<String> {
    page.goto(url).await.map_err(|e| browser_error(url, e))?;

    let mut reloads = 0u32;
    loop {
        let mut satisfied = true;
        for condition in wait_for {
            if !wait_until(page, condition, &policy).await {
                tracing::debug!(url, condition = %condition, "Wait condition not met");
                satisfied = false;
                break;
            }
        }

        if satisfied {
            return page.content().await.map_err(|e| browser_error(url, e));
        }

        if reloads >= policy.max_reloads {
            return Err(ScrapeError::RenderTimeout {
                url: url.to_string(),
                reloads,
            });
        }

        reloads += 1;
        tracing::warn!(url, reloads, "Reloading page after wait timeout");
        page.reload().await.map_err(|e| browser_error(url, e))?;
    }
}

/// Polls one predicate until it holds or the per-condition timeout passes
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
async fn wait_until<P: PageDriver>(page: &P, condition: &str, policy: &WaitPolicy) -> bool {
    let poll = async {
        loop {
            if page.has_element(condition).await {
                return;
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    };
    tokio::time::timeout(policy.condition_timeout, poll).await.is_ok()
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn browser_error(url: &str, err: impl Display) -> ScrapeError {
    ScrapeError::Browser {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;

#[cfg(feature = "browser")]
mod chromium {
    use super::{browser_error, is_xpath, render_page, PageDriver, Renderer, WaitPolicy};
    use crate::config::BrowserConfig;
    use crate::{Result, ScrapeError};
    use async_trait::async_trait;
    use chromiumoxide::error::CdpError;
    use chromiumoxide::{Browser, BrowserConfig as LaunchConfig, Page};
    use futures::StreamExt;
    use tokio::task::JoinHandle;

    struct Session {
        browser: Browser,
        page: Page,
        handler: JoinHandle<()>,
    }

    /// Headless Chromium driven over the DevTools protocol
    pub struct ChromiumRenderer {
        config: BrowserConfig,
        session: Option<Session>,
    }

    impl ChromiumRenderer {
        pub fn new(config: BrowserConfig) -> Self {
            Self {
                config,
                session: None,
            }
        }

        fn launch_config(&self) -> Result<LaunchConfig> {
            let mut builder = LaunchConfig::builder();

            if let Some(path) = &self.config.chrome_path {
                builder = builder.chrome_executable(path);
            }
            // with_head means NOT headless
            if !self.config.headless {
                builder = builder.with_head();
            }

            builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-dev-shm-usage")
                .arg("--no-first-run")
                .arg("--no-sandbox")
                .arg("--disable-gpu")
                .build()
                .map_err(ScrapeError::BrowserLaunch)
        }
    }

    #[async_trait]
    impl PageDriver for Page {
        type Error = CdpError;

        async fn goto(&self, url: &str) -> std::result::Result<(), CdpError> {
            Page::goto(self, url).await.map(|_| ())
        }

        async fn has_element(&self, condition: &str) -> bool {
            if is_xpath(condition) {
                self.find_xpath(condition).await.is_ok()
            } else {
                self.find_element(condition).await.is_ok()
            }
        }

        async fn reload(&self) -> std::result::Result<(), CdpError> {
            Page::reload(self).await.map(|_| ())
        }

        async fn content(&self) -> std::result::Result<String, CdpError> {
            Page::content(self).await
        }
    }

    #[async_trait]
    impl Renderer for ChromiumRenderer {
        async fn start(&mut self) -> Result<()> {
            if self.session.is_some() {
                return Ok(());
            }

            tracing::info!(headless = self.config.headless, "Launching browser");
            let launch = self.launch_config()?;
            let (browser, mut handler) = Browser::launch(launch)
                .await
                .map_err(|e| ScrapeError::BrowserLaunch(e.to_string()))?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    handler.abort();
                    return Err(ScrapeError::BrowserLaunch(e.to_string()));
                }
            };

            self.session = Some(Session {
                browser,
                page,
                handler,
            });
            Ok(())
        }

        async fn render(&self, url: &str, wait_for: &[String]) -> Result<String> {
            let session = self
                .session
                .as_ref()
                .ok_or_else(|| browser_error(url, "browser session not started"))?;

            render_page(
                &session.page,
                url,
                wait_for,
                WaitPolicy::from_config(&self.config),
            )
            .await
        }

        async fn close(&mut self) -> Result<()> {
            let Some(mut session) = self.session.take() else {
                return Ok(());
            };

            if let Err(e) = session.browser.close().await {
                tracing::warn!(error = %e, "Browser did not close cleanly");
            }
            if let Err(e) = session.browser.wait().await {
                tracing::warn!(error = %e, "Browser process did not exit cleanly");
            }
            session.handler.abort();
            tracing::debug!("Browser closed");
            Ok(())
        }
    }
}

/// Stand-in used when the crate is built without the `browser` feature
#[cfg(not(feature = "browser"))]
pub struct ChromiumRenderer {
    _config: BrowserConfig,
}

#[cfg(not(feature = "browser"))]
impl ChromiumRenderer {
    pub fn new(config: BrowserConfig) -> Self {
        Self { _config: config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn start(&mut self) -> Result<()> {
        Err(ScrapeError::BrowserLaunch(
            "browser support not compiled; rebuild with --features browser".to_string(),
        ))
    }

    async fn render(&self, url: &str, _wait_for: &[String]) -> Result<String> {
        Err(ScrapeError::Browser {
            url: url.to_string(),
            message: "browser support not compiled".to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Page whose conditions start holding after a number of reloads
    struct ScriptedPage {
        ready_after_reloads: Option<u32>,
        visits: AtomicU32,
        reloads: AtomicU32,
    }

    impl ScriptedPage {
        fn new(ready_after_reloads: Option<u32>) -> Self {
            Self {
                ready_after_reloads,
                visits: AtomicU32::new(0),
                reloads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedPage {
        type Error = String;

        async fn goto(&self, _url: &str) -> std::result::Result<(), String> {
            self.visits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn has_element(&self, _condition: &str) -> bool {
            self.ready_after_reloads
                .is_some_and(|n| self.reloads.load(Ordering::SeqCst) >= n)
        }

        async fn reload(&self) -> std::result::Result<(), String> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn content(&self) -> std::result::Result<String, String> {
            Ok("<html>rendered</html>".to_string())
        }
    }

    fn fast_policy(max_reloads: u32) -> WaitPolicy {
        WaitPolicy {
            condition_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(2),
            max_reloads,
        }
    }

    fn conditions() -> Vec<String> {
        vec![r#"span[data-test-target="results-count"]"#.to_string()]
    }

    #[tokio::test]
    async fn test_unmet_condition_times_out_after_reload_budget() {
        let page = ScriptedPage::new(None);

        let err = render_page(&page, "https://travel.example.com/r", &conditions(), fast_policy(3))
            .await
            .unwrap_err();

        match err {
            ScrapeError::RenderTimeout { url, reloads } => {
                assert_eq!(url, "https://travel.example.com/r");
                assert_eq!(reloads, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(page.reloads.load(Ordering::SeqCst), 3);
        assert_eq!(page.visits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_condition_met_after_one_reload() {
        let page = ScriptedPage::new(Some(1));

        let html = render_page(&page, "https://travel.example.com/r", &conditions(), fast_policy(3))
            .await
            .unwrap();

        assert_eq!(html, "<html>rendered</html>");
        assert_eq!(page.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_conditions_returns_immediately() {
        let page = ScriptedPage::new(None);

        let html = render_page(&page, "https://travel.example.com/r", &[], fast_policy(3))
            .await
            .unwrap();

        assert_eq!(html, "<html>rendered</html>");
        assert_eq!(page.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_reload_budget_fails_on_first_timeout() {
        let page = ScriptedPage::new(Some(1));

        let err = render_page(&page, "https://travel.example.com/r", &conditions(), fast_policy(0))
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::RenderTimeout { reloads: 0, .. }));
        assert_eq!(page.reloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = WaitPolicy::from_config(&BrowserConfig {
            wait_timeout_secs: 7,
            max_reloads: 2,
            ..BrowserConfig::default()
        });
        assert_eq!(policy.condition_timeout, Duration::from_secs(7));
        assert_eq!(policy.max_reloads, 2);
    }

    #[test]
    fn test_is_xpath() {
        assert!(is_xpath("//div[@data-test-target='restaurants-list']"));
        assert!(!is_xpath("span[data-test-target=\"results-count\"]"));
    }

    #[tokio::test]
    async fn test_close_without_start_is_noop() {
        let mut renderer = ChromiumRenderer::new(BrowserConfig::default());
        assert!(renderer.close().await.is_ok());
    }

    #[cfg(feature = "browser")]
    #[tokio::test]
    async fn test_render_without_session_fails() {
        let renderer = ChromiumRenderer::new(BrowserConfig::default());
        let err = renderer
            .render("https://travel.example.com/", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Browser { .. }));
    }
}
