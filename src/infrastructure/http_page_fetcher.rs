//! `PageFetcher` backed by the shared HTTP client
//!
//! In `Direct` mode the server response is the page. In `Browserless` mode a
//! Browserless `/content` endpoint renders the page in a headless browser and
//! returns the resulting HTML; waiting for render re-renders until the ready
//! element shows up or the timeout elapses.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;
use url::Url;

use super::config::{FetcherConfig, RenderModeKind};
use super::http_client::{HttpClient, HttpClientConfig};
use super::page_fetcher::{FetchError, HtmlSnapshot, Locator, PageElement, PageFetcher, PageSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    Direct,
    Browserless { endpoint: Url },
}

impl RenderMode {
    /// `base_url` is the Browserless service root; `token` is appended as a query parameter
    pub fn browserless(base_url: &str, token: Option<&str>) -> Result<Self, FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let mut endpoint = Url::parse(base_url)
            .and_then(|base| base.join("content"))
            .map_err(|e| invalid(e.to_string()))?;
        if let Some(token) = token {
            endpoint.query_pairs_mut().append_pair("token", token);
        }
        Ok(Self::Browserless { endpoint })
    }
}

pub struct HttpPageFetcher {
    client: Arc<HttpClient>,
    mode: RenderMode,
    poll_interval: Duration,
}

impl HttpPageFetcher {
    pub fn new(client: Arc<HttpClient>, mode: RenderMode, poll_interval: Duration) -> Self {
        Self {
            client,
            mode,
            poll_interval,
        }
    }

    pub fn from_config(config: &FetcherConfig, poll_interval: Duration) -> Result<Self, FetchError> {
        let client = HttpClient::new(HttpClientConfig::from_fetcher_config(config))?;
        let mode = match config.render_mode {
            RenderModeKind::Direct => RenderMode::Direct,
            RenderModeKind::Browserless => {
                let base_url = config
                    .browserless_url
                    .as_deref()
                    .ok_or_else(|| FetchError::Unavailable("browserless_url is not configured".into()))?;
                RenderMode::browserless(base_url, config.browserless_token.as_deref())?
            }
        };
        Ok(Self::new(Arc::new(client), mode, poll_interval))
    }

    pub fn mode(&self) -> &RenderMode {
        &self.mode
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, FetchError> {
        Ok(Box::new(HttpPageSession {
            client: Arc::clone(&self.client),
            mode: self.mode.clone(),
            poll_interval: self.poll_interval,
            snapshot: None,
            closed: false,
        }))
    }
}

pub struct HttpPageSession {
    client: Arc<HttpClient>,
    mode: RenderMode,
    poll_interval: Duration,
    snapshot: Option<HtmlSnapshot>,
    closed: bool,
}

impl HttpPageSession {
    async fn render(&self, url: &str, ready: Option<&Locator>) -> Result<String, FetchError> {
        match &self.mode {
            RenderMode::Direct => self.client.get_text(url).await,
            RenderMode::Browserless { endpoint } => {
                let mut body = json!({ "url": url });
                if let Some(selector) = ready.and_then(ready_selector) {
                    body["waitForSelector"] = json!({ "selector": selector });
                }
                self.client.post_json_text(endpoint.as_str(), &body, url).await
            }
        }
    }

    fn snapshot(&self) -> Result<&HtmlSnapshot, FetchError> {
        if self.closed {
            return Err(FetchError::SessionClosed);
        }
        self.snapshot.as_ref().ok_or(FetchError::NoPageLoaded)
    }
}

/// CSS selector a headless browser can wait on for this locator
fn ready_selector(locator: &Locator) -> Option<&str> {
    match locator {
        Locator::Css { selector } => Some(selector),
        Locator::LabeledSection { container, .. } => Some(container),
    }
}

#[async_trait]
impl PageSession for HttpPageSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        if self.closed {
            return Err(FetchError::SessionClosed);
        }
        Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        self.snapshot = None;
        let html = self.render(url, None).await?;
        self.snapshot = Some(HtmlSnapshot::new(url, html));
        Ok(())
    }

    async fn wait_for_render(&mut self, ready: &Locator, timeout: Duration) -> Result<bool, FetchError> {
        if self.snapshot()?.contains(ready)? {
            return Ok(true);
        }
        if matches!(self.mode, RenderMode::Direct) {
            return Ok(false);
        }

        let url = self.snapshot()?.url().to_string();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            sleep(self.poll_interval.min(deadline.saturating_duration_since(Instant::now()))).await;
            let html = self.render(&url, Some(ready)).await?;
            let snapshot = HtmlSnapshot::new(url.as_str(), html);
            let ready_now = snapshot.contains(ready)?;
            self.snapshot = Some(snapshot);
            if ready_now {
                return Ok(true);
            }
        }

        debug!("{} not rendered on {} within {:?}", ready, url, timeout);
        Ok(false)
    }

    fn find_elements(&self, locator: &Locator) -> Result<Vec<PageElement>, FetchError> {
        self.snapshot()?.query(locator)
    }

    fn current_url(&self) -> Option<&str> {
        self.snapshot.as_ref().map(HtmlSnapshot::url)
    }

    fn close(&mut self) {
        self.closed = true;
        self.snapshot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(mode: RenderMode) -> HttpPageFetcher {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        HttpPageFetcher::new(Arc::new(client), mode, Duration::from_millis(10))
    }

    #[test]
    fn browserless_endpoint_carries_token() {
        let mode = RenderMode::browserless("http://localhost:3000/", Some("secret")).unwrap();
        let RenderMode::Browserless { endpoint } = mode else {
            panic!("expected browserless mode");
        };
        assert_eq!(endpoint.as_str(), "http://localhost:3000/content?token=secret");
    }

    #[test]
    fn browserless_requires_a_valid_base_url() {
        assert!(matches!(
            RenderMode::browserless("not a url", None),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn fresh_session_has_no_page() {
        let session = fetcher(RenderMode::Direct).open_session().await.unwrap();
        assert!(session.current_url().is_none());
        assert!(matches!(
            session.find_elements(&Locator::css("a")),
            Err(FetchError::NoPageLoaded)
        ));
    }

    #[tokio::test]
    async fn closed_session_refuses_work() {
        let mut session = fetcher(RenderMode::Direct).open_session().await.unwrap();
        session.close();
        assert!(matches!(
            session.navigate("https://events.brown.edu").await,
            Err(FetchError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_any_request() {
        let mut session = fetcher(RenderMode::Direct).open_session().await.unwrap();
        assert!(matches!(
            session.navigate("/relative/path").await,
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn from_config_builds_requested_mode() {
        let mut config = FetcherConfig::default();
        let direct = HttpPageFetcher::from_config(&config, Duration::from_millis(10)).unwrap();
        assert_eq!(direct.mode(), &RenderMode::Direct);

        config.render_mode = RenderModeKind::Browserless;
        assert!(HttpPageFetcher::from_config(&config, Duration::from_millis(10)).is_err());
        config.browserless_url = Some("http://localhost:3000".into());
        let rendered = HttpPageFetcher::from_config(&config, Duration::from_millis(10)).unwrap();
        assert!(matches!(rendered.mode(), RenderMode::Browserless { .. }));
    }
}
