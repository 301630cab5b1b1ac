//! In-process `PageFetcher` serving registered HTML per URL
//!
//! Used by tests, benchmarks and offline runs over saved pages. Every
//! navigation is counted per URL, and open/closed sessions are counted so
//! that callers can check sessions are released.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::page_fetcher::{FetchError, HtmlSnapshot, Locator, PageElement, PageFetcher, PageSession};

#[derive(Debug, Clone)]
enum StaticPage {
    Html(String),
    Failing,
}

#[derive(Default)]
struct Counters {
    navigations: Mutex<HashMap<String, usize>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

#[derive(Default)]
pub struct StaticPageFetcher {
    pages: HashMap<String, StaticPage>,
    counters: Arc<Counters>,
}

impl StaticPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), StaticPage::Html(html.into()));
        self
    }

    /// Navigating to `url` fails with a network error
    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.pages.insert(url.into(), StaticPage::Failing);
        self
    }

    /// Number of times any session navigated to `url`
    pub fn navigations(&self, url: &str) -> usize {
        self.counters
            .navigations
            .lock()
            .map(|counts| counts.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_navigations(&self) -> usize {
        self.counters
            .navigations
            .lock()
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, FetchError> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticPageSession {
            pages: self.pages.clone(),
            counters: Arc::clone(&self.counters),
            snapshot: None,
            closed: false,
        }))
    }
}

struct StaticPageSession {
    pages: HashMap<String, StaticPage>,
    counters: Arc<Counters>,
    snapshot: Option<HtmlSnapshot>,
    closed: bool,
}

impl StaticPageSession {
    fn snapshot(&self) -> Result<&HtmlSnapshot, FetchError> {
        if self.closed {
            return Err(FetchError::SessionClosed);
        }
        self.snapshot.as_ref().ok_or(FetchError::NoPageLoaded)
    }
}

#[async_trait]
impl PageSession for StaticPageSession {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        if self.closed {
            return Err(FetchError::SessionClosed);
        }
        if let Ok(mut counts) = self.counters.navigations.lock() {
            *counts.entry(url.to_string()).or_default() += 1;
        }

        self.snapshot = None;
        match self.pages.get(url) {
            Some(StaticPage::Html(html)) => {
                self.snapshot = Some(HtmlSnapshot::new(url, html.as_str()));
                Ok(())
            }
            Some(StaticPage::Failing) => Err(FetchError::Network {
                url: url.to_string(),
                message: "connection reset".into(),
            }),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }

    async fn wait_for_render(&mut self, ready: &Locator, _timeout: Duration) -> Result<bool, FetchError> {
        self.snapshot()?.contains(ready)
    }

    fn find_elements(&self, locator: &Locator) -> Result<Vec<PageElement>, FetchError> {
        self.snapshot()?.query(locator)
    }

    fn current_url(&self) -> Option<&str> {
        self.snapshot.as_ref().map(HtmlSnapshot::url)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        self.snapshot = None;
    }
}
