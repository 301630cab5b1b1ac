//! Page fetching capability consumed by link discovery and event extraction
//!
//! A `PageFetcher` hands out `PageSession`s. A session navigates to one page
//! at a time, waits until the page shows a ready element, and answers element
//! queries against the rendered document. Sessions are acquired through
//! `SessionGuard`, which closes the session on every exit path.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use thiserror::Error;

/// Failure to load or query a page as a whole
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP request failed with status {status}: {url}")]
    Status { status: u16, url: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No page has been loaded in this session")]
    NoPageLoaded,

    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Page session is closed")]
    SessionClosed,

    #[error("Page unavailable: {0}")]
    Unavailable(String),
}

/// Site-specific element locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// Plain CSS selector
    Css { selector: String },
    /// Container element with a direct heading child whose text equals `label`
    /// (e.g. `<section><h5>Location:</h5>...</section>`)
    LabeledSection {
        container: String,
        heading: String,
        label: String,
    },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Self::Css {
            selector: selector.to_string(),
        }
    }

    pub fn labeled_section(container: &str, heading: &str, label: &str) -> Self {
        Self::LabeledSection {
            container: container.to_string(),
            heading: heading.to_string(),
            label: label.to_string(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { selector } => write!(f, "{selector}"),
            Self::LabeledSection {
                container,
                heading,
                label,
            } => write!(f, "{container}[{heading}='{label}']"),
        }
    }
}

/// Snapshot of one matched element: its rendered text and attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    text: String,
    attributes: HashMap<String, String>,
}

impl PageElement {
    pub fn new(text: impl Into<String>, attributes: HashMap<String, String>) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    /// Visible text with whitespace collapsed; block elements become line breaks
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn from_element(element: ElementRef<'_>) -> Self {
        let attributes = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self::new(rendered_text(element), attributes)
    }
}

#[async_trait]
pub trait PageSession: Send {
    /// Load `url`, replacing whatever page the session showed before.
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;

    /// Poll until `ready` matches or `timeout` elapses.
    ///
    /// Returns `Ok(false)` on timeout; the page stays loaded and can still be
    /// queried.
    async fn wait_for_render(&mut self, ready: &Locator, timeout: Duration) -> Result<bool, FetchError>;

    fn find_elements(&self, locator: &Locator) -> Result<Vec<PageElement>, FetchError>;

    fn find_element(&self, locator: &Locator) -> Result<Option<PageElement>, FetchError> {
        Ok(self.find_elements(locator)?.into_iter().next())
    }

    fn current_url(&self) -> Option<&str>;

    /// Release the session. Further calls fail with `SessionClosed`.
    fn close(&mut self);
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, FetchError>;
}

/// Scoped page session; closes the underlying session when dropped
pub struct SessionGuard {
    session: Box<dyn PageSession>,
}

impl SessionGuard {
    pub async fn acquire(fetcher: &dyn PageFetcher) -> Result<Self, FetchError> {
        let session = fetcher.open_session().await?;
        Ok(Self { session })
    }
}

impl Deref for SessionGuard {
    type Target = dyn PageSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Loaded page: source URL plus the HTML it rendered to
///
/// The HTML is re-parsed per query so no parsed document is held across
/// await points.
#[derive(Debug, Clone)]
pub struct HtmlSnapshot {
    url: String,
    html: String,
}

impl HtmlSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query(&self, locator: &Locator) -> Result<Vec<PageElement>, FetchError> {
        let document = Html::parse_document(&self.html);
        match locator {
            Locator::Css { selector } => {
                let selector = compile_selector(selector)?;
                Ok(document.select(&selector).map(PageElement::from_element).collect())
            }
            Locator::LabeledSection {
                container,
                heading,
                label,
            } => {
                let container = compile_selector(container)?;
                Ok(document
                    .select(&container)
                    .filter(|element| has_heading(*element, heading, label))
                    .map(PageElement::from_element)
                    .collect())
            }
        }
    }

    pub fn contains(&self, locator: &Locator) -> Result<bool, FetchError> {
        Ok(!self.query(locator)?.is_empty())
    }
}

fn compile_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector).map_err(|e| FetchError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn has_heading(container: ElementRef<'_>, heading: &str, label: &str) -> bool {
    container
        .children()
        .filter_map(ElementRef::wrap)
        .any(|child| child.value().name().eq_ignore_ascii_case(heading) && rendered_text(child) == label)
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "tr", "ul",
];

fn rendered_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if matches!(name, "script" | "style" | "noscript") {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if block {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            // source line breaks are not rendered
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h1 class="title">  Spring   Concert </h1>
          <section><h5>Location:</h5><p>Salomon Center</p><p>Room 101</p></section>
          <section><h5>Event Type:</h5>Performance</section>
          <div class="tags"><a href="/tag/music">Music</a><a href="/tag/arts">Arts</a></div>
          <script>var ignored = true;</script>
        </body></html>
    "#;

    fn snapshot() -> HtmlSnapshot {
        HtmlSnapshot::new("https://events.example.edu/event/1", PAGE)
    }

    #[test]
    fn css_query_returns_normalized_text_and_attributes() {
        let tags = snapshot().query(&Locator::css("div.tags a")).unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].text(), "Music");
        assert_eq!(tags[1].attribute("href"), Some("/tag/arts"));

        let title = snapshot().query(&Locator::css("h1.title")).unwrap();
        assert_eq!(title[0].text(), "Spring Concert");
    }

    #[test]
    fn labeled_section_matches_on_heading_text() {
        let location = snapshot()
            .query(&Locator::labeled_section("section", "h5", "Location:"))
            .unwrap();
        assert_eq!(location.len(), 1);
        assert_eq!(location[0].text(), "Location:\nSalomon Center\nRoom 101");

        let missing = snapshot()
            .query(&Locator::labeled_section("section", "h5", "Cost:"))
            .unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn invalid_selector_is_reported() {
        let result = snapshot().query(&Locator::css("div[[["));
        assert!(matches!(result, Err(FetchError::InvalidSelector { .. })));
    }

    #[test]
    fn script_content_is_not_rendered() {
        let body = snapshot().query(&Locator::css("body")).unwrap();
        assert!(!body[0].text().contains("ignored"));
    }
}
