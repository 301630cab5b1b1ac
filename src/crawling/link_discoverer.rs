//! Per-day discovery of event detail links

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::domain::calendar::format_listing_date;
use crate::domain::constants::site;
use crate::infrastructure::page_fetcher::{FetchError, PageFetcher, PageSession, SessionGuard};
use crate::infrastructure::parsing::ListingSelectors;

pub struct LinkDiscoverer {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    selectors: ListingSelectors,
    render_timeout: Duration,
}

impl LinkDiscoverer {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: &str, render_timeout: Duration) -> Result<Self, FetchError> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            fetcher,
            base_url,
            selectors: ListingSelectors::default(),
            render_timeout,
        })
    }

    pub fn with_selectors(mut self, selectors: ListingSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Listing page URL for `date`, e.g. `https://events.brown.edu/day/date/20250510`
    pub fn listing_url(&self, date: NaiveDate) -> Result<Url, FetchError> {
        let path = format!("{}{}", site::DAY_LISTING_PATH, format_listing_date(date));
        self.base_url.join(&path).map_err(|e| FetchError::InvalidUrl {
            url: path,
            reason: e.to_string(),
        })
    }

    /// Detail URLs listed for `date`, in document order.
    ///
    /// Duplicates are kept; an empty listing is not an error.
    pub async fn discover(&self, date: NaiveDate) -> Result<Vec<String>, FetchError> {
        let listing_url = self.listing_url(date)?;

        let mut session = SessionGuard::acquire(self.fetcher.as_ref()).await?;
        session.navigate(listing_url.as_str()).await?;
        if !session.wait_for_render(&self.selectors.ready, self.render_timeout).await? {
            debug!("Listing {} shows no event links after {:?}", listing_url, self.render_timeout);
        }

        let anchors = session.find_elements(&self.selectors.event_link)?;
        let page_url = session
            .current_url()
            .and_then(|url| Url::parse(url).ok())
            .unwrap_or(listing_url);

        let mut links = Vec::with_capacity(anchors.len());
        for anchor in anchors {
            let Some(href) = anchor.attribute("href").map(str::trim).filter(|h| !h.is_empty()) else {
                debug!("Skipping event title without href: {}", anchor.text());
                continue;
            };
            match page_url.join(href) {
                Ok(url) => links.push(url.to_string()),
                Err(e) => warn!("Skipping unresolvable event link '{}' on {}: {}", href, page_url, e),
            }
        }
        Ok(links)
    }
}
