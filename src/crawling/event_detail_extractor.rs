//! Field-by-field extraction of event detail pages
//!
//! Every field is looked up and parsed on its own. A field that cannot be
//! read becomes `None` on the record and a `FieldError` in the extraction's
//! issue list; it never stops the remaining fields. Only failing to load the
//! page at all is reported to the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::event::{Coordinates, EventRecord};
use crate::infrastructure::page_fetcher::{
    FetchError, HtmlSnapshot, Locator, PageElement, PageFetcher, PageSession, SessionGuard,
};
use crate::infrastructure::parsing::{
    DetailSelectors, non_empty_text, normalize_categories, parse_event_timestamp, parse_map_coordinates,
    strip_label,
};
use crate::infrastructure::parsing_error::{FieldError, FieldResult};

/// Best-effort record plus the reasons any field was left empty
#[derive(Debug, Clone, PartialEq)]
pub struct EventExtraction {
    pub record: EventRecord,
    pub issues: Vec<FieldError>,
}

impl EventExtraction {
    pub fn into_record(self) -> EventRecord {
        self.record
    }

    /// Issue recorded for `field`, if any
    pub fn issue(&self, field: &str) -> Option<&FieldError> {
        self.issues.iter().find(|issue| issue.field() == field)
    }
}

pub struct EventDetailExtractor {
    fetcher: Arc<dyn PageFetcher>,
    selectors: DetailSelectors,
    render_timeout: Duration,
}

impl EventDetailExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, render_timeout: Duration) -> Self {
        Self {
            fetcher,
            selectors: DetailSelectors::default(),
            render_timeout,
        }
    }

    pub fn with_selectors(mut self, selectors: DetailSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Load `url` and extract its fields; `date` is the listing day ("20250510")
    /// the link was found on and supplies the date part of the timestamps.
    pub async fn extract(&self, url: &str, date: &str) -> Result<EventExtraction, FetchError> {
        let mut session = SessionGuard::acquire(self.fetcher.as_ref()).await?;
        session.navigate(url).await?;
        if !session.wait_for_render(&self.selectors.ready, self.render_timeout).await? {
            debug!("Detail page {} not ready after {:?}, extracting what is there", url, self.render_timeout);
        }

        let extraction = self.extract_fields(url, date, |locator| session.find_elements(locator));
        for issue in &extraction.issues {
            if issue.is_routine() {
                debug!(url, field = issue.field(), "{}", issue);
            } else {
                warn!(url, field = issue.field(), "⚠️ {}", issue);
            }
        }
        Ok(extraction)
    }

    /// Extract from an already loaded page
    pub fn extract_snapshot(&self, snapshot: &HtmlSnapshot, date: &str) -> EventExtraction {
        self.extract_fields(snapshot.url(), date, |locator| snapshot.query(locator))
    }

    fn extract_fields<F>(&self, url: &str, date: &str, find: F) -> EventExtraction
    where
        F: Fn(&Locator) -> Result<Vec<PageElement>, FetchError>,
    {
        let page = FieldReader { find };
        let selectors = &self.selectors;
        let mut issues = Vec::new();
        let mut record = EventRecord::new(url);

        record.name = keep(page.text("name", &selectors.title), &mut issues);

        record.start_time = keep(
            page.text("start_time", &selectors.start_time)
                .and_then(|raw| parse_event_timestamp("start_time", date, &raw)),
            &mut issues,
        );
        record.end_time = keep(
            page.text("end_time", &selectors.end_time)
                .and_then(|raw| parse_event_timestamp("end_time", date, &raw)),
            &mut issues,
        );

        record.timezone = keep(page.text("timezone", &selectors.timezone), &mut issues);
        record.description = keep(page.text("description", &selectors.description), &mut issues);
        record.location = keep(
            page.labeled("location", &selectors.location, DetailSelectors::LOCATION_LABEL),
            &mut issues,
        );
        record.event_type = keep(
            page.labeled("event_type", &selectors.event_type, DetailSelectors::EVENT_TYPE_LABEL),
            &mut issues,
        );
        record.coordinates = keep(page.coordinates(&selectors.map_link), &mut issues);
        record.group = keep(page.text("group", &selectors.group), &mut issues);
        record.categories = keep(page.categories(&selectors.category_tags), &mut issues).unwrap_or_default();

        EventExtraction { record, issues }
    }
}

fn keep<T>(result: FieldResult<T>, issues: &mut Vec<FieldError>) -> Option<T> {
    result.map_err(|issue| issues.push(issue)).ok()
}

struct FieldReader<F> {
    find: F,
}

impl<F> FieldReader<F>
where
    F: Fn(&Locator) -> Result<Vec<PageElement>, FetchError>,
{
    fn all(&self, field: &'static str, locator: &Locator) -> FieldResult<Vec<PageElement>> {
        (self.find)(locator).map_err(|e| FieldError::lookup(field, e))
    }

    fn first(&self, field: &'static str, locator: &Locator) -> FieldResult<PageElement> {
        self.all(field, locator)?
            .into_iter()
            .next()
            .ok_or(FieldError::NotFound { field })
    }

    fn text(&self, field: &'static str, locator: &Locator) -> FieldResult<String> {
        non_empty_text(field, self.first(field, locator)?.text())
    }

    fn labeled(&self, field: &'static str, locator: &Locator, label: &str) -> FieldResult<String> {
        let section = self.first(field, locator)?;
        non_empty_text(field, &strip_label(section.text(), label))
    }

    fn coordinates(&self, locator: &Locator) -> FieldResult<Coordinates> {
        const FIELD: &str = "coordinates";
        let link = self.first(FIELD, locator)?;
        let href = link.attribute("href").ok_or(FieldError::NotFound { field: FIELD })?;
        parse_map_coordinates(href)
    }

    fn categories(&self, locator: &Locator) -> FieldResult<Vec<String>> {
        let tags = self.all("categories", locator)?;
        Ok(normalize_categories(tags.iter().map(PageElement::text)))
    }
}
