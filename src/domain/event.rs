//! Event entities extracted from calendar detail pages
//!
//! `EventRecord` is the best-effort result of one detail page extraction.
//! Every attribute except the URL is optional; whether a record may be
//! stored is decided at the repository boundary, not here.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static SITE_EVENT_ID: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/event/(\d+)").ok());

/// Geographic position of an event venue.
///
/// Latitude and longitude only ever travel together, so a record can never
/// hold half a coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless both values are finite and inside the valid range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// Structured event attributes scraped from one detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Canonical URL of the detail page; the natural key of the event
    pub url: String,
    pub name: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    /// Timezone abbreviation shown next to the times (e.g. "EDT")
    pub timezone: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_type: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub group: Option<String>,
    /// Category tags in page order, without duplicates
    pub categories: Vec<String>,
}

impl EventRecord {
    /// Create an empty record for the given detail page URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            start_time: None,
            end_time: None,
            timezone: None,
            description: None,
            location: None,
            event_type: None,
            coordinates: None,
            group: None,
            categories: Vec::new(),
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }

    /// A record can be stored only once its start time is known.
    pub fn is_persistable(&self) -> bool {
        self.start_time.is_some()
    }

    /// Numeric event id embedded in the site's detail URLs (`/event/<id>-slug`)
    pub fn site_event_id(&self) -> Option<&str> {
        SITE_EVENT_ID
            .as_ref()?
            .captures(&self.url)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name.as_deref().unwrap_or("<untitled>"),
            self.url
        )
    }
}

/// Result of handing a record to an `EventRepository`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistOutcome {
    /// Event row and category associations were committed
    Inserted,
    /// A row with the same link already exists; nothing was written
    AlreadyStored,
    /// Record has no start time and was not written
    SkippedMissingStartTime,
}
