//! Locators for the calendar's listing and detail pages
//!
//! Defaults match the site's markup; a config file can replace any of them.

use serde::{Deserialize, Serialize};

use crate::infrastructure::page_fetcher::Locator;

/// Locators on a per-day listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Anchor in each event title; its `href` is the detail URL
    pub event_link: Locator,

    /// Element whose presence means the listing has rendered
    pub ready: Locator,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            event_link: Locator::css(".lw_events_title a"),
            ready: Locator::css(".lw_events_title a"),
        }
    }
}

/// Locators on an event detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    pub title: Locator,
    pub start_time: Locator,
    pub end_time: Locator,
    pub timezone: Locator,
    pub description: Locator,
    pub location: Locator,
    pub event_type: Locator,
    /// Anchor whose `href` carries `q=<lat>,<lon>`
    pub map_link: Locator,
    pub group: Locator,
    pub category_tags: Locator,
    pub ready: Locator,
}

impl DetailSelectors {
    /// Text of the heading inside the location section
    pub const LOCATION_LABEL: &'static str = "Location:";
    /// Text of the heading inside the event type section
    pub const EVENT_TYPE_LABEL: &'static str = "Event Type:";
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            title: Locator::css("#lw_cal_event_detail_cols_right > h1"),
            start_time: Locator::css(".lw_start_time"),
            end_time: Locator::css(".lw_end_time"),
            timezone: Locator::css(".lw_cal_tz_abbrv"),
            description: Locator::css(".lw_calendar_event_description"),
            location: Locator::labeled_section("section", "h5", Self::LOCATION_LABEL),
            event_type: Locator::labeled_section("section", "h5", Self::EVENT_TYPE_LABEL),
            map_link: Locator::css("span.icon.i-google-map a"),
            group: Locator::css("div.lw_cal_event_group a"),
            category_tags: Locator::css("div.lw_cal_event_tags a"),
            ready: Locator::css("#lw_cal_event_detail_cols_right > h1"),
        }
    }
}
