//! Site-specific HTML parsing for the events calendar
//!
//! `config` holds the fixed locators for listing and detail pages;
//! `field_parsers` turns raw element text and attributes into typed values.

pub mod config;
pub mod field_parsers;

pub use config::{DetailSelectors, ListingSelectors};
pub use field_parsers::{
    non_empty_text, normalize_categories, parse_event_timestamp, parse_map_coordinates, strip_label,
};
