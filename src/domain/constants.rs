//! Site characteristics and domain constants
//!
//! Fixed properties of the calendar site being crawled.

/// Calendar site structure
pub mod site {
    /// Default calendar host
    pub const BASE_URL: &str = "https://events.brown.edu";

    /// Path prefix of the per-day listing page; the date is appended
    pub const DAY_LISTING_PATH: &str = "/day/date/";

    /// Calendar dates appear in URLs as 8-digit year-month-day
    pub const DATE_FORMAT: &str = "%Y%m%d";

    /// Time-of-day labels on detail pages, e.g. "10:00AM"
    pub const TIME_FORMAT: &str = "%I:%M%p";

    /// Query parameter of the map link that carries "latitude,longitude"
    pub const MAP_COORDINATES_PARAM: &str = "q";
}

/// Crawl window defaults
pub mod crawling {
    /// Number of consecutive days crawled starting today
    pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 50;

    /// Upper bound on how long a page may take to show its ready element
    pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 2000;

    /// Interval between readiness checks while waiting for a page
    pub const DEFAULT_RENDER_POLL_INTERVAL_MS: u64 = 250;
}
