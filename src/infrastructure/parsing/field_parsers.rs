//! Typed parsing of raw detail-page values
//!
//! Each parser returns a `FieldResult` naming the field it was asked about,
//! so the extractor can record why a field ended up empty.

use chrono::{NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use url::Url;

use crate::domain::calendar::parse_listing_date;
use crate::domain::constants::site;
use crate::domain::event::Coordinates;
use crate::infrastructure::parsing_error::{FieldError, FieldResult};

/// Trimmed text, or `FieldError::Empty` when nothing is left
pub fn non_empty_text(field: &'static str, text: &str) -> FieldResult<String> {
    let text = text.trim();
    if text.is_empty() {
        Err(FieldError::Empty { field })
    } else {
        Ok(text.to_string())
    }
}

/// Combine a listing date ("20250510") and a time of day ("10:00AM") into a timestamp.
///
/// The AM/PM marker is case-insensitive and may be separated from the
/// minutes by whitespace.
pub fn parse_event_timestamp(field: &'static str, date: &str, time: &str) -> FieldResult<NaiveDateTime> {
    let day = parse_listing_date(date).ok_or_else(|| FieldError::parse(field, date, "expected an 8-digit YYYYMMDD date"))?;

    let compact: String = time
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if compact.is_empty() {
        return Err(FieldError::Empty { field });
    }

    let time_of_day = NaiveTime::parse_from_str(&compact, site::TIME_FORMAT)
        .map_err(|e| FieldError::parse(field, time, format!("expected hh:mm AM/PM ({e})")))?;

    Ok(day.and_time(time_of_day))
}

/// Read "latitude,longitude" from the map link's `q` query parameter.
///
/// Both values are returned together or not at all.
pub fn parse_map_coordinates(href: &str) -> FieldResult<Coordinates> {
    const FIELD: &str = "coordinates";

    let url = Url::parse(href.trim()).map_err(|e| FieldError::parse(FIELD, href, e.to_string()))?;
    let query = url
        .query_pairs()
        .find(|(key, _)| key == site::MAP_COORDINATES_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| FieldError::parse(FIELD, href, "map link has no q=<lat>,<lon> parameter"))?;

    let parts: Vec<&str> = query.split(',').map(str::trim).collect();
    let [latitude, longitude] = parts.as_slice() else {
        return Err(FieldError::parse(FIELD, &query, "expected exactly two comma-separated values"));
    };

    let latitude: f64 = latitude
        .parse()
        .map_err(|_| FieldError::parse(FIELD, &query, "latitude is not a number"))?;
    let longitude: f64 = longitude
        .parse()
        .map_err(|_| FieldError::parse(FIELD, &query, "longitude is not a number"))?;

    Coordinates::new(latitude, longitude)
        .ok_or_else(|| FieldError::parse(FIELD, &query, "coordinates out of range"))
}

/// Drop the section heading (e.g. "Location:") from a labeled section's text
pub fn strip_label(text: &str, label: &str) -> String {
    text.replacen(label, "", 1).trim().to_string()
}

/// Trim names, drop empty ones and keep the first occurrence of duplicates
pub fn normalize_categories<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 10)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    #[rstest]
    #[case("10:00AM", at(10, 0))]
    #[case("10:00am", at(10, 0))]
    #[case("7:30 PM", at(19, 30))]
    #[case("12:00AM", at(0, 0))]
    #[case("12:15pm", at(12, 15))]
    fn timestamp_from_date_and_time(#[case] time: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_event_timestamp("start_time", "20250510", time), Ok(expected));
    }

    #[rstest]
    #[case("20250510", "noon")]
    #[case("20250510", "25:00PM")]
    #[case("2025-05-10", "10:00AM")]
    #[case("20251340", "10:00AM")]
    fn malformed_timestamp_is_a_parse_error(#[case] date: &str, #[case] time: &str) {
        let result = parse_event_timestamp("start_time", date, time);
        assert!(matches!(result, Err(FieldError::Parse { field: "start_time", .. })));
    }

    #[test]
    fn blank_time_is_empty() {
        assert_eq!(
            parse_event_timestamp("end_time", "20250510", "  "),
            Err(FieldError::Empty { field: "end_time" })
        );
    }

    #[test]
    fn coordinates_from_map_link() {
        let coordinates = parse_map_coordinates("https://maps.google.com/maps?q=41.8268,-71.4025").unwrap();
        assert_eq!(coordinates.latitude, 41.8268);
        assert_eq!(coordinates.longitude, -71.4025);
    }

    #[test]
    fn encoded_comma_is_accepted() {
        let coordinates = parse_map_coordinates("https://www.google.com/maps?q=41.8268%2C-71.4025&z=16").unwrap();
        assert_eq!(coordinates.latitude, 41.8268);
    }

    #[rstest]
    #[case("https://maps.google.com/maps/place/Salomon+Center")]
    #[case("https://maps.google.com/maps?q=Salomon+Center")]
    #[case("https://maps.google.com/maps?q=41.8268")]
    #[case("https://maps.google.com/maps?q=41.8268,-71.4025,3")]
    #[case("https://maps.google.com/maps?q=north,-71.4025")]
    #[case("https://maps.google.com/maps?q=141.8268,-71.4025")]
    #[case("not a link")]
    fn unusable_map_link_yields_no_coordinates(#[case] href: &str) {
        assert!(parse_map_coordinates(href).is_err());
    }

    #[rstest]
    #[case("Location:\nSalomon Center\nRoom 101", "Location:", "Salomon Center\nRoom 101")]
    #[case("Event Type: Lecture", "Event Type:", "Lecture")]
    #[case("Salomon Center", "Location:", "Salomon Center")]
    fn label_is_removed(#[case] text: &str, #[case] label: &str, #[case] expected: &str) {
        assert_eq!(strip_label(text, label), expected);
    }

    #[test]
    fn categories_are_trimmed_and_deduplicated() {
        let categories = normalize_categories([" Lecture ", "Science", "", "Lecture", "Arts"]);
        assert_eq!(categories, vec!["Lecture", "Science", "Arts"]);
    }

    #[test]
    fn whitespace_only_text_is_empty() {
        assert_eq!(non_empty_text("name", " \n "), Err(FieldError::Empty { field: "name" }));
        assert_eq!(non_empty_text("name", " Concert "), Ok("Concert".to_string()));
    }
}
