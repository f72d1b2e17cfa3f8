//! Shared utility functions used across multiple modules.

use chrono::NaiveTime;

/// Storage and wire format for time-of-day values.
pub const TIME_OF_DAY_FORMAT: &str = "%H:%M:%S";

/// Storage and wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Parse a time of day as sent by the schedule API (`HH:MM:SS` or `HH:MM`).
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Render a time of day in the storage format.
pub fn format_time_of_day(value: NaiveTime) -> String {
    value.format(TIME_OF_DAY_FORMAT).to_string()
}

/// Render a time of day for display, `08:30 AM` style.
pub fn display_time_of_day(value: NaiveTime) -> String {
    value.format("%I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn parse_time_of_day_accepts_both_api_formats() {
        let expected = NaiveTime::from_hms_opt(8, 30, 0);
        assert_eq!(parse_time_of_day("08:30:00"), expected);
        assert_eq!(parse_time_of_day(" 08:30 "), expected);
        assert_eq!(parse_time_of_day("8.30"), None);
        assert_eq!(parse_time_of_day(""), None);
    }

    #[test]
    fn display_time_of_day_uses_twelve_hour_clock() {
        let time = NaiveTime::from_hms_opt(17, 5, 0).unwrap();
        assert_eq!(display_time_of_day(time), "05:05 PM");
        assert_eq!(format_time_of_day(time), "17:05:00");
    }
}
