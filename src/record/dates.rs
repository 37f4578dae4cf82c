//! Date parsing for the formats tender portals actually publish

use chrono::{NaiveDate, NaiveDateTime};

/// Date-with-time formats, tried before the date-only ones
const DATETIME_FORMATS: &[&str] = &[
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %I:%M %p",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y %H:%M",
    "%d %b %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %b, %Y",
    "%b %d, %Y",
    "%b %d %Y",
];

/// Parses a scraped date into ISO-8601
///
/// Returns `YYYY-MM-DD` for plain dates and `YYYY-MM-DDTHH:MM:SS` when a
/// time of day is present. `None` if no known format matches.
///
/// ```
/// use tender_sweep::record::parse_date;
///
/// assert_eq!(parse_date("12-01-2025"), Some("2025-01-12".to_string()));
/// assert_eq!(parse_date("05.03.2024 15:30"), Some("2024-03-05T15:30:00".to_string()));
/// assert_eq!(parse_date("as per NIT"), None);
/// ```
pub fn parse_date(raw: &str) -> Option<String> {
    let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(&value, format) {
            return Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&value, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    None
}
