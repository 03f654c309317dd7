//! Typed coercion of raw string fields
//!
//! Every helper tries an ordered list of accepted formats and returns
//! `None` when nothing matches; coercion never errors. These are used
//! both by validation (to check parseability) and by the entity
//! processors (to produce typed bind values).

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Date formats tried in order; first match wins
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d"];

/// Datetime formats tried in order, before the date-only fallback
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// True when the field is absent or contains only whitespace
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Parse a date trying each accepted format in order
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let trimmed = non_blank(value)?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse a datetime, falling back to a bare date at midnight
pub fn parse_datetime(value: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = non_blank(value)?;
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_date(Some(trimmed)).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Parse a decimal, stripping thousands-separator commas first
pub fn parse_decimal(value: Option<&str>) -> Option<BigDecimal> {
    let trimmed = non_blank(value)?;
    BigDecimal::from_str(&trimmed.replace(',', "")).ok()
}

/// Parse an integer
pub fn parse_integer(value: Option<&str>) -> Option<i32> {
    non_blank(value)?.parse().ok()
}

/// Parse a boolean: {true,1,yes,y} / {false,0,no,n}, case-insensitive
pub fn parse_boolean(value: Option<&str>) -> Option<bool> {
    match non_blank(value)?.to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(None));
        assert!(is_blank(Some("")));
        assert!(is_blank(Some("   ")));
        assert!(!is_blank(Some("x")));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date(Some("2024-03-15")), Some(expected));
        assert_eq!(parse_date(Some("15/03/2024")), Some(expected));
        assert_eq!(parse_date(Some("03/15/2024")), Some(expected));
        assert_eq!(parse_date(Some("2024/03/15")), Some(expected));
        assert_eq!(parse_date(Some(" 2024-03-15 ")), Some(expected));
        assert_eq!(parse_date(Some("not-a-date")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_parse_date_first_format_wins() {
        // 05/06 is ambiguous; dd/MM/yyyy is tried before MM/dd/yyyy
        assert_eq!(
            parse_date(Some("05/06/2024")),
            NaiveDate::from_ymd_opt(2024, 6, 5)
        );
    }

    #[test]
    fn test_parse_datetime_formats() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            parse_datetime(Some("2024-03-15T10:30:00")),
            d.and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parse_datetime(Some("2024-03-15 10:30:00")),
            d.and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parse_datetime(Some("2024-03-15T10:30")),
            d.and_hms_opt(10, 30, 0)
        );
        // Bare date falls back to midnight
        assert_eq!(parse_datetime(Some("2024-03-15")), d.and_hms_opt(0, 0, 0));
        assert_eq!(parse_datetime(Some("garbage")), None);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            parse_decimal(Some("1,234.56")),
            BigDecimal::from_str("1234.56").ok()
        );
        assert_eq!(parse_decimal(Some("19.99")), BigDecimal::from_str("19.99").ok());
        assert_eq!(parse_decimal(Some("abc")), None);
        assert_eq!(parse_decimal(Some("")), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(Some("42")), Some(42));
        assert_eq!(parse_integer(Some(" -7 ")), Some(-7));
        assert_eq!(parse_integer(Some("4.2")), None);
        assert_eq!(parse_integer(None), None);
    }

    #[test]
    fn test_parse_boolean() {
        for truthy in ["true", "TRUE", "1", "yes", "Y"] {
            assert_eq!(parse_boolean(Some(truthy)), Some(true));
        }
        for falsy in ["false", "0", "no", "N"] {
            assert_eq!(parse_boolean(Some(falsy)), Some(false));
        }
        assert_eq!(parse_boolean(Some("maybe")), None);
        assert_eq!(parse_boolean(None), None);
    }
}
