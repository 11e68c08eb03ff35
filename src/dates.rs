//! Date handling for provider timestamps.
//!
//! The feature services are inconsistent about dates: `Datenstand` is usually
//! a German-formatted string such as `"01.05.2021, 00:00 Uhr"`, report dates
//! (`MeldeDatum`) and `Aktualisierung` are epoch milliseconds, and mirrors
//! tend to emit RFC 3339. All of them are read as UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A date as it appears in a feature's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    /// Epoch milliseconds.
    Millis(i64),
    /// Any textual encoding.
    Text(String),
}

impl From<&str> for RawDate {
    fn from(value: &str) -> Self {
        RawDate::Text(value.to_string())
    }
}

const TEXT_DATE_TIME_FORMATS: [&str; 3] = ["%d.%m.%Y, %H:%M Uhr", "%d.%m.%Y %H:%M", "%Y-%m-%d %H:%M:%S"];
const TEXT_DATE_FORMATS: [&str; 2] = ["%d.%m.%Y", "%Y-%m-%d"];

/// Parse a provider date in any of the encodings the services use.
pub fn parse_date(raw: &RawDate) -> Result<DateTime<Utc>, FetchError> {
    match raw {
        RawDate::Millis(millis) => from_millis(*millis),
        RawDate::Text(text) => parse_text(text),
    }
}

fn parse_text(text: &str) -> Result<DateTime<Utc>, FetchError> {
    let trimmed = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in TEXT_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    for format in TEXT_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
        }
    }

    if let Ok(millis) = trimmed.parse::<i64>() {
        return from_millis(millis);
    }

    Err(FetchError::InvalidDate {
        raw: text.to_string(),
    })
}

/// Convert epoch milliseconds into a UTC timestamp.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, FetchError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| FetchError::InvalidDate {
        raw: millis.to_string(),
    })
}

/// The calendar date `days` days before now, formatted for a `TIMESTAMP` literal.
pub fn date_before(days: u32) -> String {
    date_before_at(days, Utc::now())
}

/// Like [`date_before`], relative to an explicit instant.
pub fn date_before_at(days: u32, now: DateTime<Utc>) -> String {
    (now - Duration::days(i64::from(days)))
        .format("%Y-%m-%d")
        .to_string()
}

/// Parse an HTTP `Last-Modified` header value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_german_datenstand() {
        let parsed = parse_date(&RawDate::from("01.05.2021, 00:00 Uhr")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_date(&RawDate::from("2021-05-01T00:00:00Z")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_plain_dates() {
        let expected = Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date(&RawDate::from("01.05.2021")).unwrap(), expected);
        assert_eq!(parse_date(&RawDate::from("2021-05-01")).unwrap(), expected);
    }

    #[test]
    fn test_parse_epoch_millis() {
        let expected = Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap();
        let millis = expected.timestamp_millis();

        assert_eq!(parse_date(&RawDate::Millis(millis)).unwrap(), expected);
        assert_eq!(
            parse_date(&RawDate::Text(millis.to_string())).unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_date(&RawDate::from("gestern")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidDate { raw } if raw == "gestern"));
    }

    #[test]
    fn test_raw_date_deserializes_both_shapes() {
        let text: RawDate = serde_json::from_str("\"01.05.2021, 00:00 Uhr\"").unwrap();
        let millis: RawDate = serde_json::from_str("1619827200000").unwrap();

        assert_eq!(text, RawDate::from("01.05.2021, 00:00 Uhr"));
        assert_eq!(millis, RawDate::Millis(1_619_827_200_000));
    }

    #[test]
    fn test_date_before_at() {
        let now = Utc.with_ymd_and_hms(2021, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(date_before_at(7, now), "2021-02-23");
        assert_eq!(date_before_at(0, now), "2021-03-02");
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Sat, 01 May 2021 03:15:00 GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 5, 1, 3, 15, 0).unwrap());
        assert!(parse_http_date("not a date").is_none());
    }
}
