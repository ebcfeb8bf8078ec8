//! Time related utils.

use crate::{Error, Result};
use chrono::{SecondsFormat, TimeZone, Utc};

/// DateTime is the alias for chrono::DateTime<Utc>.
pub type DateTime = chrono::DateTime<Utc>;

/// Create datetime of now.
pub fn now() -> DateTime {
    Utc::now()
}

/// Format time into http date: `Sun, 06 Nov 1994 08:49:37 GMT`
///
/// ## Note
///
/// HTTP date is slightly different from RFC2822.
///
/// - Timezone is fixed to GMT.
/// - Day must be 2 digit.
pub fn format_http_date(t: DateTime) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Format time into ISO-8601 at second precision: `2022-03-13T07:20:04Z`
///
/// This is the form used by SAS `st`/`se` and the delegation key request.
pub fn format_iso8601(t: DateTime) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse time from RFC3339 or ISO-8601: `2022-03-13T07:20:04Z`
pub fn parse_rfc3339(s: &str) -> Result<DateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| Error::protocol(format!("invalid rfc3339 time: {s}")).with_source(e))
}

/// Build time from unix epoch seconds.
pub fn from_timestamp(secs: i64) -> Result<DateTime> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::protocol(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime {
        Utc.with_ymd_and_hms(2022, 3, 1, 8, 12, 34).unwrap()
    }

    #[test]
    fn test_format_http_date() {
        assert_eq!(format_http_date(test_time()), "Tue, 01 Mar 2022 08:12:34 GMT");
    }

    #[test]
    fn test_format_iso8601() {
        assert_eq!(format_iso8601(test_time()), "2022-03-01T08:12:34Z");
    }

    #[test]
    fn test_parse_rfc3339() {
        assert_eq!(parse_rfc3339("2022-03-01T08:12:34Z").unwrap(), test_time());
        assert_eq!(
            parse_rfc3339("2022-03-01T08:12:34.0000000Z").unwrap(),
            test_time()
        );
        assert!(parse_rfc3339("yesterday").is_err());
    }

    #[test]
    fn test_from_timestamp() {
        assert_eq!(from_timestamp(1646122354).unwrap(), test_time());
    }
}
