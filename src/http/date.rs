//! HTTP-date parsing and formatting (RFC 7231 §7.1.1.1).
//!
//! Parsing accepts the three formats a recipient must understand, plus RFC 2822
//! as a lenient fallback. Formatting always produces IMF-fixdate.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parses an HTTP-date. Returns `None` for anything unrecognised.
///
/// # Examples
///
/// ```
/// use httpstash::http::date::{format_http_date, parse_http_date};
///
/// let date = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
/// assert_eq!(format_http_date(date), "Sun, 06 Nov 1994 08:49:37 GMT");
/// assert!(parse_http_date("next tuesday").is_none());
/// ```
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    // The three formats carry a literal "GMT" or no zone at all, so they parse
    // as naive UTC.
    [IMF_FIXDATE, RFC_850, ASCTIME]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Formats `time` as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(IMF_FIXDATE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap()
    }

    #[test]
    fn parses_all_three_formats() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"),
            Some(reference())
        );
        assert_eq!(
            parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT"),
            Some(reference())
        );
        assert_eq!(parse_http_date("Sun Nov  6 08:49:37 1994"), Some(reference()));
    }

    #[test]
    fn rfc2822_with_offset_is_normalised() {
        assert_eq!(
            parse_http_date("Sun, 06 Nov 1994 09:49:37 +0100"),
            Some(reference())
        );
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_http_date(""), None);
        assert_eq!(parse_http_date("0"), None);
        assert_eq!(parse_http_date("-1"), None);
    }
}
