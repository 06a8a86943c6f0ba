use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

pub fn now_iso() -> String {
    to_iso(&Utc::now())
}

/// ISO 8601 with millisecond precision and a `Z` suffix.
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Date string parse without the epoch fallback of [`parse_ts`].
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    None
}

/// Leading integer of a string, like a lenient integer parse.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Epoch values that land in 1970 are taken to be seconds.
fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    let parsed = from_millis(n)?;
    if parsed.year() == 1970 {
        return n.checked_mul(1000).and_then(from_millis);
    }
    Some(parsed)
}

/// Parses a timestamp given as an ISO string, a date string or an epoch number.
///
/// Falsy values (`null`, `""`, `0`, `false`) parse to `None`. Strings that are not
/// dates fall back to their leading integer. Epoch values are millis unless the
/// result falls in 1970, in which case they are re-read as seconds.
pub fn parse_ts(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) if !s.is_empty() => {
            parse_date(s).or_else(|| leading_int(s).and_then(from_epoch))
        }
        Value::Number(n) => {
            let n = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if n == 0 {
                return None;
            }
            from_epoch(n)
        }
        _ => None,
    }
}

pub fn parse_ts_or_now(value: Option<&Value>) -> DateTime<Utc> {
    value.and_then(parse_ts).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_iso_strings() {
        let ts = parse_ts(&json!("2021-03-01T10:00:00.000Z")).unwrap();
        assert_eq!(to_iso(&ts), "2021-03-01T10:00:00.000Z");
        let ts = parse_ts(&json!("2021-03-01T12:00:00+02:00")).unwrap();
        assert_eq!(to_iso(&ts), "2021-03-01T10:00:00.000Z");
    }

    #[test]
    fn epoch_seconds_become_millis() {
        let millis = parse_ts(&json!(1614592800000_i64)).unwrap();
        let seconds = parse_ts(&json!(1614592800)).unwrap();
        assert_eq!(millis, seconds);
        assert_eq!(to_iso(&seconds), "2021-03-01T10:00:00.000Z");
    }

    #[test]
    fn numeric_strings_fall_back_to_integer() {
        let ts = parse_ts(&json!("1614592800")).unwrap();
        assert_eq!(to_iso(&ts), "2021-03-01T10:00:00.000Z");
    }

    #[test]
    fn falsy_values_are_none() {
        assert!(parse_ts(&json!(null)).is_none());
        assert!(parse_ts(&json!("")).is_none());
        assert!(parse_ts(&json!(0)).is_none());
        assert!(parse_ts(&json!("not a date")).is_none());
    }
}
