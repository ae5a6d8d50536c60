use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WhenError {
    #[error("unrecognized time: {0:?} (try \"+1h30m\", \"17:00\", \"2025-06-01 09:30\")")]
    Unrecognized(String),
    #[error("time does not exist in the local timezone: {0}")]
    NonexistentLocal(String),
    #[error("offset out of range: {0}")]
    OutOfRange(String),
}

static RELATIVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("valid regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a user-entered instant.
///
/// Accepted shapes: `now`, RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (space or `T`
/// separator, local time), `YYYY-MM-DD` (local midnight), `HH:MM` (today,
/// local), and relative offsets such as `+90m` or `+1d2h30m15s`.
pub fn parse_when(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, WhenError> {
    let s = input.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Some(caps) = RELATIVE_RE.captures(s) {
        if caps.iter().skip(1).all(|g| g.is_none()) {
            return Err(WhenError::Unrecognized(input.to_string()));
        }
        let unit = |i: usize| -> Result<i64, WhenError> {
            match caps.get(i) {
                Some(m) => m
                    .as_str()
                    .parse::<i64>()
                    .map_err(|_| WhenError::OutOfRange(input.to_string())),
                None => Ok(0),
            }
        };
        let offset = [(1, 86_400), (2, 3_600), (3, 60), (4, 1)]
            .into_iter()
            .try_fold(0i64, |acc, (i, scale)| {
                unit(i)?
                    .checked_mul(scale)
                    .and_then(|v| acc.checked_add(v))
                    .ok_or_else(|| WhenError::OutOfRange(input.to_string()))
            })?;
        return Duration::try_seconds(offset)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| WhenError::OutOfRange(input.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return local_to_utc(naive, input);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_to_utc(date.and_time(NaiveTime::MIN), input);
    }

    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        let today = now.with_timezone(&Local).date_naive();
        return local_to_utc(today.and_time(time), input);
    }

    Err(WhenError::Unrecognized(input.to_string()))
}

/// Resolve a wall-clock time in the host timezone. Ambiguous times (DST
/// fall-back) take the earlier instant.
fn local_to_utc(naive: NaiveDateTime, input: &str) -> Result<DateTime<Utc>, WhenError> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(WhenError::NonexistentLocal(input.to_string())),
    }
}

/// Render an instant as local `YYYY-MM-DD HH:MM`, the shape `parse_when`
/// reads back.
pub fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_now() {
        assert_eq!(parse_when("now", now()), Ok(now()));
        assert_eq!(parse_when("  NOW ", now()), Ok(now()));
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(
            parse_when("+90m", now()),
            Ok(now() + Duration::minutes(90))
        );
        assert_eq!(
            parse_when("+1d2h30m15s", now()),
            Ok(now() + Duration::seconds(86_400 + 7_200 + 1_800 + 15))
        );
        assert_eq!(parse_when("+45s", now()), Ok(now() + Duration::seconds(45)));
    }

    #[test]
    fn test_relative_requires_a_unit() {
        assert!(matches!(
            parse_when("+", now()),
            Err(WhenError::Unrecognized(_))
        ));
        // Units out of order are not accepted
        assert!(matches!(
            parse_when("+5m1h", now()),
            Err(WhenError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_relative_overflow() {
        assert!(matches!(
            parse_when("+99999999999999999999d", now()),
            Err(WhenError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            parse_when("2025-06-01T09:30:00Z", now()),
            Ok(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(
            parse_when("2025-06-01T09:30:00+02:00", now()),
            Ok(Utc.with_ymd_and_hms(2025, 6, 1, 7, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_local_datetime_shapes() {
        let expected = local(2025, 6, 1, 9, 30, 0);
        assert_eq!(parse_when("2025-06-01 09:30", now()), Ok(expected));
        assert_eq!(parse_when("2025-06-01T09:30", now()), Ok(expected));
        assert_eq!(
            parse_when("2025-06-01 09:30:15", now()),
            Ok(local(2025, 6, 1, 9, 30, 15))
        );
    }

    #[test]
    fn test_date_only_is_local_midnight() {
        assert_eq!(
            parse_when("2025-06-01", now()),
            Ok(local(2025, 6, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_time_only_is_today() {
        let today = now().with_timezone(&Local).date_naive();
        let expected = Local
            .from_local_datetime(&today.and_hms_opt(17, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_when("17:00", now()), Ok(expected));
    }

    #[test]
    fn test_garbage_is_rejected() {
        for bad in ["", "tomorrow", "2025-13-01", "25:00", "1h"] {
            assert!(
                matches!(parse_when(bad, now()), Err(WhenError::Unrecognized(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_format_local_reads_back() {
        let instant = local(2025, 6, 1, 9, 30, 0);
        let text = format_local(instant);
        assert_eq!(text.len(), 16);
        assert_eq!(parse_when(&text, now()), Ok(instant));
    }
}
