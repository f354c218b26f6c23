use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::services::bluesky::PostView;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Whether the post was created more than `days` days before `now`.
///
/// A post whose creation time is missing or unreadable is never old enough.
pub fn is_older_than(post: &PostView, days: u32, now: DateTime<Utc>) -> bool {
    post.created_at()
        .and_then(|created_at| created_at.as_str())
        .and_then(parse_timestamp)
        .is_some_and(|created_at| exceeds_age(created_at, days, now))
}

pub fn exceeds_age(created_at: DateTime<Utc>, days: u32, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) > Duration::days(i64::from(days))
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn post_with(record: serde_json::Value) -> PostView {
        serde_json::from_value(json!({
            "uri": "at://did:plc:me/app.bsky.feed.post/1",
            "cid": "bafypost",
            "author": {"did": "did:plc:me", "handle": "me.test"},
            "record": record,
        }))
        .unwrap()
    }

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn zulu_timestamps_age_past_the_threshold() {
        let post = post_with(json!({"createdAt": "2020-01-01T00:00:00Z"}));

        assert!(is_older_than(&post, 3, at(2020, 1, 4, 1)));
        assert!(is_older_than(&post, 3, at(2024, 6, 1, 0)));
        assert!(!is_older_than(&post, 3, at(2020, 1, 3, 23)));
    }

    #[test]
    fn exactly_the_threshold_is_not_older() {
        let post = post_with(json!({"createdAt": "2020-01-01T00:00:00Z"}));

        assert!(!is_older_than(&post, 3, at(2020, 1, 4, 0)));
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let post = post_with(json!({"created_at": "2024-01-01T00:00:00"}));

        assert!(is_older_than(&post, 3, at(2024, 1, 4, 1)));
        assert!(!is_older_than(&post, 3, at(2024, 1, 3, 23)));
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00"),
            Some(at(2024, 1, 1, 0))
        );
    }

    #[test]
    fn offsets_are_respected() {
        assert_eq!(
            parse_timestamp("2024-01-01T05:00:00.123+05:00"),
            Some(at(2024, 1, 1, 0) + Duration::milliseconds(123))
        );
        assert_eq!(parse_timestamp("2024-01-01 07:00:00"), Some(at(2024, 1, 1, 7)));
        assert_eq!(parse_timestamp("2024-01-01"), Some(at(2024, 1, 1, 0)));
    }

    #[test]
    fn missing_or_unreadable_timestamps_never_qualify() {
        let now = at(2030, 1, 1, 0);

        assert!(!is_older_than(&post_with(json!({"text": "no date"})), 0, now));
        assert!(!is_older_than(&post_with(json!({"createdAt": "yesterday"})), 0, now));
        assert!(!is_older_than(&post_with(json!({"createdAt": 1577836800})), 0, now));
        assert!(!is_older_than(&post_with(json!("not even a record")), 0, now));
    }

    #[test]
    fn structured_values_compare_directly() {
        assert!(exceeds_age(at(2020, 1, 1, 0), 0, at(2020, 1, 1, 1)));
        assert!(!exceeds_age(at(2020, 1, 1, 0), 0, at(2020, 1, 1, 0)));
    }
}
