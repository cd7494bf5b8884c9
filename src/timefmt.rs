//! Human-readable time labels

use chrono::{DateTime, Datelike, TimeZone, Utc};

/// Parses a backend timestamp (RFC 3339, as PostgREST emits `timestamptz`)
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Calendar-day label for a message: `今天`, `昨天`, `N 天前` within a
/// week, otherwise a `YYYY/M/D` date. Days are counted in `now`'s zone.
pub fn relative_day_label<Tz: TimeZone>(at: &DateTime<Utc>, now: &DateTime<Tz>) -> String {
    let zone = now.timezone();
    let then = at.with_timezone(&zone).date_naive();
    let days = (now.date_naive() - then).num_days();

    match days {
        d if d <= 0 => "今天".to_string(),
        1 => "昨天".to_string(),
        d if d < 7 => format!("{} 天前", d),
        _ => format!("{}/{}/{}", then.year(), then.month(), then.day()),
    }
}

/// Elapsed-time label for a notification
pub fn age_label(at: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let secs = (*now - *at).num_seconds().max(0);
    if secs < 60 {
        "剛剛".to_string()
    } else if secs < 3_600 {
        format!("{} 分鐘前", secs / 60)
    } else if secs < 86_400 {
        format!("{} 小時前", secs / 3_600)
    } else {
        format!("{} 天前", secs / 86_400)
    }
}
