//! The `updated` attribute: when a subscription was last synced.
//!
//! Stored as `"<weekday>, <day> <month> <year> <HH>:<MM>:<SS> UTC"`,
//! e.g. `Tue, 01 Jan 2024 00:00:00 UTC`. Only `UTC` and `GMT` are accepted
//! as the zone suffix; RFC 2822 strings with a numeric offset are tolerated
//! on read. Anything else reads as "no watermark".

use chrono::{DateTime, NaiveDateTime, Utc};

const WATERMARK_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

pub fn format_watermark(at: DateTime<Utc>) -> String {
    format!("{} UTC", at.format(WATERMARK_FORMAT))
}

pub fn parse_watermark(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Some((stamp, zone)) = raw.rsplit_once(' ') {
        if zone.eq_ignore_ascii_case("UTC") || zone.eq_ignore_ascii_case("GMT") {
            return NaiveDateTime::parse_from_str(stamp, WATERMARK_FORMAT)
                .ok()
                .map(|naive| naive.and_utc());
        }
    }

    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
