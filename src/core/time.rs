use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_date(value: Date) -> String {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| value.to_string())
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp and returns the UTC calendar day.
pub(crate) fn parse_calendar_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        return Some(date);
    }

    OffsetDateTime::parse(raw, &Rfc3339).ok().map(|value| value.to_offset(UtcOffset::UTC).date())
}

/// Half-open UTC bounds `[start, end)` of a calendar day. `None` for the last
/// representable day, whose end has no `PrimitiveDateTime`.
pub(crate) fn day_bounds(date: Date) -> Option<(PrimitiveDateTime, PrimitiveDateTime)> {
    let end = date.next_day()?;
    Some((date.midnight(), end.midnight()))
}
