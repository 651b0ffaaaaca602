//! iCalendar normalization
//!
//! Turns the VEVENTs of a `calendar-data` payload into [`Interval`]s. Date-only
//! starts become all-day intervals anchored in the owner's offset. The end
//! comes from DTEND when present, otherwise DTSTART + DURATION, otherwise a
//! single day (date-only) or an instant (timed).

use std::io::BufReader;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use ical::IcalParser;
use schej_core::EventDraft;
use schej_domain::{FetchError, Interval, SourceId, UtcOffset};
use tracing::debug;

use super::report::caldav_timestamp;

/// A parsed DTSTART/DTEND value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IcsTime {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

/// Normalize every VEVENT in `data`.
///
/// With `timed_only`, events whose DTSTART is date-only are skipped.
pub fn parse_calendar_data(
    data: &str,
    source: &SourceId,
    offset: UtcOffset,
    timed_only: bool,
) -> Result<Vec<Interval>, FetchError> {
    let parser = IcalParser::new(BufReader::new(data.as_bytes()));
    let mut intervals = Vec::new();

    for calendar in parser {
        let calendar =
            calendar.map_err(|e| FetchError::Malformed(format!("invalid iCalendar data: {e}")))?;

        for event in calendar.events {
            match normalize_event(&event, source, offset)? {
                Some(interval) if timed_only && interval.all_day => {
                    debug!(source = %source, "skipping date-only event");
                }
                Some(interval) => intervals.push(interval),
                None => {}
            }
        }
    }

    Ok(intervals)
}

fn normalize_event(
    event: &IcalEvent,
    source: &SourceId,
    offset: UtcOffset,
) -> Result<Option<Interval>, FetchError> {
    let property = |name: &str| event.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name));

    let uid = property("UID").and_then(|p| p.value.clone());
    let label = uid.as_deref().unwrap_or("<no uid>");

    let Some(dtstart) = property("DTSTART") else {
        return Ok(None);
    };
    let start = parse_time(dtstart, offset)
        .map_err(|e| FetchError::Malformed(format!("event {label}: DTSTART {e}")))?;

    let end = match (property("DTEND"), property("DURATION")) {
        (Some(dtend), _) => Some(
            parse_time(dtend, offset)
                .map_err(|e| FetchError::Malformed(format!("event {label}: DTEND {e}")))?,
        ),
        (None, Some(duration)) => {
            let raw = duration.value.as_deref().unwrap_or_default();
            let duration = parse_duration(raw).ok_or_else(|| {
                FetchError::Malformed(format!("event {label}: invalid DURATION {raw:?}"))
            })?;
            let end = shift(start, duration, offset).ok_or_else(|| {
                FetchError::Malformed(format!("event {label}: DURATION {raw:?} out of range"))
            })?;
            Some(end)
        }
        (None, None) => None,
    };

    let interval = match (start, end) {
        (IcsTime::Date(first), Some(IcsTime::Date(last))) => {
            Interval::all_day(source.clone(), first, last, offset)
        }
        (IcsTime::Date(first), None) => Interval::all_day(source.clone(), first, first, offset),
        (IcsTime::Date(first), Some(IcsTime::Instant(end))) => {
            Interval::timed(source.clone(), offset.midnight(first), end)
                .map(|i| Interval { all_day: true, ..i })
        }
        (IcsTime::Instant(start), Some(end)) => {
            Interval::timed(source.clone(), start, instant(end, offset))
        }
        (IcsTime::Instant(start), None) => Interval::timed(source.clone(), start, start),
    }
    .map_err(|e| FetchError::Malformed(format!("event {label}: {e}")))?;

    let title = property("SUMMARY").and_then(|p| p.value.clone()).map(|t| unescape_text(&t));
    Ok(Some(interval.with_title(title).with_provider_event_id(uid)))
}

fn instant(time: IcsTime, offset: UtcOffset) -> DateTime<Utc> {
    match time {
        IcsTime::Date(date) => offset.midnight(date),
        IcsTime::Instant(instant) => instant,
    }
}

/// `None` when the result leaves chrono's representable range.
fn shift(time: IcsTime, duration: TimeDelta, offset: UtcOffset) -> Option<IcsTime> {
    match time {
        IcsTime::Date(date) if duration.num_seconds() % 86_400 == 0 => {
            let shifted = date.checked_add_signed(TimeDelta::try_days(duration.num_days())?)?;
            checked_midnight(shifted, offset)?;
            Some(IcsTime::Date(shifted))
        }
        IcsTime::Date(date) => checked_midnight(date, offset)?
            .checked_add_signed(duration)
            .map(IcsTime::Instant),
        IcsTime::Instant(instant) => instant.checked_add_signed(duration).map(IcsTime::Instant),
    }
}

fn checked_midnight(date: NaiveDate, offset: UtcOffset) -> Option<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .checked_sub_signed(TimeDelta::try_minutes(i64::from(offset.minutes()))?)
        .map(|naive| naive.and_utc())
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// Parse DATE, UTC DATE-TIME, TZID-qualified and floating DATE-TIME values.
/// Floating times and unknown zones are read in the owner's offset.
fn parse_time(property: &Property, offset: UtcOffset) -> Result<IcsTime, String> {
    let raw = property.value.as_deref().map(str::trim).unwrap_or_default();
    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (raw.len() == 8 && !raw.contains('T'));

    if is_date {
        return NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map(IcsTime::Date)
            .map_err(|e| format!("{raw:?}: {e}"));
    }

    if let Some(utc) = raw.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .map(|naive| IcsTime::Instant(naive.and_utc()))
            .map_err(|e| format!("{raw:?}: {e}"));
    }

    let naive =
        NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S").map_err(|e| format!("{raw:?}: {e}"))?;

    let zoned = param(property, "TZID")
        .and_then(|tzid| tzid.trim_matches('"').parse::<Tz>().ok())
        .and_then(|tz| tz.from_local_datetime(&naive).earliest())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(IcsTime::Instant(zoned.unwrap_or_else(|| {
        (naive - Duration::minutes(i64::from(offset.minutes()))).and_utc()
    })))
}

/// Parse an RFC 5545 DURATION such as `PT1H30M`, `P1D` or `P2W`. Negative
/// durations are rejected.
fn parse_duration(raw: &str) -> Option<TimeDelta> {
    let raw = raw.trim();
    let body = raw.strip_prefix('+').unwrap_or(raw).strip_prefix('P')?;

    let mut total = TimeDelta::zero();
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_unit = false;

    for c in body.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' if number.is_empty() && !in_time => in_time = true,
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let part = match (c, in_time) {
                    ('W', false) => TimeDelta::try_weeks(n),
                    ('D', false) => TimeDelta::try_days(n),
                    ('H', true) => TimeDelta::try_hours(n),
                    ('M', true) => TimeDelta::try_minutes(n),
                    ('S', true) => TimeDelta::try_seconds(n),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
                seen_unit = true;
            }
            _ => return None,
        }
    }

    (seen_unit && number.is_empty()).then_some(total)
}

fn unescape_text(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\N", "\n")
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}

fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Serialize a draft as a single-event VCALENDAR for a CalDAV PUT.
pub fn to_ics_event(uid: &str, draft: &EventDraft) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Schej//Availability Engine//EN".to_string(),
        "BEGIN:VEVENT".to_string(),
        format!("UID:{uid}"),
        format!("DTSTAMP:{}", caldav_timestamp(Utc::now())),
        format!("DTSTART:{}", caldav_timestamp(draft.slot.start)),
        format!("DTEND:{}", caldav_timestamp(draft.slot.end)),
        format!("SUMMARY:{}", escape_text(&draft.title)),
    ];
    if let Some(description) = &draft.description {
        lines.push(format!("DESCRIPTION:{}", escape_text(description)));
    }
    lines.extend(draft.attendees.iter().map(|email| format!("ATTENDEE:mailto:{email}")));
    lines.push("END:VEVENT".to_string());
    lines.push("END:VCALENDAR".to_string());

    let mut body = lines.join("\r\n");
    body.push_str("\r\n");
    body
}
