//! Normalized interval model
//!
//! Every provider event ends up as an [`Interval`]: a UTC span with an all-day
//! flag and the [`SourceId`] it came from. Windows and slots share the same
//! half-open `[start, end)` semantics.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MINUTES_PER_DAY;
use crate::errors::{Result, SchejError};

/// Offset from UTC in minutes, positive east of Greenwich (UTC+02:00 is `120`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcOffset(i32);

impl UtcOffset {
    pub const UTC: Self = Self(0);

    /// Build an offset, rejecting anything beyond a full day.
    pub fn from_minutes(minutes: i32) -> Result<Self> {
        if i64::from(minutes).abs() >= MINUTES_PER_DAY {
            return Err(SchejError::InvalidInput(format!(
                "utc offset out of range: {minutes} minutes"
            )));
        }
        Ok(Self(minutes))
    }

    pub const fn minutes(self) -> i32 {
        self.0
    }

    /// UTC instant of local midnight at the start of `date`.
    pub fn midnight(self, date: NaiveDate) -> DateTime<Utc> {
        (date.and_time(NaiveTime::MIN) - Duration::minutes(i64::from(self.0))).and_utc()
    }

    /// Local calendar date of `instant`.
    pub fn local_date(self, instant: DateTime<Utc>) -> NaiveDate {
        (instant + Duration::minutes(i64::from(self.0))).date_naive()
    }
}

/// Identifies one queried calendar: the account email plus the sub-calendar id
/// (`primary` when the account has no sub-calendar map).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId {
    pub account: String,
    pub calendar: String,
}

impl SourceId {
    pub fn new(account: impl Into<String>, calendar: impl Into<String>) -> Self {
        Self { account: account.into(), calendar: calendar.into() }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.calendar)
    }
}

/// Caller-supplied query bounds. `end` may equal `start` but never precede it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(SchejError::InvalidInput(format!(
                "time window ends before it starts ({start} > {end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Window covering every local day from `first` through `last` inclusive.
    pub fn for_days(first: NaiveDate, last: NaiveDate, offset: UtcOffset) -> Result<Self> {
        let end_day = last.succ_opt().ok_or_else(|| {
            SchejError::InvalidInput(format!("date out of range: {last}"))
        })?;
        Self::new(offset.midnight(first), offset.midnight(end_day))
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && self.start < end
    }

    /// Intersection with `[start, end)`, if non-empty.
    pub fn clip(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = start.max(self.start);
        let end = end.min(self.end);
        (start < end).then_some((start, end))
    }
}

/// A concrete span with positive length: free slots, chosen slots and
/// self-reported availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(SchejError::InvalidInput(format!(
                "slot must end after it starts ({start} >= {end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Provider-agnostic calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_event_id: Option<String>,
}

impl Interval {
    /// Timed interval with an explicit end.
    pub fn timed(source: SourceId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(SchejError::InvalidInput(format!(
                "interval from {source} ends before it starts ({start} > {end})"
            )));
        }
        Ok(Self { start, end, all_day: false, source, title: None, provider_event_id: None })
    }

    /// Timed interval whose end is derived from a duration.
    pub fn with_duration(source: SourceId, start: DateTime<Utc>, duration: Duration) -> Result<Self> {
        Self::timed(source, start, start + duration)
    }

    /// All-day interval spanning local midnight of `first_day` to local
    /// midnight of `end_day` (exclusive). `end_day == first_day` is treated as a
    /// single day.
    pub fn all_day(
        source: SourceId,
        first_day: NaiveDate,
        end_day: NaiveDate,
        offset: UtcOffset,
    ) -> Result<Self> {
        let end_day = if end_day <= first_day {
            first_day.succ_opt().ok_or_else(|| {
                SchejError::InvalidInput(format!("date out of range: {first_day}"))
            })?
        } else {
            end_day
        };

        Ok(Self {
            start: offset.midnight(first_day),
            end: offset.midnight(end_day),
            all_day: true,
            source,
            title: None,
            provider_event_id: None,
        })
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self
    }

    pub fn with_provider_event_id(mut self, id: Option<String>) -> Self {
        self.provider_event_id = id;
        self
    }

    /// Whether this interval blocks time under the given all-day policy.
    pub fn is_busy(&self, include_all_day: bool) -> bool {
        include_all_day || !self.all_day
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn source() -> SourceId {
        SourceId::new("a@example.com", "primary")
    }

    #[test]
    fn timed_interval_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 7, 21, 15, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 7, 21, 14, 0, 0).unwrap();
        assert!(matches!(Interval::timed(source(), start, end), Err(SchejError::InvalidInput(_))));
        assert!(Interval::timed(source(), end, end).is_ok());
    }

    #[test]
    fn all_day_interval_spans_local_midnights() {
        let offset = UtcOffset::from_minutes(-240).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 7, 21).unwrap();

        let interval = Interval::all_day(source(), day, day, offset).unwrap();
        assert!(interval.all_day);
        assert_eq!(interval.start, Utc.with_ymd_and_hms(2024, 7, 21, 4, 0, 0).unwrap());
        assert_eq!(interval.end, Utc.with_ymd_and_hms(2024, 7, 22, 4, 0, 0).unwrap());
    }

    #[test]
    fn offset_round_trips_local_dates() {
        let offset = UtcOffset::from_minutes(330).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 7, 22).unwrap();
        let midnight = offset.midnight(day);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 7, 21, 18, 30, 0).unwrap());
        assert_eq!(offset.local_date(midnight), day);
        assert!(UtcOffset::from_minutes(24 * 60).is_err());
    }

    #[test]
    fn window_rejects_out_of_order_bounds() {
        let early = Utc.with_ymd_and_hms(2024, 7, 21, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 7, 22, 0, 0, 0).unwrap();
        assert!(TimeWindow::new(late, early).is_err());
        assert!(TimeWindow::new(early, early).is_ok());

        let window = TimeWindow::new(early, late).unwrap();
        let clipped = window.clip(early - Duration::hours(2), early + Duration::hours(1));
        assert_eq!(clipped, Some((early, early + Duration::hours(1))));
        assert_eq!(window.clip(late, late + Duration::hours(1)), None);
    }

    #[test]
    fn slot_requires_positive_length() {
        let t = Utc.with_ymd_and_hms(2024, 7, 22, 9, 0, 0).unwrap();
        assert!(Slot::new(t, t).is_err());
        assert_eq!(Slot::new(t, t + Duration::minutes(30)).unwrap().duration(), Duration::minutes(30));
    }

    #[test]
    fn blank_titles_are_dropped() {
        let t = Utc.with_ymd_and_hms(2024, 7, 22, 9, 0, 0).unwrap();
        let interval = Interval::timed(source(), t, t).unwrap().with_title(Some("  ".into()));
        assert_eq!(interval.title, None);
    }
}
