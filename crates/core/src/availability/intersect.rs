//! Pure interval arithmetic over merged timelines

use chrono::{Duration, NaiveDate};
use schej_domain::{Interval, Result, SchejError, Slot, TimeWindow, UtcOffset};
use serde::{Deserialize, Serialize};

/// Whether all-day entries block time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllDayFilter {
    /// All-day entries are shown but never count as busy
    #[default]
    Exclude,
    Include,
}

impl AllDayFilter {
    pub fn admits(self, interval: &Interval) -> bool {
        interval.is_busy(self == Self::Include)
    }
}

/// Intervals of `timeline` overlapping `window`, after applying `filter`.
///
/// Zero-length intervals count as overlapping when they sit inside the window.
pub fn project(timeline: &[Interval], window: TimeWindow, filter: AllDayFilter) -> Vec<Interval> {
    timeline
        .iter()
        .filter(|interval| filter.admits(interval))
        .filter(|interval| {
            if interval.start == interval.end {
                window.start <= interval.start && interval.start < window.end
            } else {
                window.overlaps(interval.start, interval.end)
            }
        })
        .cloned()
        .collect()
}

/// Free gaps of at least `min_duration` on each candidate date.
///
/// Each date covers local midnight to local midnight in `offset`, clipped to
/// `clip` when given. Slots come back in ascending order.
pub fn free_slots(
    busy: &[Interval],
    dates: &[NaiveDate],
    offset: UtcOffset,
    min_duration: Duration,
    clip: Option<TimeWindow>,
    filter: AllDayFilter,
) -> Result<Vec<Slot>> {
    if min_duration <= Duration::zero() {
        return Err(SchejError::InvalidInput(format!(
            "slot duration must be positive, got {} minutes",
            min_duration.num_minutes()
        )));
    }

    let mut blocking: Vec<&Interval> =
        busy.iter().filter(|i| filter.admits(i) && i.start < i.end).collect();
    blocking.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut slots = Vec::new();
    for date in dates {
        let next = date.succ_opt().ok_or_else(|| {
            SchejError::InvalidInput(format!("date out of range: {date}"))
        })?;
        let (day_start, day_end) = (offset.midnight(*date), offset.midnight(next));
        let Some((start, end)) = (match clip {
            Some(window) => window.clip(day_start, day_end),
            None => Some((day_start, day_end)),
        }) else {
            continue;
        };

        let mut cursor = start;
        for interval in blocking.iter().filter(|i| i.overlaps(start, end)) {
            if interval.start > cursor && interval.start - cursor >= min_duration {
                slots.push(Slot { start: cursor, end: interval.start });
            }
            cursor = cursor.max(interval.end);
            if cursor >= end {
                break;
            }
        }
        if cursor < end && end - cursor >= min_duration {
            slots.push(Slot { start: cursor, end });
        }
    }

    Ok(slots)
}
