//! Timeline merge
//!
//! Per-source results are combined into one list sorted by start, then end,
//! then source order. Among intervals with identical bounds, one is dropped
//! as a duplicate when it comes from the same source, carries the same
//! provider event id, or has the same title (case-insensitive) as an
//! interval already kept. The earliest source wins.

use schej_domain::Interval;

/// Merge per-source interval lists; the outer order is source priority.
pub fn merge_timelines(per_source: Vec<Vec<Interval>>) -> Vec<Interval> {
    let mut tagged: Vec<(usize, Interval)> = per_source
        .into_iter()
        .enumerate()
        .flat_map(|(order, intervals)| intervals.into_iter().map(move |i| (order, i)))
        .collect();

    // Stable: equal keys keep the provider's own order.
    tagged.sort_by(|(a_order, a), (b_order, b)| {
        a.start.cmp(&b.start).then(a.end.cmp(&b.end)).then(a_order.cmp(b_order))
    });

    let mut merged: Vec<Interval> = Vec::with_capacity(tagged.len());
    let mut group_start = 0;
    for (_, interval) in tagged {
        let same_bounds = merged
            .get(group_start)
            .is_some_and(|first| first.start == interval.start && first.end == interval.end);
        if !same_bounds {
            group_start = merged.len();
        }

        if merged[group_start..].iter().any(|kept| is_duplicate(kept, &interval)) {
            continue;
        }
        merged.push(interval);
    }

    merged
}

fn is_duplicate(kept: &Interval, candidate: &Interval) -> bool {
    if kept.source == candidate.source {
        return true;
    }
    if let (Some(a), Some(b)) = (&kept.provider_event_id, &candidate.provider_event_id) {
        if a == b {
            return true;
        }
    }
    match (&kept.title, &candidate.title) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use schej_domain::SourceId;

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 22, hour, 0, 0).unwrap()
    }

    fn event(calendar: &str, start: u32, end: u32, title: &str) -> Interval {
        Interval::timed(SourceId::new("a@example.com", calendar), at(start), at(end))
            .unwrap()
            .with_title(Some(title.to_string()))
    }

    #[test]
    fn output_is_sorted_by_start_then_end() {
        let merged = merge_timelines(vec![
            vec![event("work", 13, 14, "Lunch"), event("work", 9, 11, "Standup")],
            vec![event("home", 9, 10, "School run")],
        ]);

        let bounds: Vec<_> = merged.iter().map(|i| (i.start, i.end)).collect();
        assert_eq!(bounds, vec![(at(9), at(10)), (at(9), at(11)), (at(13), at(14))]);
    }

    #[test]
    fn identical_bounds_and_title_keep_first_source() {
        let merged = merge_timelines(vec![
            vec![event("work", 9, 10, "Planning")],
            vec![event("shared", 9, 10, "  planning ")],
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source.calendar, "work");
    }

    #[test]
    fn different_titles_are_not_merged() {
        let merged = merge_timelines(vec![
            vec![event("work", 9, 10, "Planning")],
            vec![event("home", 9, 10, "Dentist")],
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source.calendar, "work");
        assert_eq!(merged[1].source.calendar, "home");
    }

    #[test]
    fn shared_provider_event_id_is_a_duplicate() {
        let first = event("work", 9, 10, "Planning").with_provider_event_id(Some("evt-1".into()));
        let second = event("team", 9, 10, "Team planning").with_provider_event_id(Some("evt-1".into()));

        let merged = merge_timelines(vec![vec![first.clone()], vec![second]]);
        assert_eq!(merged, vec![first]);
    }

    #[test]
    fn merge_is_deterministic_across_runs() {
        let input = vec![
            vec![event("work", 9, 10, "A"), event("work", 9, 10, "B")],
            vec![event("home", 9, 10, "C"), event("home", 8, 9, "D")],
        ];

        let first = merge_timelines(input.clone());
        for _ in 0..10 {
            assert_eq!(merge_timelines(input.clone()), first);
        }
        assert_eq!(first[0].title.as_deref(), Some("D"));
    }
}
