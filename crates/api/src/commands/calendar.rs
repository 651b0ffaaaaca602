//! Calendar projection commands

use chrono::{DateTime, Utc};
use schej_core::AllDayFilter;
use schej_domain::{Interval, Result, SourceError, TimeWindow};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetCalendarRequest {
    pub user_id: String,
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    #[serde(default)]
    pub all_day: AllDayFilter,
}

/// Merged calendar of a user, with the sources that could not be read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarView {
    pub intervals: Vec<Interval>,
    pub errors: Vec<SourceError>,
    pub source_count: usize,
    /// e.g. "1 of 3 calendars unavailable"
    pub unavailable: Option<String>,
    /// Accounts whose refreshed tokens could not be stored
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unpersisted_token_accounts: Vec<String>,
}

/// Get the merged calendar of a user between `time_min` and `time_max`
pub async fn get_calendar(ctx: &AppContext, request: GetCalendarRequest) -> Result<CalendarView> {
    execute_command("calendar::get_calendar", || async {
        let window = TimeWindow::new(request.time_min, request.time_max)?;

        let aggregation =
            ctx.availability.get_calendar(&request.user_id, window, request.all_day).await?;
        let unavailable = aggregation.unavailable_summary();

        info!(
            command = "calendar::get_calendar",
            intervals = aggregation.intervals.len(),
            sources = aggregation.source_count,
            failed = aggregation.errors.len(),
            "calendar projected"
        );

        Ok(CalendarView {
            intervals: aggregation.intervals,
            errors: aggregation.errors,
            source_count: aggregation.source_count,
            unavailable,
            unpersisted_token_accounts: aggregation.unpersisted_token_accounts,
        })
    })
    .await
}
