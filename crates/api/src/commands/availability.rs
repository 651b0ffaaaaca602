//! Availability commands
//!
//! Calendar-derived resolution of a participant's response and explicit
//! submissions. Both end up as the participant's entry in the poll's
//! response map.

use chrono::NaiveDate;
use schej_core::{AllDayFilter, ResolveOptions, SubmitResponse};
use schej_domain::{DateRange, Response, Result, SchejError, SourceError};
use serde::{Deserialize, Serialize};

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAvailabilityRequest {
    pub poll_id: String,
    pub participant: String,
    /// First local date to expand a days-of-week poll over
    #[serde(default)]
    pub range_start: Option<NaiveDate>,
    #[serde(default)]
    pub range_end: Option<NaiveDate>,
    #[serde(default)]
    pub all_day: AllDayFilter,
    #[serde(default)]
    pub recompute: bool,
}

impl ResolveAvailabilityRequest {
    fn options(&self) -> Result<ResolveOptions> {
        let range = match (self.range_start, self.range_end) {
            (Some(first), Some(last)) => Some(DateRange::new(first, last)?),
            (None, None) => None,
            _ => {
                return Err(SchejError::InvalidInput(
                    "rangeStart and rangeEnd must be given together".into(),
                ))
            }
        };
        Ok(ResolveOptions { range, all_day: self.all_day, recompute: self.recompute })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionView {
    pub response: Response,
    pub source_errors: Vec<SourceError>,
    pub source_count: usize,
    pub recomputed: bool,
}

/// Derive a participant's availability from their linked calendars
pub async fn resolve_availability(
    ctx: &AppContext,
    request: ResolveAvailabilityRequest,
) -> Result<ResolutionView> {
    execute_command("availability::resolve_availability", || async {
        let options = request.options()?;
        let resolution =
            ctx.availability.resolve(&request.poll_id, &request.participant, options).await?;

        Ok(ResolutionView {
            response: resolution.response,
            source_errors: resolution.source_errors,
            source_count: resolution.source_count,
            recomputed: resolution.recomputed,
        })
    })
    .await
}

/// Store explicit availability for a participant
pub async fn submit_response(
    ctx: &AppContext,
    poll_id: &str,
    input: SubmitResponse,
) -> Result<Response> {
    execute_command("availability::submit_response", || async {
        ctx.availability.submit(poll_id, input).await
    })
    .await
}
