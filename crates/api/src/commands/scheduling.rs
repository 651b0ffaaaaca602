//! Finalization commands
//!
//! Choosing a slot records it on the poll first and pushes a calendar entry
//! to the organizer's primary account second. A failed push leaves the slot
//! recorded; `retry_push` picks it up later.

use schej_domain::{FinalizeError, ScheduledEvent, Slot};

use crate::utils::command_helpers::execute_command;
use crate::AppContext;

/// Record `slot` as the poll's event and push it to the organizer's calendar
pub async fn finalize_event(
    ctx: &AppContext,
    poll_id: &str,
    slot: Slot,
    organizer_id: &str,
) -> Result<ScheduledEvent, FinalizeError> {
    execute_command("scheduling::finalize_event", || async {
        ctx.scheduling.finalize(poll_id, slot, organizer_id).await
    })
    .await
}

/// Push a recorded event whose earlier push failed
pub async fn retry_push(
    ctx: &AppContext,
    poll_id: &str,
    organizer_id: &str,
) -> Result<ScheduledEvent, FinalizeError> {
    execute_command("scheduling::retry_push", || async {
        ctx.scheduling.retry_push(poll_id, organizer_id).await
    })
    .await
}

/// Cancel the scheduled event and remove its calendar entry
pub async fn cancel_scheduled_event(
    ctx: &AppContext,
    poll_id: &str,
    organizer_id: &str,
) -> Result<ScheduledEvent, FinalizeError> {
    execute_command("scheduling::cancel_scheduled_event", || async {
        ctx.scheduling.cancel(poll_id, organizer_id).await
    })
    .await
}
