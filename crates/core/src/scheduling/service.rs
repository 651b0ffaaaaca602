//! Scheduled event resolution
//!
//! Finalizing records the chosen slot first and pushes the calendar entry
//! second. A failed push leaves the slot recorded and is reported as
//! [`FinalizeError::PushFailed`] so the organizer can retry the push alone.
//! When the created entry's id cannot be stored, the entry is deleted again
//! and the push counts as failed.

use std::sync::Arc;

use chrono::Utc;
use schej_domain::{FinalizeError, Poll, SchejError, ScheduledEvent, Slot, SourceFailure, User};
use tracing::{info, instrument, warn};

use crate::calendar::{
    push_target, CalendarProvider, CalendarSource, EventDraft, ProviderSet, RefreshScope, TokenGuard,
};
use crate::poll::ports::PollRepository;
use crate::user::ports::UserRepository;

type FinalizeResult<T> = std::result::Result<T, FinalizeError>;

pub struct SchedulingService {
    users: Arc<dyn UserRepository>,
    polls: Arc<dyn PollRepository>,
    providers: ProviderSet,
    tokens: Arc<TokenGuard>,
}

impl SchedulingService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        polls: Arc<dyn PollRepository>,
        providers: ProviderSet,
        tokens: Arc<TokenGuard>,
    ) -> Self {
        Self { users, polls, providers, tokens }
    }

    /// Record `slot` as the poll's outcome and push it to the owner's
    /// primary calendar.
    #[instrument(skip(self))]
    pub async fn finalize(
        &self,
        poll_id: &str,
        slot: Slot,
        organizer_id: &str,
    ) -> FinalizeResult<ScheduledEvent> {
        if slot.end <= slot.start {
            return Err(SchejError::InvalidInput("chosen slot must end after it starts".into()).into());
        }

        let poll = self.load_owned_poll(poll_id, organizer_id).await?;
        if poll.is_finalized() {
            return Err(FinalizeError::AlreadyFinalized { poll_id: poll_id.to_string() });
        }
        if slot.duration() < poll.duration() {
            return Err(SchejError::InvalidInput(format!(
                "chosen slot is shorter than the poll duration of {} minutes",
                poll.duration_minutes
            ))
            .into());
        }

        let owner = self.load_user(&poll.owner_id).await?;
        let scheduled =
            ScheduledEvent::new(slot, owner.primary_account().map(|account| account.email.clone()));
        if !self.polls.record_scheduled_event(poll_id, &scheduled).await? {
            return Err(FinalizeError::AlreadyFinalized { poll_id: poll_id.to_string() });
        }
        info!(start = %slot.start, end = %slot.end, "poll finalized");

        self.push(&poll, &owner, scheduled).await
    }

    /// Retry the calendar push of a finalized poll whose earlier push failed.
    /// A poll that was already pushed is returned unchanged.
    #[instrument(skip(self))]
    pub async fn retry_push(
        &self,
        poll_id: &str,
        organizer_id: &str,
    ) -> FinalizeResult<ScheduledEvent> {
        let poll = self.load_owned_poll(poll_id, organizer_id).await?;
        let scheduled = active_event(&poll)?;
        if scheduled.is_pushed() {
            return Ok(scheduled);
        }

        let owner = self.load_user(&poll.owner_id).await?;
        self.push(&poll, &owner, scheduled).await
    }

    /// Cancel a finalized poll and delete the pushed calendar entry if any.
    ///
    /// The cancellation is stored before the delete is attempted; a failed
    /// delete is reported as `PushFailed` with the cancellation kept.
    #[instrument(skip(self))]
    pub async fn cancel(&self, poll_id: &str, organizer_id: &str) -> FinalizeResult<ScheduledEvent> {
        let poll = self.load_owned_poll(poll_id, organizer_id).await?;
        let mut scheduled = active_event(&poll)?;
        scheduled.cancelled_at = Some(Utc::now());
        self.polls.update_scheduled_event(poll_id, &scheduled).await?;
        info!("scheduled event cancelled");

        let Some(event_id) = scheduled.provider_event_id.clone() else {
            return Ok(scheduled);
        };
        let owner = self.load_user(&poll.owner_id).await?;
        let source = self.push_source(&poll, &owner, &scheduled)?;
        let provider = self.providers.require(source.provider()).map_err(|e| push_failed(&poll, e))?;
        self.delete_entry(&source, &provider, &event_id).await.map_err(|e| {
            warn!(source = %source.id, error = %e, "calendar entry not deleted");
            push_failed(&poll, e)
        })?;

        Ok(scheduled)
    }

    async fn push(
        &self,
        poll: &Poll,
        owner: &User,
        mut scheduled: ScheduledEvent,
    ) -> FinalizeResult<ScheduledEvent> {
        let source = self.push_source(poll, owner, &scheduled)?;
        let provider = self.providers.require(source.provider()).map_err(|e| push_failed(poll, e))?;
        let draft = EventDraft {
            title: poll.name.clone(),
            description: None,
            slot: scheduled.slot,
            attendees: poll
                .responses
                .iter()
                .filter_map(|r| r.profile.as_ref().map(|p| p.email.clone()))
                .filter(|email| !email.eq_ignore_ascii_case(&owner.email))
                .collect(),
        };

        let scope = RefreshScope::new();
        let created = self
            .tokens
            .call_authorized(&source, &scope, |authorized| {
                let provider = Arc::clone(&provider);
                let draft = draft.clone();
                async move { provider.create_event(&authorized, &draft).await }
            })
            .await;

        match created {
            Ok(event_id) => {
                scheduled.provider_event_id = Some(event_id.clone());
                if let Err(err) = self.polls.update_scheduled_event(&poll.id, &scheduled).await {
                    // An entry whose id is not stored is unreachable by retry_push and cancel
                    return Err(match self.delete_entry(&source, &provider, &event_id).await {
                        Ok(()) => {
                            warn!(source = %source.id, error = %err, "calendar entry id not stored, entry removed");
                            push_failed(poll, format!("calendar entry id not stored: {err}"))
                        }
                        Err(delete_err) => {
                            warn!(
                                source = %source.id,
                                provider_event_id = %event_id,
                                error = %err,
                                delete_error = %delete_err,
                                "calendar entry id not stored and entry left orphaned"
                            );
                            push_failed(
                                poll,
                                format!("calendar entry {event_id} created but its id was not stored: {err}"),
                            )
                        }
                    });
                }
                info!(source = %source.id, "calendar entry created");
                Ok(scheduled)
            }
            Err(failure) => {
                warn!(source = %source.id, error = %failure, "calendar push failed, slot kept");
                Err(push_failed(poll, failure))
            }
        }
    }

    async fn delete_entry(
        &self,
        source: &CalendarSource,
        provider: &Arc<dyn CalendarProvider>,
        event_id: &str,
    ) -> std::result::Result<(), SourceFailure> {
        let scope = RefreshScope::new();
        self.tokens
            .call_authorized(source, &scope, |authorized| {
                let provider = Arc::clone(provider);
                let event_id = event_id.to_string();
                async move { provider.delete_event(&authorized, &event_id).await }
            })
            .await
    }

    fn push_source(
        &self,
        poll: &Poll,
        owner: &User,
        scheduled: &ScheduledEvent,
    ) -> FinalizeResult<CalendarSource> {
        scheduled
            .calendar_account
            .as_deref()
            .and_then(|email| push_target(owner, email))
            .ok_or_else(|| push_failed(poll, "owner has no linked calendar account"))
    }

    async fn load_owned_poll(&self, poll_id: &str, organizer_id: &str) -> FinalizeResult<Poll> {
        let poll = self
            .polls
            .get_by_id(poll_id)
            .await?
            .ok_or_else(|| SchejError::NotFound(format!("poll {poll_id}")))?;
        if poll.owner_id != organizer_id {
            return Err(SchejError::Auth(format!("{organizer_id} does not own poll {poll_id}")).into());
        }
        Ok(poll)
    }

    async fn load_user(&self, user_id: &str) -> FinalizeResult<User> {
        Ok(self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| SchejError::NotFound(format!("user {user_id}")))?)
    }
}

fn active_event(poll: &Poll) -> FinalizeResult<ScheduledEvent> {
    match &poll.scheduled_event {
        None => Err(SchejError::InvalidInput(format!("poll {} is not finalized", poll.id)).into()),
        Some(event) if event.is_cancelled() => {
            Err(SchejError::Conflict(format!("scheduled event of poll {} was cancelled", poll.id)).into())
        }
        Some(event) => Ok(event.clone()),
    }
}

fn push_failed(poll: &Poll, reason: impl ToString) -> FinalizeError {
    FinalizeError::PushFailed { poll_id: poll.id.clone(), reason: reason.to_string(), slot_recorded: true }
}
