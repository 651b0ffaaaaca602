//! Availability service
//!
//! Glues aggregation to polls: calendar projection for a window, calendar
//! derived responses, and self-reported responses. Work on one
//! (poll, participant) pair is serialized so a resolution never races a
//! submission for the same response.

use std::sync::Arc;

use futures::future::join_all;
use schej_domain::{
    DateRange, ParticipantId, ParticipantProfile, Poll, Response, ResponseOrigin, Result,
    SchejError, Slot, SourceError, TimeWindow, User,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::intersect::{free_slots, project, AllDayFilter};
use crate::calendar::{Aggregation, EventAggregator};
use crate::poll::ports::PollRepository;
use crate::user::ports::UserRepository;
use crate::utils::KeyedLocks;

/// Knobs for a calendar-derived resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Query range; required for days-of-week polls
    pub range: Option<DateRange>,
    pub all_day: AllDayFilter,
    /// Overwrite a self-reported response with calendar data
    pub recompute: bool,
}

/// Outcome of [`AvailabilityService::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub response: Response,
    /// Sources that could not be read; the response reflects the rest
    pub source_errors: Vec<SourceError>,
    pub source_count: usize,
    /// False when an existing self-reported response was kept
    pub recomputed: bool,
}

/// Explicit availability submitted by a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub participant: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub availability: Vec<Slot>,
}

pub struct AvailabilityService {
    users: Arc<dyn UserRepository>,
    polls: Arc<dyn PollRepository>,
    aggregator: Arc<EventAggregator>,
    locks: KeyedLocks,
}

impl AvailabilityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        polls: Arc<dyn PollRepository>,
        aggregator: Arc<EventAggregator>,
    ) -> Self {
        Self { users, polls, aggregator, locks: KeyedLocks::new() }
    }

    /// Merged timeline of `user_id` within `window`.
    #[instrument(skip(self, window))]
    pub async fn get_calendar(
        &self,
        user_id: &str,
        window: TimeWindow,
        filter: AllDayFilter,
    ) -> Result<Aggregation> {
        let user = self.load_user(user_id).await?;
        let mut aggregation = self.aggregator.aggregate(&user, window).await;
        aggregation.intervals = project(&aggregation.intervals, window, filter);
        Ok(aggregation)
    }

    /// Compute `participant`'s free slots from their calendars and store them
    /// as their response.
    #[instrument(skip(self, options))]
    pub async fn resolve(
        &self,
        poll_id: &str,
        participant: &str,
        options: ResolveOptions,
    ) -> Result<Resolution> {
        let participant = ParticipantId::parse(participant)?;
        let _guard = self.locks.lock(&lock_key(poll_id, &participant)).await;

        let poll = self.load_poll(poll_id).await?;
        let dates = poll.schedule.candidate_dates(options.range)?;

        if let Some(existing) = poll.responses.get(&participant) {
            if existing.is_self_reported() && !options.recompute {
                debug!("keeping self-reported response");
                return Ok(Resolution {
                    response: existing.clone(),
                    source_errors: Vec::new(),
                    source_count: 0,
                    recomputed: false,
                });
            }
        }

        let user = self.load_user(participant.as_str()).await?;
        let aggregation = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => {
                let window = TimeWindow::for_days(*first, *last, user.utc_offset)?;
                self.aggregator.aggregate(&user, window).await
            }
            _ => Aggregation::default(),
        };
        let slots = free_slots(
            &aggregation.intervals,
            &dates,
            user.utc_offset,
            poll.duration(),
            None,
            options.all_day,
        )?;

        let response = Response::new(
            participant,
            user.display_name(),
            slots,
            ResponseOrigin::CalendarDerived,
        )
        .with_profile(Some(profile_of(&user)));

        self.polls.upsert_response(poll_id, &response).await?;
        self.mark_remindee(&poll, &user.email).await?;
        if poll.is_finalized() {
            debug!("poll already finalized, response stored for reference only");
        }

        info!(
            slots = response.availability.len(),
            failed_sources = aggregation.errors.len(),
            "availability resolved from calendars"
        );
        Ok(Resolution {
            response,
            source_errors: aggregation.errors,
            source_count: aggregation.source_count,
            recomputed: true,
        })
    }

    /// Resolve several participants concurrently. Each participant gets its
    /// own result.
    pub async fn resolve_many(
        &self,
        poll_id: &str,
        participants: &[String],
        options: ResolveOptions,
    ) -> Vec<(String, Result<Resolution>)> {
        let resolutions = participants.iter().map(|participant| async move {
            (participant.clone(), self.resolve(poll_id, participant, options).await)
        });
        join_all(resolutions).await
    }

    /// Store a self-reported response, replacing any earlier one.
    #[instrument(skip(self, input), fields(participant = %input.participant))]
    pub async fn submit(&self, poll_id: &str, input: SubmitResponse) -> Result<Response> {
        let participant = ParticipantId::parse(&input.participant)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(SchejError::InvalidInput("response name must not be empty".into()));
        }
        if let Some(slot) = input.availability.iter().find(|s| s.end <= s.start) {
            return Err(SchejError::InvalidInput(format!(
                "availability slot must end after it starts ({} >= {})",
                slot.start, slot.end
            )));
        }

        let _guard = self.locks.lock(&lock_key(poll_id, &participant)).await;
        let poll = self.load_poll(poll_id).await?;

        let profile = input.email.as_deref().map(str::trim).filter(|e| !e.is_empty()).map(|email| {
            ParticipantProfile {
                email: email.to_string(),
                first_name: None,
                last_name: None,
                picture: None,
            }
        });
        let response = Response::new(participant, name, input.availability, ResponseOrigin::SelfReported)
            .with_profile(profile);

        self.polls.upsert_response(poll_id, &response).await?;
        if let Some(profile) = &response.profile {
            self.mark_remindee(&poll, &profile.email).await?;
        }

        info!(slots = response.availability.len(), "self-reported availability stored");
        Ok(response)
    }

    async fn mark_remindee(&self, poll: &Poll, email: &str) -> Result<()> {
        if poll.remindees.iter().any(|r| r.email.eq_ignore_ascii_case(email)) {
            self.polls.mark_remindee_responded(&poll.id, email).await?;
            debug!(remindee = email, "remindee marked as responded");
        }
        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| SchejError::NotFound(format!("user {user_id}")))
    }

    async fn load_poll(&self, poll_id: &str) -> Result<Poll> {
        self.polls
            .get_by_id(poll_id)
            .await?
            .ok_or_else(|| SchejError::NotFound(format!("poll {poll_id}")))
    }
}

fn lock_key(poll_id: &str, participant: &ParticipantId) -> String {
    format!("{poll_id}:{participant}")
}

fn profile_of(user: &User) -> ParticipantProfile {
    ParticipantProfile {
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        picture: user.picture.clone(),
    }
}
