//! Poll creation and listing

use std::sync::Arc;

use schej_domain::{
    ParticipantId, Poll, PollSchedule, Remindee, Result, SchejError, Toggle, UserPolls,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::ports::PollRepository;

/// Caller input for a new poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPoll {
    pub name: String,
    pub schedule: PollSchedule,
    pub duration_minutes: i64,
    #[serde(default)]
    pub notifications_enabled: bool,
    /// Emails of invitees without an account
    #[serde(default)]
    pub remindees: Vec<String>,
}

/// Poll lifecycle service
pub struct PollService {
    polls: Arc<dyn PollRepository>,
}

impl PollService {
    pub fn new(polls: Arc<dyn PollRepository>) -> Self {
        Self { polls }
    }

    /// Validate and store a new poll owned by `owner_id`.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_poll(&self, owner_id: &str, input: NewPoll) -> Result<Poll> {
        if owner_id.trim().is_empty() {
            return Err(SchejError::InvalidInput("poll owner must not be empty".into()));
        }

        let mut poll = Poll::new(owner_id, input.name.trim(), input.schedule, input.duration_minutes)?;
        poll.notifications_enabled = input.notifications_enabled;
        for email in input.remindees {
            let email = email.trim();
            if !email.contains('@') {
                return Err(SchejError::InvalidInput(format!("invalid remindee email: {email:?}")));
            }
            if poll.remindees.iter().any(|r| r.email.eq_ignore_ascii_case(email)) {
                continue;
            }
            poll.remindees.push(Remindee {
                email: email.to_string(),
                task_ids: Vec::new(),
                responded: Toggle::Off,
            });
        }

        self.polls.create(&poll).await?;
        info!(poll_id = %poll.id, remindees = poll.remindees.len(), "poll created");
        Ok(poll)
    }

    pub async fn get_poll(&self, poll_id: &str) -> Result<Poll> {
        self.polls
            .get_by_id(poll_id)
            .await?
            .ok_or_else(|| SchejError::NotFound(format!("poll {poll_id}")))
    }

    /// Polls the user owns and polls they responded to, without responses.
    #[instrument(skip(self))]
    pub async fn list_user_polls(&self, user_id: &str) -> Result<UserPolls> {
        let participant = ParticipantId::parse(user_id)?;
        let mut listing = UserPolls::default();

        for poll in self.polls.list_for_user(user_id).await? {
            if poll.owner_id == user_id {
                listing.owned.push(poll.without_responses());
            } else if poll.responses.contains(&participant) {
                listing.joined.push(poll.without_responses());
            }
        }

        listing.owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listing.joined.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(owned = listing.owned.len(), joined = listing.joined.len(), "listed polls");
        Ok(listing)
    }
}
