//! Scheduling polls, participant responses and finalized events

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::interval::Slot;
use super::toggle::Toggle;
use crate::errors::{Result, SchejError};

/// Longest span a days-of-week poll may be expanded over in one call.
pub const MAX_DATE_RANGE_DAYS: i64 = 366;

// ============================================================================
// Participant identity
// ============================================================================

/// Validated participant key used for the response map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SchejError::InvalidInput("participant id must not be empty".into()));
        }
        if trimmed.len() > 128 || trimmed.chars().any(char::is_whitespace) {
            return Err(SchejError::InvalidInput(format!("invalid participant id: {trimmed:?}")));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = SchejError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ParticipantId> for String {
    fn from(value: ParticipantId) -> Self {
        value.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public profile fields copied onto a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

// ============================================================================
// Candidate schedule
// ============================================================================

/// Inclusive range of local dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DateRange {
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self> {
        if last < first {
            return Err(SchejError::InvalidInput(format!(
                "date range ends before it starts ({first} > {last})"
            )));
        }
        if (last - first).num_days() >= MAX_DATE_RANGE_DAYS {
            return Err(SchejError::InvalidInput(format!(
                "date range longer than {MAX_DATE_RANGE_DAYS} days"
            )));
        }
        Ok(Self { first, last })
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.first.iter_days().take_while({
            let last = self.last;
            move |day| *day <= last
        })
    }
}

/// Which dates a poll asks about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollSchedule {
    /// Explicit candidate dates
    Dates { dates: Vec<NaiveDate> },
    /// Recurring weekdays, 0 = Sunday through 6 = Saturday
    DaysOfWeek { days: BTreeSet<u8> },
}

impl PollSchedule {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Dates { dates } if dates.is_empty() => {
                Err(SchejError::InvalidInput("poll needs at least one candidate date".into()))
            }
            Self::DaysOfWeek { days } if days.is_empty() => {
                Err(SchejError::InvalidInput("poll needs at least one weekday".into()))
            }
            Self::DaysOfWeek { days } => match days.iter().find(|d| **d > 6) {
                Some(day) => Err(SchejError::InvalidInput(format!(
                    "weekday out of range (0=Sunday..6=Saturday): {day}"
                ))),
                None => Ok(()),
            },
            Self::Dates { .. } => Ok(()),
        }
    }

    /// Candidate local dates, ascending and unique.
    ///
    /// Explicit date lists ignore `range`. Days-of-week polls expand every date
    /// in `range` whose weekday is in the set and require a range.
    pub fn candidate_dates(&self, range: Option<DateRange>) -> Result<Vec<NaiveDate>> {
        self.validate()?;
        match self {
            Self::Dates { dates } => {
                let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();
                Ok(unique.into_iter().collect())
            }
            Self::DaysOfWeek { days } => {
                let range = range.ok_or_else(|| {
                    SchejError::InvalidInput("days-of-week poll requires a date range".into())
                })?;
                Ok(range
                    .days()
                    .filter(|date| {
                        u8::try_from(date.weekday().num_days_from_sunday())
                            .is_ok_and(|dow| days.contains(&dow))
                    })
                    .collect())
            }
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// How a response's availability was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOrigin {
    SelfReported,
    CalendarDerived,
}

/// One participant's availability for a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub participant: ParticipantId,
    pub name: String,
    #[serde(default)]
    pub profile: Option<ParticipantProfile>,
    /// Ascending, non-overlapping
    pub availability: Vec<Slot>,
    pub origin: ResponseOrigin,
    pub updated_at: DateTime<Utc>,
}

impl Response {
    pub fn new(
        participant: ParticipantId,
        name: impl Into<String>,
        availability: Vec<Slot>,
        origin: ResponseOrigin,
    ) -> Self {
        Self {
            participant,
            name: name.into(),
            profile: None,
            availability: coalesce_slots(availability),
            origin,
            updated_at: Utc::now(),
        }
    }

    pub fn with_profile(mut self, profile: Option<ParticipantProfile>) -> Self {
        self.profile = profile;
        self
    }

    pub fn is_self_reported(&self) -> bool {
        self.origin == ResponseOrigin::SelfReported
    }
}

/// Sort slots and merge overlapping or touching ones.
pub fn coalesce_slots(mut slots: Vec<Slot>) -> Vec<Slot> {
    slots.sort();
    let mut merged: Vec<Slot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if slot.start <= last.end => last.end = last.end.max(slot.end),
            _ => merged.push(slot),
        }
    }
    merged
}

/// Response map keyed by participant. Lookups and inserts report missing or
/// duplicate keys instead of defaulting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Responses(BTreeMap<ParticipantId, Response>);

impl Responses {
    pub fn get(&self, participant: &ParticipantId) -> Option<&Response> {
        self.0.get(participant)
    }

    /// Like [`Responses::get`] but a missing entry is an error
    pub fn require(&self, participant: &ParticipantId) -> Result<&Response> {
        self.0
            .get(participant)
            .ok_or_else(|| SchejError::NotFound(format!("no response from {participant}")))
    }

    /// Add a first response; fails if the participant already responded.
    pub fn insert(&mut self, response: Response) -> Result<()> {
        if self.0.contains_key(&response.participant) {
            return Err(SchejError::Conflict(format!(
                "{} has already responded",
                response.participant
            )));
        }
        self.0.insert(response.participant.clone(), response);
        Ok(())
    }

    /// Replace an existing response, returning the previous one.
    pub fn replace(&mut self, response: Response) -> Result<Response> {
        match self.0.get_mut(&response.participant) {
            Some(existing) => Ok(std::mem::replace(existing, response)),
            None => Err(SchejError::NotFound(format!(
                "no response from {} to replace",
                response.participant
            ))),
        }
    }

    /// Insert or replace, returning the previous response if any.
    pub fn upsert(&mut self, response: Response) -> Option<Response> {
        self.0.insert(response.participant.clone(), response)
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.0.contains_key(participant)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Response> {
        self.0.values()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

// ============================================================================
// Poll
// ============================================================================

/// Finalized slot and the calendar entry pushed for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub slot: Slot,
    /// Account the entry was (or will be) pushed to
    #[serde(default)]
    pub calendar_account: Option<String>,
    /// Provider id of the pushed entry; `None` until a push succeeds
    #[serde(default)]
    pub provider_event_id: Option<String>,
    pub finalized_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl ScheduledEvent {
    pub fn new(slot: Slot, calendar_account: Option<String>) -> Self {
        Self {
            slot,
            calendar_account,
            provider_event_id: None,
            finalized_at: Utc::now(),
            cancelled_at: None,
        }
    }

    pub fn is_pushed(&self) -> bool {
        self.provider_event_id.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Email-only invitee who has not signed up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remindee {
    pub email: String,
    /// Ids of outbound reminder tasks scheduled for this remindee
    #[serde(default)]
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub responded: Toggle,
}

/// Scheduling poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub schedule: PollSchedule,
    pub duration_minutes: i64,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub responses: Responses,
    #[serde(default)]
    pub scheduled_event: Option<ScheduledEvent>,
    #[serde(default)]
    pub remindees: Vec<Remindee>,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Create a validated poll with a fresh id.
    pub fn new(
        owner_id: impl Into<String>,
        name: impl Into<String>,
        schedule: PollSchedule,
        duration_minutes: i64,
    ) -> Result<Self> {
        let poll = Self {
            id: Uuid::now_v7().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            schedule,
            duration_minutes,
            notifications_enabled: false,
            responses: Responses::default(),
            scheduled_event: None,
            remindees: Vec::new(),
            created_at: Utc::now(),
        };
        poll.validate()?;
        Ok(poll)
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_minutes <= 0 {
            return Err(SchejError::InvalidInput(format!(
                "poll duration must be positive, got {} minutes",
                self.duration_minutes
            )));
        }
        if self.name.trim().is_empty() {
            return Err(SchejError::InvalidInput("poll name must not be empty".into()));
        }
        self.schedule.validate()
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes)
    }

    pub fn is_finalized(&self) -> bool {
        self.scheduled_event.is_some()
    }

    /// Copy without responses, for list views.
    pub fn without_responses(mut self) -> Self {
        self.responses.clear();
        self
    }

    /// Flag the remindee with `email` as responded. Returns whether one matched.
    pub fn mark_remindee_responded(&mut self, email: &str) -> bool {
        let mut matched = false;
        for remindee in &mut self.remindees {
            if remindee.email.eq_ignore_ascii_case(email) {
                remindee.responded = Toggle::On;
                matched = true;
            }
        }
        matched
    }
}

/// Polls a user owns and polls they have responded to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPolls {
    pub owned: Vec<Poll>,
    pub joined: Vec<Poll>,
}
