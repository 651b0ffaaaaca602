//! Domain types and models

pub mod interval;
pub mod poll;
pub mod toggle;
pub mod user;

pub use interval::{Interval, Slot, SourceId, TimeWindow, UtcOffset};
pub use poll::{
    coalesce_slots, DateRange, ParticipantId, ParticipantProfile, Poll, PollSchedule, Remindee,
    Response, ResponseOrigin, Responses, ScheduledEvent, UserPolls,
};
pub use toggle::Toggle;
pub use user::{
    AccountCredentials, BasicCredentials, CalendarAccount, OAuthTokens, ProviderKind, SubCalendar,
    TokenOrigin, User,
};
