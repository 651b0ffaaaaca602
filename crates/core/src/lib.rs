//! # Schej Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Calendar aggregation across providers and accounts
//! - Availability resolution against scheduling polls
//! - Poll finalization and calendar push-back
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `schej-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod availability;
pub mod calendar;
pub mod poll;
pub mod scheduling;
pub mod user;
pub mod utils;

// Re-export specific items to avoid ambiguity
pub use availability::{AllDayFilter, AvailabilityService, ResolveOptions, Resolution, SubmitResponse};
pub use calendar::{
    Aggregation, AggregationSettings, CalendarProvider, CalendarSource, EventAggregator, EventDraft,
    ProviderSet, RefreshScope, TokenGuard, TokenRefresher,
};
pub use poll::ports::PollRepository;
pub use poll::{NewPoll, PollService};
pub use scheduling::SchedulingService;
pub use user::ports::UserRepository;
