//! Calendar aggregation
//!
//! Resolves which calendars of a user are enabled, fetches them concurrently
//! through provider ports, keeps OAuth tokens fresh and merges the results
//! into one deterministic timeline.

pub mod aggregator;
pub mod merge;
pub mod ports;
pub mod registry;
pub mod tokens;

pub use aggregator::{Aggregation, AggregationSettings, EventAggregator};
pub use merge::merge_timelines;
pub use ports::{CalendarProvider, CalendarSource, EventDraft, ProviderSet, TokenRefresher};
pub use registry::{enabled_sources, push_target};
pub use tokens::{RefreshScope, TokenGuard};
