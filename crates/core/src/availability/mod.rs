//! Availability resolution
//!
//! Projects merged timelines onto query windows and intersects them with
//! poll parameters to produce free slots, or records self-reported
//! availability.

pub mod intersect;
pub mod service;

pub use intersect::{free_slots, project, AllDayFilter};
pub use service::{AvailabilityService, ResolveOptions, Resolution, SubmitResponse};
