//! Poll lifecycle: creation, listing and persistence port

pub mod ports;
pub mod service;

pub use service::{NewPoll, PollService};
