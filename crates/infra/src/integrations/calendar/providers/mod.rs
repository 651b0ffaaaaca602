//! Calendar provider adapters

pub mod caldav;
pub mod google;

pub use caldav::CalDavProvider;
pub use google::GoogleCalendarProvider;
