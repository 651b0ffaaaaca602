//! Calendar provider integrations
//!
//! Adapters for the provider families accounts can link:
//! - Google Calendar (OAuth bearer tokens, REST)
//! - CalDAV servers such as iCloud (basic auth, WebDAV REPORT)
//!
//! Plus the Google token refresher used by the aggregation token guard.

pub mod caldav;
pub mod errors;
pub mod oauth;
pub mod providers;

pub use oauth::GoogleTokenRefresher;
pub use providers::{CalDavProvider, GoogleCalendarProvider};
