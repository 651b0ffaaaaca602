//! CalDAV wire formats
//!
//! Request bodies, the WebDAV multistatus reader, and iCalendar
//! normalization used by the CalDAV provider.

pub mod ics;
pub mod multistatus;
pub mod report;

pub use ics::{parse_calendar_data, to_ics_event};
pub use multistatus::{parse_multistatus, DavResponse};
pub use report::{calendar_home_set_propfind, calendar_list_propfind, calendar_query, principal_propfind};
