//! CalDAV request bodies
//!
//! The calendar query asks for VEVENTs inside a VCALENDAR whose time range
//! overlaps the window, returning only SUMMARY, UID, DTSTART, DTEND and
//! DURATION. Servers are matched against this exact shape, so it is built
//! from a fixed template.

use chrono::{DateTime, Utc};
use schej_domain::TimeWindow;

/// CalDAV UTC timestamp, e.g. `20240721T000000Z`
pub fn caldav_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// `calendar-query` REPORT body for `window`.
pub fn calendar_query(window: TimeWindow) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-data>
      <C:comp name="VCALENDAR">
        <C:comp name="VEVENT">
          <C:prop name="SUMMARY"/>
          <C:prop name="UID"/>
          <C:prop name="DTSTART"/>
          <C:prop name="DTEND"/>
          <C:prop name="DURATION"/>
        </C:comp>
      </C:comp>
    </C:calendar-data>
  </D:prop>
  <C:filter>
    <C:comp-filter name="VCALENDAR">
      <C:comp-filter name="VEVENT">
        <C:time-range start="{start}" end="{end}"/>
      </C:comp-filter>
    </C:comp-filter>
  </C:filter>
</C:calendar-query>
"#,
        start = caldav_timestamp(window.start),
        end = caldav_timestamp(window.end),
    )
}

/// PROPFIND body asking for the current user principal.
pub fn principal_propfind() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:current-user-principal/>
  </D:prop>
</D:propfind>
"#
}

/// PROPFIND body asking a principal for its calendar home.
pub fn calendar_home_set_propfind() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-home-set/>
  </D:prop>
</D:propfind>
"#
}

/// PROPFIND body listing the collections under a calendar home.
pub fn calendar_list_propfind() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:displayname/>
  </D:prop>
</D:propfind>
"#
}
