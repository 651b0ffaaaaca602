//! WebDAV multistatus reader
//!
//! Namespace prefixes differ between servers (`D:`, `d:`, none), so elements
//! are matched by local name only.

use quick_xml::events::Event;
use quick_xml::Reader;
use schej_domain::FetchError;

/// One `<response>` element of a multistatus body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResponse {
    pub href: String,
    pub calendar_data: Option<String>,
    pub display_name: Option<String>,
    /// `resourcetype` contains a `calendar` element
    pub is_calendar: bool,
    pub principal_href: Option<String>,
    pub home_set_href: Option<String>,
}

/// Parse a `207 Multi-Status` body.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResponse>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut responses = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            FetchError::Malformed(format!(
                "invalid multistatus XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                let name = local_name(start.local_name().as_ref());
                if name == "response" {
                    current = Some(DavResponse::default());
                }
                mark_calendar(&stack, &name, current.as_mut());
                stack.push(name);
            }
            Event::Empty(empty) => {
                let name = local_name(empty.local_name().as_ref());
                mark_calendar(&stack, &name, current.as_mut());
            }
            Event::End(end) => {
                let name = local_name(end.local_name().as_ref());
                stack.pop();
                if name == "response" {
                    if let Some(done) = current.take() {
                        responses.push(done);
                    }
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| FetchError::Malformed(format!("invalid XML text: {e}")))?;
                record_text(&stack, &value, current.as_mut());
            }
            Event::CData(cdata) => {
                let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                record_text(&stack, &value, current.as_mut());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(responses)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn mark_calendar(stack: &[String], name: &str, current: Option<&mut DavResponse>) {
    if name == "calendar" && stack.last().is_some_and(|parent| parent == "resourcetype") {
        if let Some(response) = current {
            response.is_calendar = true;
        }
    }
}

fn record_text(stack: &[String], value: &str, current: Option<&mut DavResponse>) {
    let Some(response) = current else {
        return;
    };
    let Some(element) = stack.last() else {
        return;
    };
    let parent = stack.len().checked_sub(2).and_then(|i| stack.get(i)).map(String::as_str);

    match (element.as_str(), parent) {
        ("href", Some("response")) => response.href.push_str(value.trim()),
        ("href", Some("current-user-principal")) => {
            response.principal_href = Some(value.trim().to_string());
        }
        ("href", Some("calendar-home-set")) => {
            response.home_set_href = Some(value.trim().to_string());
        }
        ("calendar-data", _) => response.calendar_data.get_or_insert_with(String::new).push_str(value),
        ("displayname", _) => response.display_name = Some(value.to_string()),
        _ => {}
    }
}
