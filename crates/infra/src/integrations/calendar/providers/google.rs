//! Google Calendar provider implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::Method;
use schej_core::{CalendarProvider, CalendarSource, EventDraft};
use schej_domain::{
    FetchError, GoogleConfig, Interval, OAuthTokens, ProviderKind, TimeWindow,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http::HttpClient;
use crate::integrations::calendar::errors::{ensure_success, fetch_error_for_transport};

/// Largest page Google accepts for `events.list`
const MAX_RESULTS_PER_PAGE: &str = "2500";

/// Upper bound on pages followed for one source
const MAX_PAGES: usize = 50;

/// Google Calendar v3 adapter
pub struct GoogleCalendarProvider {
    http: HttpClient,
    api_base: String,
}

impl GoogleCalendarProvider {
    pub fn new(http: HttpClient, api_base: impl Into<String>) -> Self {
        Self { http, api_base: api_base.into().trim_end_matches('/').to_string() }
    }

    pub fn from_config(http: HttpClient, config: &GoogleConfig) -> Self {
        Self::new(http, config.api_base_url.clone())
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!("{}/calendars/{}/events", self.api_base, urlencoding::encode(calendar_id))
    }

    async fn fetch_page(
        &self,
        tokens: &OAuthTokens,
        calendar_id: &str,
        window: TimeWindow,
        page_token: Option<&str>,
    ) -> Result<GoogleEventsResponse, FetchError> {
        let mut query = vec![
            ("timeMin", rfc3339(window.start)),
            ("timeMax", rfc3339(window.end)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", MAX_RESULTS_PER_PAGE.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let request = self
            .http
            .request(Method::GET, self.events_url(calendar_id))
            .bearer_auth(&tokens.access_token)
            .query(&query);

        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;
        let response = ensure_success(response).await?;

        response
            .json::<GoogleEventsResponse>()
            .await
            .map_err(|e| FetchError::Malformed(format!("Failed to parse Google response: {e}")))
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn fetch_events(
        &self,
        source: &CalendarSource,
        window: TimeWindow,
    ) -> Result<Vec<Interval>, FetchError> {
        let tokens = oauth_tokens(source)?;
        let mut intervals = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let response =
                self.fetch_page(tokens, &source.id.calendar, window, page_token.as_deref()).await?;

            for event in response.items {
                if let Some(interval) = normalize_event(event, source)? {
                    intervals.push(interval);
                }
            }

            match response.next_page_token {
                Some(token) => {
                    debug!(source = %source.id, page = page + 1, "following Google page token");
                    page_token = Some(token);
                }
                None => return Ok(intervals),
            }
        }

        warn!(source = %source.id, pages = MAX_PAGES, "Google paging limit reached");
        Ok(intervals)
    }

    async fn create_event(
        &self,
        source: &CalendarSource,
        draft: &EventDraft,
    ) -> Result<String, FetchError> {
        let tokens = oauth_tokens(source)?;
        let body = GoogleEventInsert {
            summary: &draft.title,
            description: draft.description.as_deref(),
            start: GoogleDateTimeOut { date_time: rfc3339(draft.slot.start) },
            end: GoogleDateTimeOut { date_time: rfc3339(draft.slot.end) },
            attendees: draft.attendees.iter().map(|email| GoogleAttendee { email }).collect(),
        };

        let request = self
            .http
            .request(Method::POST, self.events_url(&source.id.calendar))
            .bearer_auth(&tokens.access_token)
            .query(&[("sendUpdates", "all")])
            .json(&body);

        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;
        let response = ensure_success(response).await?;
        let created: GoogleCreatedEvent = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("Failed to parse created event: {e}")))?;

        Ok(created.id)
    }

    async fn delete_event(
        &self,
        source: &CalendarSource,
        provider_event_id: &str,
    ) -> Result<(), FetchError> {
        let tokens = oauth_tokens(source)?;
        let url = format!(
            "{}/{}",
            self.events_url(&source.id.calendar),
            urlencoding::encode(provider_event_id)
        );

        let request = self.http.request(Method::DELETE, url).bearer_auth(&tokens.access_token);
        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;

        // Already gone counts as deleted.
        if matches!(response.status().as_u16(), 404 | 410) {
            debug!(source = %source.id, provider_event_id, "event already deleted");
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }
}

fn oauth_tokens(source: &CalendarSource) -> Result<&OAuthTokens, FetchError> {
    source.credentials.oauth().ok_or_else(|| {
        FetchError::Malformed(format!("source {} has no OAuth credentials", source.id))
    })
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert one Google event. Cancelled events yield `None`.
fn normalize_event(
    event: GoogleCalendarEvent,
    source: &CalendarSource,
) -> Result<Option<Interval>, FetchError> {
    if event.status.as_deref() == Some("cancelled") {
        return Ok(None);
    }

    let interval = match (event.start, event.end) {
        (EventDateTime { date: Some(first), .. }, end) => {
            let end_day = end.date.unwrap_or(first);
            Interval::all_day(source.id.clone(), first, end_day, source.utc_offset)
        }
        (
            EventDateTime { date_time: Some(start), .. },
            EventDateTime { date_time: Some(end), .. },
        ) => Interval::timed(source.id.clone(), start, end),
        _ => {
            return Err(FetchError::Malformed(format!(
                "event {} has neither a date nor a start and end time",
                event.id
            )));
        }
    }
    .map_err(|e| FetchError::Malformed(format!("event {}: {e}", event.id)))?;

    Ok(Some(interval.with_title(event.summary).with_provider_event_id(Some(event.id))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleCalendarEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    #[serde(default)]
    start: EventDateTime,
    #[serde(default)]
    end: EventDateTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct GoogleEventInsert<'a> {
    summary: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    start: GoogleDateTimeOut,
    end: GoogleDateTimeOut,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<GoogleAttendee<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleDateTimeOut {
    date_time: String,
}

#[derive(Debug, Serialize)]
struct GoogleAttendee<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct GoogleCreatedEvent {
    id: String,
}
