//! CalDAV provider implementation (iCloud and other standard servers)
//!
//! Calendar ids are collection hrefs as returned by discovery. The id
//! `primary` resolves to the first calendar collection under the user's
//! calendar home, found through the principal and home-set PROPFINDs.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use schej_core::{CalendarProvider, CalendarSource, EventDraft};
use schej_domain::constants::PRIMARY_CALENDAR_ID;
use schej_domain::{
    AccountCredentials, BasicCredentials, FetchError, Interval, ProviderKind, TimeWindow,
};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::http::HttpClient;
use crate::integrations::calendar::caldav::{
    calendar_home_set_propfind, calendar_list_propfind, calendar_query, parse_calendar_data,
    parse_multistatus, principal_propfind, to_ics_event, DavResponse,
};
use crate::integrations::calendar::errors::{ensure_success, fetch_error_for_transport};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// Calendar collection found during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavCalendar {
    pub href: String,
    pub name: Option<String>,
}

/// CalDAV adapter using HTTP basic authentication
pub struct CalDavProvider {
    http: HttpClient,
    primary: RwLock<HashMap<String, Url>>,
}

impl CalDavProvider {
    pub fn new(http: HttpClient) -> Self {
        Self { http, primary: RwLock::new(HashMap::new()) }
    }

    /// All calendar collections visible to the account.
    pub async fn list_calendars(
        &self,
        credentials: &BasicCredentials,
    ) -> Result<Vec<DavCalendar>, FetchError> {
        let root = parse_url(&credentials.server_url)?;

        let principal = self
            .propfind(credentials, &root, "0", principal_propfind())
            .await?
            .into_iter()
            .find_map(|r| r.principal_href)
            .ok_or_else(|| FetchError::Malformed("server did not report a principal".into()))?;
        let principal = join(&root, &principal)?;

        let home = self
            .propfind(credentials, &principal, "0", calendar_home_set_propfind())
            .await?
            .into_iter()
            .find_map(|r| r.home_set_href)
            .ok_or_else(|| FetchError::Malformed("principal has no calendar home".into()))?;
        let home = join(&principal, &home)?;

        let calendars: Vec<DavCalendar> = self
            .propfind(credentials, &home, "1", calendar_list_propfind())
            .await?
            .into_iter()
            .filter(|r| r.is_calendar)
            .map(|r| DavCalendar { href: r.href, name: r.display_name })
            .collect();

        debug!(server = %root, calendars = calendars.len(), "CalDAV discovery finished");
        Ok(calendars)
    }

    async fn calendar_url(
        &self,
        credentials: &BasicCredentials,
        calendar_id: &str,
    ) -> Result<Url, FetchError> {
        let root = parse_url(&credentials.server_url)?;
        if calendar_id != PRIMARY_CALENDAR_ID {
            return join(&root, &collection_path(calendar_id));
        }

        let key = format!("{}|{}", credentials.server_url, credentials.username);
        if let Some(url) = self.primary.read().await.get(&key) {
            return Ok(url.clone());
        }

        let first = self
            .list_calendars(credentials)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed("account has no calendars".into()))?;
        let url = join(&root, &collection_path(&first.href))?;

        info!(server = %root, calendar = %url, "resolved primary CalDAV calendar");
        self.primary.write().await.insert(key, url.clone());
        Ok(url)
    }

    async fn propfind(
        &self,
        credentials: &BasicCredentials,
        url: &Url,
        depth: &'static str,
        body: &'static str,
    ) -> Result<Vec<DavResponse>, FetchError> {
        let request = self
            .dav_request(dav_method(b"PROPFIND")?, url.clone(), credentials)
            .header("Depth", depth)
            .header(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE))
            .body(body);
        self.multistatus(request).await
    }

    async fn multistatus(&self, request: RequestBuilder) -> Result<Vec<DavResponse>, FetchError> {
        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;
        let response = ensure_success(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(format!("Failed to read CalDAV response: {e}")))?;
        parse_multistatus(&body)
    }

    fn dav_request(&self, method: Method, url: Url, credentials: &BasicCredentials) -> RequestBuilder {
        self.http.request(method, url).basic_auth(&credentials.username, Some(&credentials.password))
    }
}

#[async_trait]
impl CalendarProvider for CalDavProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CalDav
    }

    async fn fetch_events(
        &self,
        source: &CalendarSource,
        window: TimeWindow,
    ) -> Result<Vec<Interval>, FetchError> {
        let credentials = basic_credentials(source)?;
        let url = self.calendar_url(credentials, &source.id.calendar).await?;

        let request = self
            .dav_request(dav_method(b"REPORT")?, url, credentials)
            .header("Depth", "1")
            .header(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE))
            .body(calendar_query(window));

        let mut intervals = Vec::new();
        for response in self.multistatus(request).await? {
            if let Some(data) = response.calendar_data {
                intervals.extend(parse_calendar_data(
                    &data,
                    &source.id,
                    source.utc_offset,
                    credentials.timed_only,
                )?);
            }
        }

        // Recurring masters can start before the window.
        intervals.retain(|i| {
            window.overlaps(i.start, i.end)
                || (i.start == i.end && window.start <= i.start && i.start < window.end)
        });
        Ok(intervals)
    }

    async fn create_event(
        &self,
        source: &CalendarSource,
        draft: &EventDraft,
    ) -> Result<String, FetchError> {
        let credentials = basic_credentials(source)?;
        let collection = self.calendar_url(credentials, &source.id.calendar).await?;
        let uid = Uuid::new_v4().to_string();
        let url = join(&collection, &format!("{uid}.ics"))?;

        let request = self
            .dav_request(Method::PUT, url, credentials)
            .header("If-None-Match", "*")
            .header(CONTENT_TYPE, HeaderValue::from_static(ICS_CONTENT_TYPE))
            .body(to_ics_event(&uid, draft));

        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;
        ensure_success(response).await?;
        Ok(uid)
    }

    async fn delete_event(
        &self,
        source: &CalendarSource,
        provider_event_id: &str,
    ) -> Result<(), FetchError> {
        let credentials = basic_credentials(source)?;
        let collection = self.calendar_url(credentials, &source.id.calendar).await?;
        let url = join(&collection, &format!("{}.ics", urlencoding::encode(provider_event_id)))?;

        let request = self.dav_request(Method::DELETE, url, credentials);
        let response = self.http.send(request).await.map_err(fetch_error_for_transport)?;
        if response.status().as_u16() == 404 {
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }
}

fn basic_credentials(source: &CalendarSource) -> Result<&BasicCredentials, FetchError> {
    match &source.credentials {
        AccountCredentials::Basic(credentials) => Ok(credentials),
        AccountCredentials::OAuth(_) => Err(FetchError::Malformed(format!(
            "source {} has no CalDAV credentials",
            source.id
        ))),
    }
}

fn dav_method(name: &'static [u8]) -> Result<Method, FetchError> {
    Method::from_bytes(name)
        .map_err(|e| FetchError::Malformed(format!("invalid WebDAV method: {e}")))
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|e| FetchError::Malformed(format!("invalid CalDAV url {raw:?}: {e}")))
}

fn join(base: &Url, href: &str) -> Result<Url, FetchError> {
    base.join(href).map_err(|e| FetchError::Malformed(format!("invalid href {href:?}: {e}")))
}

/// Collections must end in `/` so that object names join beneath them.
fn collection_path(href: &str) -> String {
    if href.ends_with('/') {
        href.to_string()
    } else {
        format!("{href}/")
    }
}
