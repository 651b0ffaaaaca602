//! Shared test helpers for `schej-core` integration tests.
//!
//! In-memory repositories, scripted providers and a counting token
//! refresher, plus a [`Harness`] wiring them into the core services.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use schej_core::{
    AggregationSettings, AvailabilityService, CalendarProvider, CalendarSource, EventAggregator,
    EventDraft, PollRepository, PollService, ProviderSet, SchedulingService, TokenGuard,
    TokenRefresher, UserRepository,
};
use schej_domain::{
    AccountCredentials, BasicCredentials, CalendarAccount, FetchError, Interval, OAuthTokens, Poll,
    ProviderKind, RefreshError, Response, Result as DomainResult, ScheduledEvent, SchejError,
    SourceId, TimeWindow, TokenOrigin, User,
};

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, day, hour, 0, 0).unwrap()
}

pub fn tokens(access: &str, expires_at: DateTime<Utc>) -> OAuthTokens {
    OAuthTokens {
        access_token: access.to_string(),
        access_token_expires_at: expires_at,
        refresh_token: format!("{access}-refresh"),
    }
}

/// Google account whose token is valid for another hour.
pub fn google_account(email: &str) -> CalendarAccount {
    CalendarAccount::new(
        email,
        AccountCredentials::OAuth(tokens(&format!("{email}-token"), Utc::now() + Duration::hours(1))),
    )
}

/// Google account whose token has already expired.
pub fn expired_google_account(email: &str) -> CalendarAccount {
    CalendarAccount::new(
        email,
        AccountCredentials::OAuth(tokens(&format!("{email}-token"), Utc::now() - Duration::minutes(5))),
    )
}

pub fn caldav_account(email: &str) -> CalendarAccount {
    CalendarAccount::new(
        email,
        AccountCredentials::Basic(BasicCredentials {
            server_url: "https://caldav.example.com".into(),
            username: email.into(),
            password: "app-password".into(),
            timed_only: false,
        }),
    )
}

pub fn user_with(id: &str, accounts: Vec<CalendarAccount>) -> User {
    let mut user = User::new(id, accounts.first().map_or("nobody@example.com", |a| a.email.as_str()));
    user.token_origin = Some(TokenOrigin::Web);
    for account in accounts {
        user.upsert_account(account);
    }
    user
}

pub fn timed(account: &str, calendar: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Interval {
    Interval::timed(SourceId::new(account, calendar), start, end).unwrap()
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, User>>,
    fail_token_updates: AtomicBool,
    pub token_updates: Mutex<Vec<(String, String, OAuthTokens)>>,
}

impl InMemoryUserRepository {
    pub fn fail_token_updates(&self) {
        self.fail_token_updates.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }

    pub fn stored(&self, id: &str) -> Option<User> {
        self.users.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn save(&self, user: &User) -> DomainResult<()> {
        self.insert(user.clone());
        Ok(())
    }

    async fn update_account_tokens(
        &self,
        user_id: &str,
        account_email: &str,
        tokens: &OAuthTokens,
    ) -> DomainResult<()> {
        if self.fail_token_updates.load(Ordering::SeqCst) {
            return Err(SchejError::Database("database is locked".into()));
        }
        let mut users = self.users.lock().unwrap();
        let account = users
            .get_mut(user_id)
            .and_then(|u| u.account_mut(account_email))
            .ok_or_else(|| SchejError::NotFound(format!("account {account_email}")))?;
        account.credentials = AccountCredentials::OAuth(tokens.clone());
        self.token_updates.lock().unwrap().push((
            user_id.to_string(),
            account_email.to_string(),
            tokens.clone(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPollRepository {
    polls: Mutex<HashMap<String, Poll>>,
    update_failures: AtomicUsize,
}

impl InMemoryPollRepository {
    /// Make the next `update_scheduled_event` call fail with a database error.
    pub fn fail_next_update(&self) {
        self.update_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn insert(&self, poll: Poll) {
        self.polls.lock().unwrap().insert(poll.id.clone(), poll);
    }

    pub fn stored(&self, id: &str) -> Poll {
        self.polls.lock().unwrap().get(id).cloned().expect("poll stored")
    }

    fn with_poll<T>(&self, id: &str, f: impl FnOnce(&mut Poll) -> T) -> DomainResult<T> {
        let mut polls = self.polls.lock().unwrap();
        let poll = polls.get_mut(id).ok_or_else(|| SchejError::NotFound(format!("poll {id}")))?;
        Ok(f(poll))
    }
}

#[async_trait]
impl PollRepository for InMemoryPollRepository {
    async fn get_by_id(&self, id: &str) -> DomainResult<Option<Poll>> {
        Ok(self.polls.lock().unwrap().get(id).cloned())
    }

    async fn create(&self, poll: &Poll) -> DomainResult<()> {
        self.insert(poll.clone());
        Ok(())
    }

    async fn upsert_response(&self, poll_id: &str, response: &Response) -> DomainResult<()> {
        self.with_poll(poll_id, |poll| {
            poll.responses.upsert(response.clone());
        })
    }

    async fn mark_remindee_responded(&self, poll_id: &str, email: &str) -> DomainResult<bool> {
        self.with_poll(poll_id, |poll| poll.mark_remindee_responded(email))
    }

    async fn record_scheduled_event(
        &self,
        poll_id: &str,
        event: &ScheduledEvent,
    ) -> DomainResult<bool> {
        self.with_poll(poll_id, |poll| {
            if poll.scheduled_event.is_some() {
                return false;
            }
            poll.scheduled_event = Some(event.clone());
            true
        })
    }

    async fn update_scheduled_event(
        &self,
        poll_id: &str,
        event: &ScheduledEvent,
    ) -> DomainResult<()> {
        let pending = self.update_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.update_failures.store(pending - 1, Ordering::SeqCst);
            return Err(SchejError::Database("disk I/O error".into()));
        }
        self.with_poll(poll_id, |poll| poll.scheduled_event = Some(event.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> DomainResult<Vec<Poll>> {
        Ok(self
            .polls
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.owner_id == user_id || p.responses.iter().any(|r| r.participant.as_str() == user_id))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Scripted provider. Events, one-shot failures and delays are keyed by
/// source; access tokens listed in `rejected_tokens` answer `Unauthorized`.
pub struct MockProvider {
    kind: ProviderKind,
    events: Mutex<HashMap<SourceId, Vec<Interval>>>,
    failures: Mutex<HashMap<SourceId, VecDeque<FetchError>>>,
    delays: Mutex<HashMap<SourceId, StdDuration>>,
    rejected_tokens: Mutex<HashSet<String>>,
    reject_everything: Mutex<bool>,
    create_failures: Mutex<VecDeque<FetchError>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pub fetch_calls: Mutex<Vec<(SourceId, Option<String>)>>,
    pub created: Mutex<Vec<(SourceId, EventDraft)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            events: Mutex::default(),
            failures: Mutex::default(),
            delays: Mutex::default(),
            rejected_tokens: Mutex::default(),
            reject_everything: Mutex::new(false),
            create_failures: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            fetch_calls: Mutex::default(),
            created: Mutex::default(),
            deleted: Mutex::default(),
        }
    }

    pub fn with_events(&self, source: SourceId, events: Vec<Interval>) {
        self.events.lock().unwrap().insert(source, events);
    }

    pub fn fail_next(&self, source: SourceId, error: FetchError) {
        self.failures.lock().unwrap().entry(source).or_default().push_back(error);
    }

    pub fn delay(&self, source: SourceId, delay: StdDuration) {
        self.delays.lock().unwrap().insert(source, delay);
    }

    pub fn reject_token(&self, token: &str) {
        self.rejected_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn reject_everything(&self) {
        *self.reject_everything.lock().unwrap() = true;
    }

    pub fn fail_next_create(&self, error: FetchError) {
        self.create_failures.lock().unwrap().push_back(error);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    async fn fetch_scripted(
        &self,
        source: &CalendarSource,
        window: TimeWindow,
    ) -> Result<Vec<Interval>, FetchError> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((source.id.clone(), source.credentials.oauth().map(|t| t.access_token.clone())));

        let delay = self.delays.lock().unwrap().get(&source.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_token(source)?;
        let failure = self.failures.lock().unwrap().get_mut(&source.id).and_then(VecDeque::pop_front);
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(self
            .events
            .lock()
            .unwrap()
            .get(&source.id)
            .map(|events| {
                events.iter().filter(|e| e.overlaps(window.start, window.end)).cloned().collect()
            })
            .unwrap_or_default())
    }

    /// Highest number of `fetch_events` calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn check_token(&self, source: &CalendarSource) -> Result<(), FetchError> {
        let token = source.credentials.oauth().map(|t| t.access_token.clone());
        let rejected = *self.reject_everything.lock().unwrap()
            || token.as_ref().is_some_and(|t| self.rejected_tokens.lock().unwrap().contains(t));
        if rejected {
            return Err(FetchError::Unauthorized("401 invalid credentials".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch_events(
        &self,
        source: &CalendarSource,
        window: TimeWindow,
    ) -> Result<Vec<Interval>, FetchError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.fetch_scripted(source, window).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn create_event(
        &self,
        source: &CalendarSource,
        draft: &EventDraft,
    ) -> Result<String, FetchError> {
        self.check_token(source)?;
        if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut created = self.created.lock().unwrap();
        created.push((source.id.clone(), draft.clone()));
        Ok(format!("evt-{}", created.len()))
    }

    async fn delete_event(
        &self,
        source: &CalendarSource,
        provider_event_id: &str,
    ) -> Result<(), FetchError> {
        self.check_token(source)?;
        self.deleted.lock().unwrap().push(provider_event_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Token refresher
// ============================================================================

/// Counts refresh calls and mints `refreshed-N` tokens valid for an hour.
pub struct MockRefresher {
    calls: AtomicUsize,
    delay: StdDuration,
    failure: Mutex<Option<RefreshError>>,
    pub origins: Mutex<Vec<Option<TokenOrigin>>>,
}

impl MockRefresher {
    pub fn new(delay: StdDuration) -> Self {
        Self { calls: AtomicUsize::new(0), delay, failure: Mutex::new(None), origins: Mutex::default() }
    }

    pub fn failing_with(self, error: RefreshError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for MockRefresher {
    async fn refresh(
        &self,
        tokens: &OAuthTokens,
        origin: Option<TokenOrigin>,
    ) -> Result<OAuthTokens, RefreshError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.origins.lock().unwrap().push(origin);
        tokio::time::sleep(self.delay).await;

        let failure = self.failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(OAuthTokens {
            access_token: format!("refreshed-{call}"),
            access_token_expires_at: Utc::now() + Duration::hours(1),
            refresh_token: tokens.refresh_token.clone(),
        })
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub users: Arc<InMemoryUserRepository>,
    pub polls: Arc<InMemoryPollRepository>,
    pub google: Arc<MockProvider>,
    pub caldav: Arc<MockProvider>,
    pub refresher: Arc<MockRefresher>,
    pub tokens: Arc<TokenGuard>,
    pub aggregator: Arc<EventAggregator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockRefresher::new(StdDuration::from_millis(20)), AggregationSettings::default())
    }

    pub fn with(refresher: MockRefresher, settings: AggregationSettings) -> Self {
        let users = Arc::new(InMemoryUserRepository::default());
        let polls = Arc::new(InMemoryPollRepository::default());
        let google = Arc::new(MockProvider::new(ProviderKind::Google));
        let caldav = Arc::new(MockProvider::new(ProviderKind::CalDav));
        let refresher = Arc::new(refresher);

        let providers = ProviderSet::new()
            .with(Arc::clone(&google) as Arc<dyn CalendarProvider>)
            .with(Arc::clone(&caldav) as Arc<dyn CalendarProvider>);
        let tokens = Arc::new(TokenGuard::new(
            Arc::clone(&refresher) as Arc<dyn TokenRefresher>,
            Arc::clone(&users) as Arc<dyn UserRepository>,
            Duration::seconds(60),
        ));
        let aggregator = Arc::new(EventAggregator::new(providers, Arc::clone(&tokens), settings));

        Self { users, polls, google, caldav, refresher, tokens, aggregator }
    }

    pub fn providers(&self) -> ProviderSet {
        ProviderSet::new()
            .with(Arc::clone(&self.google) as Arc<dyn CalendarProvider>)
            .with(Arc::clone(&self.caldav) as Arc<dyn CalendarProvider>)
    }

    pub fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(
            Arc::clone(&self.users) as Arc<dyn UserRepository>,
            Arc::clone(&self.polls) as Arc<dyn PollRepository>,
            Arc::clone(&self.aggregator),
        )
    }

    pub fn scheduling(&self) -> SchedulingService {
        SchedulingService::new(
            Arc::clone(&self.users) as Arc<dyn UserRepository>,
            Arc::clone(&self.polls) as Arc<dyn PollRepository>,
            self.providers(),
            Arc::clone(&self.tokens),
        )
    }

    pub fn poll_service(&self) -> PollService {
        PollService::new(Arc::clone(&self.polls) as Arc<dyn PollRepository>)
    }
}
