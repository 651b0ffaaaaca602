//! Concurrent fetch orchestration
//!
//! One task per enabled source, bounded by a semaphore and by one deadline
//! for the whole call. Tasks never share mutable state; the merge happens
//! after every task has finished or been cancelled.

use std::sync::Arc;
use std::time::Duration;

use schej_domain::{
    AggregationConfig, FetchError, Interval, SourceError, SourceFailure, TimeWindow, User,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::merge::merge_timelines;
use super::ports::{CalendarSource, ProviderSet};
use super::registry::enabled_sources;
use super::tokens::{RefreshScope, TokenGuard};

/// Fan-out limits for [`EventAggregator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationSettings {
    pub timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl From<&AggregationConfig> for AggregationSettings {
    fn from(config: &AggregationConfig) -> Self {
        Self { timeout: config.timeout(), max_concurrent_fetches: config.max_concurrent_fetches }
    }
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self::from(&AggregationConfig::default())
    }
}

/// Merged timeline plus the sources that could not contribute to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub intervals: Vec<Interval>,
    pub errors: Vec<SourceError>,
    /// Number of sources that were queried
    pub source_count: usize,
    /// Accounts whose refreshed tokens could not be written back
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unpersisted_token_accounts: Vec<String>,
}

impl Aggregation {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }

    /// User-facing note such as "1 of 3 calendars unavailable".
    pub fn unavailable_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let noun = if self.source_count == 1 { "calendar" } else { "calendars" };
        Some(format!("{} of {} {noun} unavailable", self.errors.len(), self.source_count))
    }
}

/// Fetches every enabled source of a user and merges the results
pub struct EventAggregator {
    providers: ProviderSet,
    tokens: Arc<TokenGuard>,
    settings: AggregationSettings,
}

impl EventAggregator {
    pub fn new(providers: ProviderSet, tokens: Arc<TokenGuard>, settings: AggregationSettings) -> Self {
        Self { providers, tokens, settings }
    }

    pub fn settings(&self) -> AggregationSettings {
        self.settings
    }

    /// Aggregate all enabled calendars of `user` over `window`.
    ///
    /// Never fails as a whole: sources that error, time out or are cancelled
    /// appear in [`Aggregation::errors`] and are left out of the merge.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn aggregate(&self, user: &User, window: TimeWindow) -> Aggregation {
        let sources = enabled_sources(user);
        let source_count = sources.len();
        if sources.is_empty() {
            debug!("no enabled calendar sources");
            return Aggregation::default();
        }

        let scope = Arc::new(RefreshScope::new());
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.iter().cloned().enumerate() {
            let providers = self.providers.clone();
            let tokens = Arc::clone(&self.tokens);
            let scope = Arc::clone(&scope);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => fetch_source(&providers, &tokens, &scope, &source, window).await,
                    Err(_) => Err(FetchError::Unreachable("fetch pool closed".into()).into()),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Result<Vec<Interval>, SourceFailure>>> =
            (0..source_count).map(|_| None).collect();
        let deadline = Instant::now() + self.settings.timeout;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => outcomes[index] = Some(outcome),
                Ok(Some(Err(join_error))) => {
                    warn!(error = %join_error, "calendar fetch task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = tasks.len(), "aggregation deadline reached, cancelling fetches");
                    tasks.abort_all();
                    break;
                }
            }
        }

        let mut per_source = Vec::with_capacity(source_count);
        let mut errors = Vec::new();
        for (source, outcome) in sources.into_iter().zip(outcomes) {
            match outcome {
                Some(Ok(intervals)) => per_source.push(intervals),
                Some(Err(failure)) => {
                    warn!(source = %source.id, category = ?failure.category(), error = %failure, "calendar source failed");
                    errors.push(SourceError::new(source.id, failure));
                }
                None => errors.push(SourceError::new(
                    source.id,
                    FetchError::Unreachable("fetch did not complete before the deadline".into()),
                )),
            }
        }

        let intervals = merge_timelines(per_source);
        debug!(intervals = intervals.len(), failed = errors.len(), sources = source_count, "aggregation complete");
        let unpersisted_token_accounts = scope.unpersisted_accounts();
        if !unpersisted_token_accounts.is_empty() {
            warn!(accounts = ?unpersisted_token_accounts, "refreshed tokens not persisted");
        }
        Aggregation { intervals, errors, source_count, unpersisted_token_accounts }
    }
}

async fn fetch_source(
    providers: &ProviderSet,
    tokens: &TokenGuard,
    scope: &RefreshScope,
    source: &CalendarSource,
    window: TimeWindow,
) -> Result<Vec<Interval>, SourceFailure> {
    let provider = providers.require(source.provider())?;
    tokens
        .call_authorized(source, scope, |authorized| {
            let provider = Arc::clone(&provider);
            async move { provider.fetch_events(&authorized, window).await }
        })
        .await
}
