//! Application context - dependency injection container

use std::sync::Arc;

use chrono::Duration;
use schej_core::{
    AggregationSettings, AvailabilityService, CalendarProvider, EventAggregator, PollRepository,
    PollService, ProviderSet, SchedulingService, TokenGuard, TokenRefresher, UserRepository,
};
use schej_domain::{Config, Result};
use schej_infra::config as config_loader;
use schej_infra::{
    CalDavProvider, DbManager, GoogleCalendarProvider, GoogleTokenRefresher, HttpClient,
    SqlitePollRepository, SqliteUserRepository,
};
use tracing::info;

use crate::utils::logging::init_tracing;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub users: Arc<dyn UserRepository>,
    pub polls: Arc<dyn PollRepository>,
    pub providers: ProviderSet,
    pub tokens: Arc<TokenGuard>,
    pub aggregator: Arc<EventAggregator>,
    pub availability: Arc<AvailabilityService>,
    pub scheduling: Arc<SchedulingService>,
    pub poll_service: Arc<PollService>,
}

impl AppContext {
    /// Load configuration from the environment or a config file, install
    /// logging, and build the context.
    pub async fn new() -> Result<Self> {
        let config = config_loader::load()?;
        init_tracing(&config.logging);
        Self::new_with_config(config).await
    }

    /// Build the context from an explicit configuration.
    ///
    /// Opens the database, applies migrations and wires every adapter. Does
    /// not touch the global tracing subscriber.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        config_loader::validate(&config)?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        let http = HttpClient::from_config(&config.http)?;

        let users: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(Arc::clone(&db)));
        let polls: Arc<dyn PollRepository> = Arc::new(SqlitePollRepository::new(Arc::clone(&db)));

        let google: Arc<dyn CalendarProvider> =
            Arc::new(GoogleCalendarProvider::from_config(http.clone(), &config.google));
        let caldav: Arc<dyn CalendarProvider> = Arc::new(CalDavProvider::new(http.clone()));
        let providers = ProviderSet::new().with(google).with(caldav);

        let refresher: Arc<dyn TokenRefresher> =
            Arc::new(GoogleTokenRefresher::new(http, config.google.clone()));
        let tokens = Arc::new(TokenGuard::new(
            refresher,
            Arc::clone(&users),
            Duration::seconds(config.aggregation.refresh_margin_secs),
        ));

        let aggregator = Arc::new(EventAggregator::new(
            providers.clone(),
            Arc::clone(&tokens),
            AggregationSettings::from(&config.aggregation),
        ));
        let availability = Arc::new(AvailabilityService::new(
            Arc::clone(&users),
            Arc::clone(&polls),
            Arc::clone(&aggregator),
        ));
        let scheduling = Arc::new(SchedulingService::new(
            Arc::clone(&users),
            Arc::clone(&polls),
            providers.clone(),
            Arc::clone(&tokens),
        ));
        let poll_service = Arc::new(PollService::new(Arc::clone(&polls)));

        info!(
            database = %db.path().display(),
            providers = ?providers,
            max_concurrent_fetches = config.aggregation.max_concurrent_fetches,
            "application context ready"
        );

        Ok(Self {
            config,
            db,
            users,
            polls,
            providers,
            tokens,
            aggregator,
            availability,
            scheduling,
            poll_service,
        })
    }

    /// Verify the database is reachable.
    pub fn health_check(&self) -> Result<()> {
        self.db.health_check()
    }

    /// Flush the database before exit.
    pub fn shutdown(&self) -> Result<()> {
        info!("shutting down application context");
        self.db.close()
    }
}
