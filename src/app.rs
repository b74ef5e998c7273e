//! Wiring shared by the bot and the standalone notifier.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::bot::{BotHandler, TelegramClient};
use crate::calendar::SweepCalendar;
use crate::config::Config;
use crate::db::Database;
use crate::lookup::{ArcGisClient, CachedGeocoder, CachedRoutes, SweepLookup};
use crate::notify::{DailySchedule, NotificationDispatcher, RunSummary, Transport};
use crate::projector::SweepProjector;
use crate::web::WebState;

pub struct App {
    pub config: Config,
    pub db: Arc<Database>,
    pub projector: Arc<SweepProjector>,
    pub schedule: DailySchedule,
    /// ArcGIS lookups behind the configured caches, shared by the bot and
    /// the web endpoints.
    pub lookup: Arc<SweepLookup>,
}

impl App {
    /// Open the store and build the calendar. Fails on a bad calendar file
    /// or notification time rather than starting with wrong dates.
    pub fn new(config: Config) -> Result<Self> {
        let db = Database::open(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
        db.initialize().context("Failed to initialize database schema")?;
        info!("Database opened at {:?}", config.db_path);

        Self::with_database(config, db)
    }

    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let calendar = SweepCalendar::load(&config.calendar.extra_files)
            .context("Failed to build sweep calendar")?;
        let years: Vec<i32> = calendar.years().collect();
        info!(?years, posted_weeks = calendar.posted_weeks().len(), "Sweep calendar ready");

        let schedule = config.notify.schedule()?;
        let lookup = Arc::new(Self::build_lookup(&config));

        Ok(Self {
            config,
            db: Arc::new(db),
            projector: Arc::new(SweepProjector::new(Arc::new(calendar))),
            schedule,
            lookup,
        })
    }

    fn build_lookup(config: &Config) -> SweepLookup {
        let arcgis = &config.arcgis;
        let cache = &config.cache;
        let client = Arc::new(ArcGisClient::from_config(arcgis));

        let geocoder = CachedGeocoder::new(
            client.clone(),
            cache.geocode_capacity,
            Duration::from_secs(cache.geocode_ttl_secs),
        );
        let routes = CachedRoutes::new(
            client,
            cache.routes_capacity,
            Duration::from_secs(cache.routes_ttl_secs),
        );

        SweepLookup::new(Arc::new(geocoder), Arc::new(routes))
            .with_radii(arcgis.radius_ft, arcgis.fallback_radius_ft)
            .with_min_score(arcgis.min_score)
    }

    pub fn telegram(&self) -> Result<TelegramClient> {
        TelegramClient::from_config(&self.config.telegram).context("Telegram is not configured")
    }

    pub fn bot_handler(&self) -> BotHandler {
        BotHandler::new(
            Arc::clone(&self.db),
            Arc::clone(&self.projector),
            Arc::clone(&self.lookup),
        )
    }

    pub fn web_state(&self) -> WebState {
        WebState {
            lookup: Arc::clone(&self.lookup),
            projector: Arc::clone(&self.projector),
            clock: self.schedule,
        }
    }

    pub fn dispatcher(&self, transport: Arc<dyn Transport>) -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::clone(&self.db), Arc::clone(&self.projector), transport)
    }

    /// One notification pass for the jurisdiction's current date.
    pub fn run_notifications(&self, transport: Arc<dyn Transport>) -> Result<RunSummary> {
        let today = self.schedule.today();
        let summary = self
            .dispatcher(transport)
            .run(today)
            .context("Notification run failed")?;
        Ok(summary)
    }
}
