use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::Aggregator;
use crate::api::ApiState;
use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::parser::ScraperRegistry;
use crate::registry::SourceRegistry;
use crate::scheduler::{SchedulerConfig, SchedulerHandle};
use crate::store::{SqliteStore, Store};

/// Everything a command needs, built from one [`Config`].
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub registry: Arc<SourceRegistry>,
    pub store: Arc<dyn Store>,
    pub aggregator: Arc<Aggregator>,
}

impl AppContext {
    /// Load the configuration and open the on-disk store.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(config_path.as_deref())?;
        let db_path = config.database_path()?;
        tracing::debug!(path = %db_path.display(), "Opening store");

        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&db_path)?);
        let mut ctx = Self::with_store(config, store)?;
        ctx.config_path = config_path;
        Ok(ctx)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        Self::with_scrapers(config, store, ScraperRegistry::new())
    }

    /// Build with scraper parsers registered by the embedding program.
    ///
    /// No scrapers ship with the crate, so `type = "scraper"` sources only
    /// load through this constructor.
    pub fn with_scrapers(
        config: Config,
        store: Arc<dyn Store>,
        scrapers: ScraperRegistry,
    ) -> Result<Self> {
        let registry = Arc::new(SourceRegistry::load(&config.sources, scrapers)?);

        let timeout = Duration::from_secs(config.fetcher.timeout_secs.max(1));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            timeout,
            config.fetcher.user_agent.as_deref(),
        )?);

        let aggregator = Arc::new(Aggregator::with_workers(
            registry.clone(),
            fetcher,
            store.clone(),
            timeout,
            config.fetcher.workers,
        ));

        Ok(Self {
            config,
            config_path: None,
            registry,
            store,
            aggregator,
        })
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig> {
        Ok(SchedulerConfig::from_settings(&self.config.scheduler)?)
    }

    pub fn api_state(&self, scheduler: SchedulerHandle) -> ApiState {
        ApiState {
            registry: self.registry.clone(),
            store: self.store.clone(),
            scheduler,
        }
    }

    /// Re-read the configuration file and swap in its sources.
    ///
    /// Other sections only take effect on restart.
    pub fn reload_sources(&self) -> Result<()> {
        let config = Config::load(self.config_path.as_deref())?;
        self.registry.reload(&config.sources)?;
        Ok(())
    }
}
