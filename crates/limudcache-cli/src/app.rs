//! Engine wiring for the command-line host.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

use limudcache_core::models::StudyPath;
use limudcache_core::{
    ApiClient, CacheManager, Config, ConnectivityMonitor, ContentFetcher, FileStore, HttpProber,
    MigrationReport, MigrationRunner, ProgressLog, SyncScheduler, SyncState,
};

/// Store directory under the cache directory
const STORE_DIR: &str = "store";

pub struct App {
    pub config: Config,
    pub cache: CacheManager,
    pub fetcher: ContentFetcher,
    pub connectivity: ConnectivityMonitor,
    pub prober: Arc<HttpProber>,
    pub sync_state: SyncState,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store_dir = config.cache_dir()?.join(STORE_DIR);
        let store = FileStore::new(store_dir.clone())
            .with_context(|| format!("Failed to open store at {}", store_dir.display()))?;
        let cache = CacheManager::new(Arc::new(store));

        let connectivity = ConnectivityMonitor::new(config.offline_mode);
        let prober = Arc::new(HttpProber::new(&config.probe_url(), connectivity.clone())?);
        let client = ApiClient::new(&config.api_base_url())?;
        let fetcher = ContentFetcher::new(cache.clone(), Arc::new(client), prober.clone());

        Ok(Self {
            config,
            cache,
            fetcher,
            connectivity,
            prober,
            sync_state: SyncState::new(),
        })
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    /// The named path, or the configured active path.
    pub fn path(&self, id: Option<&str>) -> Result<&StudyPath> {
        let id = id.unwrap_or(&self.config.active_path);
        self.config
            .find_path(id)
            .ok_or_else(|| anyhow!("Unknown study path: {}", id))
    }

    pub fn open_progress(&self) -> Result<ProgressLog> {
        ProgressLog::open(self.config.progress_path()?)
    }

    pub fn scheduler(&self) -> Result<SyncScheduler> {
        let progress = self.open_progress()?;
        Ok(SyncScheduler::new(
            self.fetcher.clone(),
            &self.config,
            self.sync_state.clone(),
            Arc::new(progress),
        ))
    }

    pub async fn migrate(&self) -> Result<MigrationReport> {
        let runner = MigrationRunner::new(self.cache.clone(), self.config.legacy_blob_path()?);
        Ok(runner.run().await)
    }

    /// Migration first, then the retention sweep.
    pub async fn startup(&self, scheduler: &SyncScheduler) -> Result<()> {
        let migration = self.migrate().await?;
        let sweep = scheduler.sweep(Self::today()).await;
        info!(?migration, ?sweep, "Startup maintenance finished");
        Ok(())
    }

    /// Persist the user's offline choice and apply it.
    pub fn set_user_offline(&mut self, offline: bool) -> Result<()> {
        self.config.offline_mode = offline;
        self.config.save()?;
        self.connectivity.set_user_offline(offline);
        Ok(())
    }
}

pub fn parse_date(arg: Option<&str>) -> Result<NaiveDate> {
    match arg {
        None | Some("today") => Ok(App::today()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD", s)),
    }
}
