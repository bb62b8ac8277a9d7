//! limudcache core library.
//!
//! The local-first content cache and sync engine behind a daily study
//! tracker: a persistent store, the remote API client, local schedule
//! computation, local-first reads, background sync, the legacy migration and
//! the connectivity state machine. Hosts (the CLI, or any UI) wire these
//! together and consume the read API and the sync update channel.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod fetcher;
pub mod migration;
pub mod models;
pub mod progress;
pub mod reachability;
pub mod schedule;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, ContentSource};
pub use cache::{CacheManager, CacheSummary, CachedData};
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, ConnectivityStatus};
pub use error::FetchError;
pub use fetcher::{ContentFetcher, DayContent, LoadedText};
pub use migration::{MigrationReport, MigrationRunner};
pub use progress::{DayProgress, ProgressLog, ProgressView};
pub use reachability::{spawn_network_watch, HttpProber, Reachability};
pub use schedule::ScheduleResolver;
pub use store::{Collection, FileStore, MemoryStore, Store, StoreError};
pub use sync::{SyncHandle, SyncOutcome, SyncScheduler, SyncState, SyncTrigger, SyncUpdate};
