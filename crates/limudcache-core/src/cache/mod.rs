//! Typed caching layer over the persistent store.
//!
//! Text and calendar entries are stored with the time they were fetched so
//! readers can decide whether they are stale. Staleness windows are chosen by
//! the caller (one day for calendar entries, seven for texts).

pub mod manager;

pub use manager::{CacheManager, CacheSummary, CachedData};
