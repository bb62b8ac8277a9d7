//! Durable key-value storage with independent collections.
//!
//! The `Store` trait knows nothing about the network or about the shape of
//! the entries it holds; typed access lives in [`crate::cache::CacheManager`].
//!
//! Backends:
//! - `FileStore`: one JSON file per key under a cache directory
//! - `MemoryStore`: in-process maps, for tests and throwaway sessions

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Logical collections in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Text entries keyed by content reference.
    Texts,
    /// Calendar entries keyed by `path/date`.
    Calendar,
    /// Process bookkeeping.
    Meta,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Texts, Collection::Calendar, Collection::Meta];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Texts => "texts",
            Collection::Calendar => "calendar",
            Collection::Meta => "meta",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Asynchronous key-oriented storage.
///
/// Failures are surfaced to the caller and never retried here. There are no
/// cross-collection transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, collection: Collection, key: &str, entry: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError>;

    async fn scan(&self, collection: Collection) -> Result<Vec<(String, Value)>, StoreError>;

    async fn clear(&self, collection: Collection) -> Result<(), StoreError>;
}
