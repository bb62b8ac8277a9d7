use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{calendar_key, CalendarEntry, TextEntry};
use crate::store::{Collection, Store, StoreError};

/// Stored envelope: the entry plus the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn with_timestamp(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }

    pub fn age_minutes(&self) -> i64 {
        self.age().num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    pub fn is_stale_after(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// Typed access to the store's collections.
///
/// Text and calendar entries are wrapped in [`CachedData`]; metadata values
/// are stored bare.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn Store>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    async fn load<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<CachedData<T>>, StoreError> {
        match self.store.get(collection, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        cached: &CachedData<T>,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(cached)?;
        self.store.put(collection, key, value).await
    }

    async fn scan<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<(String, CachedData<T>)>, StoreError> {
        let mut out = Vec::new();
        for (key, value) in self.store.scan(collection).await? {
            match serde_json::from_value(value) {
                Ok(cached) => out.push((key, cached)),
                Err(e) => debug!(collection = %collection, key = %key, error = %e, "Skipping unreadable entry"),
            }
        }
        Ok(out)
    }

    // ===== Texts =====

    pub async fn load_text(&self, reference: &str) -> Result<Option<CachedData<TextEntry>>, StoreError> {
        self.load(Collection::Texts, reference).await
    }

    pub async fn save_text(&self, cached: &CachedData<TextEntry>) -> Result<(), StoreError> {
        self.save(Collection::Texts, &cached.data.reference, cached).await
    }

    pub async fn delete_text(&self, reference: &str) -> Result<(), StoreError> {
        self.store.delete(Collection::Texts, reference).await
    }

    pub async fn has_text(&self, reference: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(Collection::Texts, reference).await?.is_some())
    }

    pub async fn scan_texts(&self) -> Result<Vec<(String, CachedData<TextEntry>)>, StoreError> {
        self.scan(Collection::Texts).await
    }

    // ===== Calendar =====

    pub async fn load_calendar(
        &self,
        path: &str,
        date: NaiveDate,
    ) -> Result<Option<CachedData<CalendarEntry>>, StoreError> {
        self.load(Collection::Calendar, &calendar_key(path, date)).await
    }

    pub async fn save_calendar(&self, cached: &CachedData<CalendarEntry>) -> Result<(), StoreError> {
        self.save(Collection::Calendar, &cached.data.key(), cached).await
    }

    pub async fn delete_calendar(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(Collection::Calendar, key).await
    }

    pub async fn scan_calendar(&self) -> Result<Vec<(String, CachedData<CalendarEntry>)>, StoreError> {
        self.scan(Collection::Calendar).await
    }

    // ===== Metadata =====

    pub async fn get_meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(Collection::Meta, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.store
            .put(Collection::Meta, key, serde_json::to_value(value)?)
            .await
    }

    // ===== Maintenance =====

    /// Remove everything, metadata included.
    pub async fn reset(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            self.store.clear(collection).await?;
        }
        Ok(())
    }

    pub async fn summary(&self) -> Result<CacheSummary, StoreError> {
        let texts = self.scan_texts().await?;
        let calendar = self.scan_calendar().await?;

        Ok(CacheSummary {
            texts: texts.len(),
            calendar_entries: calendar.len(),
            texts_updated: newest_age(&texts),
            calendar_updated: newest_age(&calendar),
        })
    }
}

fn newest_age<T>(entries: &[(String, CachedData<T>)]) -> Option<String> {
    entries
        .iter()
        .max_by_key(|(_, cached)| cached.cached_at)
        .map(|(_, cached)| cached.age_display())
}

#[derive(Debug, Default)]
pub struct CacheSummary {
    pub texts: usize,
    pub calendar_entries: usize,
    pub texts_updated: Option<String>,
    pub calendar_updated: Option<String>,
}

impl CacheSummary {
    /// Calendar age when any calendar entry exists, else the text age
    pub fn last_updated(&self) -> String {
        [&self.calendar_updated, &self.texts_updated]
            .into_iter()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
