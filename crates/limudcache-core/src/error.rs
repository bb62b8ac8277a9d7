use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Failures surfaced by the content read paths.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Offline and no cached calendar entry for {path} on {date}")]
    OfflineNoCachedData { path: String, date: String },

    #[error("Offline and no cached text for {0}")]
    OfflineNoCachedText(String),

    #[error("Remote calendar has no item titled {title:?} on {date}")]
    RemoteDataMismatch { title: String, date: String },

    #[error("Both Hebrew and English fetches failed for {reference}: {he}; {en}")]
    BothLanguagesFailed {
        reference: String,
        he: ApiError,
        en: ApiError,
    },

    #[error("Unknown study path: {0}")]
    UnknownPath(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Remote error: {0}")]
    Remote(#[from] ApiError),
}

impl FetchError {
    /// Whether the failure came from being offline with nothing cached.
    pub fn is_offline(&self) -> bool {
        matches!(
            self,
            FetchError::OfflineNoCachedData { .. } | FetchError::OfflineNoCachedText(_)
        )
    }
}
