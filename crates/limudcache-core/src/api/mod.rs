//! Remote content API.
//!
//! `ApiClient` talks to a Sefaria-compatible provider: a calendar endpoint
//! listing each day's named study items and a text endpoint returning one
//! language of a reference at a time. The fetcher depends only on the
//! `ContentSource` trait so it can run against fakes.

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Language, SectionedText};

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
pub use types::CalendarItem;

/// Request/response boundary to the remote calendar and text APIs.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_calendar(&self, date: NaiveDate) -> Result<Vec<CalendarItem>, ApiError>;

    async fn fetch_text(&self, reference: &str, language: Language) -> Result<SectionedText, ApiError>;
}
