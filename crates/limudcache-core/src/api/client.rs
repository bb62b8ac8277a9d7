//! HTTP client for the remote calendar and text endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{CalendarItem, CalendarResponse, TextResponse};
use super::{ApiError, ContentSource};
use crate::models::{Language, SectionedText};

// ============================================================================
// Constants
// ============================================================================

/// Default content provider.
pub const DEFAULT_API_BASE_URL: &str = "https://www.sefaria.org";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Client for the content API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.client.get(url.clone()).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Fetch the named calendar items for a date.
    pub async fn fetch_calendar(&self, date: NaiveDate) -> Result<Vec<CalendarItem>, ApiError> {
        let mut url = self.endpoint(&["api", "calendars"])?;
        url.query_pairs_mut()
            .append_pair("day", &date.day().to_string())
            .append_pair("month", &date.month().to_string())
            .append_pair("year", &date.year().to_string());

        let response: CalendarResponse = self.get(url).await?;
        debug!(date = %date, items = response.calendar_items.len(), "Calendar fetched");
        Ok(response.calendar_items)
    }

    /// Fetch one language of a reference's text.
    pub async fn fetch_text(&self, reference: &str, language: Language) -> Result<SectionedText, ApiError> {
        let mut url = self.endpoint(&["api", "v3", "texts", reference])?;
        url.query_pairs_mut()
            .append_pair("version", language.version_selector());

        let response: TextResponse = self.get(url).await?;
        let text = response.into_sectioned(reference)?;
        debug!(
            reference = reference,
            language = %language,
            chapters = text.chapters.len(),
            "Text fetched"
        );
        Ok(text)
    }
}

#[async_trait]
impl ContentSource for ApiClient {
    async fn fetch_calendar(&self, date: NaiveDate) -> Result<Vec<CalendarItem>, ApiError> {
        ApiClient::fetch_calendar(self, date).await
    }

    async fn fetch_text(&self, reference: &str, language: Language) -> Result<SectionedText, ApiError> {
        ApiClient::fetch_text(self, reference, language).await
    }
}
