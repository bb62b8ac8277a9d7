//! Local-first content reads.
//!
//! Every read goes store first, then (when the stored copy is missing or
//! stale and the network is reachable) the remote API, writing results back.
//! Stale entries are still served whenever the network cannot do better.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ContentSource};
use crate::cache::{CacheManager, CachedData};
use crate::error::FetchError;
use crate::models::{
    calendar_key, Bilingual, CalendarEntry, Language, LanguagesLoaded, PathSource, StudyPath,
    TextEntry,
};
use crate::reachability::Reachability;
use crate::schedule::ScheduleResolver;
use crate::store::StoreError;

/// Calendar entries older than this are re-fetched when reachable.
pub fn calendar_max_age() -> Duration {
    Duration::days(1)
}

/// Text entries older than this are re-fetched when reachable.
pub fn text_max_age() -> Duration {
    Duration::days(7)
}

/// A text plus which of its languages actually loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedText {
    pub entry: TextEntry,
    pub languages_loaded: LanguagesLoaded,
}

impl LoadedText {
    fn new(entry: TextEntry) -> Self {
        let languages_loaded = entry.languages_loaded();
        Self {
            entry,
            languages_loaded,
        }
    }
}

/// A calendar entry with its merged text, counts reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayContent {
    pub entry: CalendarEntry,
    pub text: LoadedText,
}

#[derive(Clone)]
pub struct ContentFetcher {
    cache: CacheManager,
    source: Arc<dyn ContentSource>,
    reachability: Arc<dyn Reachability>,
    resolver: ScheduleResolver,
}

impl ContentFetcher {
    pub fn new(
        cache: CacheManager,
        source: Arc<dyn ContentSource>,
        reachability: Arc<dyn Reachability>,
    ) -> Self {
        Self {
            cache,
            source,
            reachability,
            resolver: ScheduleResolver::new(),
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn resolver(&self) -> &ScheduleResolver {
        &self.resolver
    }

    pub async fn is_reachable(&self) -> bool {
        self.reachability.is_reachable().await
    }

    // ===== Calendar =====

    pub async fn get_calendar_entry(
        &self,
        date: NaiveDate,
        path: &StudyPath,
    ) -> Result<CalendarEntry, FetchError> {
        if let Some(entry) = self.computed_entry(date, path) {
            return Ok(entry);
        }

        let key = calendar_key(&path.id, date);
        let cached = miss_if_corrupt(self.cache.load_calendar(&path.id, date).await, &key)?;
        if let Some(cached) = &cached {
            if !cached.is_stale_after(calendar_max_age()) {
                debug!(key = %key, age = %cached.age_display(), "Calendar cache hit");
                return Ok(cached.data.clone());
            }
        }

        if !self.reachability.is_reachable().await {
            return match cached {
                Some(cached) => {
                    debug!(key = %key, age = %cached.age_display(), "Offline, serving stale calendar entry");
                    Ok(cached.data)
                }
                None => Err(FetchError::OfflineNoCachedData {
                    path: path.id.clone(),
                    date: date.to_string(),
                }),
            };
        }

        let previous = cached.as_ref().map(|c| &c.data);
        match self.fetch_calendar_entry(date, path, previous).await {
            Ok(entry) => Ok(entry),
            Err(e @ FetchError::RemoteDataMismatch { .. }) => Err(e),
            Err(e) => match cached {
                Some(cached) => {
                    warn!(key = %key, error = %e, "Calendar fetch failed, serving stale entry");
                    Ok(cached.data)
                }
                None => Err(e),
            },
        }
    }

    /// Re-fetch a remote path's entry regardless of its age.
    pub async fn refresh_calendar_entry(
        &self,
        date: NaiveDate,
        path: &StudyPath,
    ) -> Result<CalendarEntry, FetchError> {
        if let Some(entry) = self.computed_entry(date, path) {
            return Ok(entry);
        }
        let key = calendar_key(&path.id, date);
        let previous = self.cache.load_calendar(&path.id, date).await.unwrap_or_else(|e| {
            debug!(key = %key, error = %e, "Ignoring unreadable calendar entry");
            None
        });
        self.fetch_calendar_entry(date, path, previous.as_ref().map(|c| &c.data))
            .await
    }

    fn computed_entry(&self, date: NaiveDate, path: &StudyPath) -> Option<CalendarEntry> {
        let day = self.resolver.resolve(date, path)?;
        Some(CalendarEntry {
            path: path.id.clone(),
            date,
            display: day.display,
            references: day.references,
            count: 0,
            localized: day.localized,
        })
    }

    async fn fetch_calendar_entry(
        &self,
        date: NaiveDate,
        path: &StudyPath,
        previous: Option<&CalendarEntry>,
    ) -> Result<CalendarEntry, FetchError> {
        let PathSource::Remote { calendar_title } = &path.source else {
            return Err(FetchError::UnknownPath(path.id.clone()));
        };

        let items = self.source.fetch_calendar(date).await?;
        let matching: Vec<_> = items
            .into_iter()
            .filter(|item| item.title.en == *calendar_title)
            .collect();
        if matching.is_empty() {
            return Err(FetchError::RemoteDataMismatch {
                title: calendar_title.clone(),
                date: date.to_string(),
            });
        }

        let references: Vec<String> = matching
            .iter()
            .filter_map(|item| item.reference.clone())
            .filter(|r| !r.is_empty())
            .collect();
        if references.is_empty() {
            warn!(title = %calendar_title, date = %date, "Calendar items carry no references");
            return Err(FetchError::RemoteDataMismatch {
                title: calendar_title.clone(),
                date: date.to_string(),
            });
        }
        if references.len() < matching.len() {
            warn!(title = %calendar_title, date = %date, "Dropping calendar items without a reference");
        }
        let display = Bilingual::new(
            join_display(matching.iter().map(|item| item.display_value.en.as_str())),
            join_display(matching.iter().map(|item| item.display_value.he.as_str())),
        );
        let count = previous
            .filter(|p| p.references == references)
            .map(|p| p.count)
            .unwrap_or(0);

        let entry = CalendarEntry {
            path: path.id.clone(),
            date,
            display,
            references,
            count,
            localized: self.resolver.localized_date(date),
        };

        if let Err(e) = self.cache.save_calendar(&CachedData::new(entry.clone())).await {
            warn!(key = %entry.key(), error = %e, "Failed to cache calendar entry");
        }
        debug!(key = %entry.key(), references = entry.references.len(), "Calendar entry fetched");
        Ok(entry)
    }

    // ===== Texts =====

    pub async fn get_text(&self, reference: &str) -> Result<LoadedText, FetchError> {
        let cached = miss_if_corrupt(self.cache.load_text(reference).await, reference)?;
        if let Some(cached) = &cached {
            if !cached.is_stale_after(text_max_age()) {
                debug!(reference = reference, age = %cached.age_display(), "Text cache hit");
                return Ok(LoadedText::new(cached.data.clone()));
            }
        }

        if !self.reachability.is_reachable().await {
            return match cached {
                Some(cached) => {
                    debug!(reference = reference, age = %cached.age_display(), "Offline, serving stale text");
                    Ok(LoadedText::new(cached.data))
                }
                None => Err(FetchError::OfflineNoCachedText(reference.to_string())),
            };
        }

        let (he, en) = tokio::join!(
            self.source.fetch_text(reference, Language::He),
            self.source.fetch_text(reference, Language::En),
        );

        let (he, en) = match (he, en) {
            (Err(he), Err(en)) => {
                if let Some(cached) = cached {
                    warn!(reference = reference, he = %he, en = %en, "Both languages failed, serving stale text");
                    return Ok(LoadedText::new(cached.data));
                }
                return Err(FetchError::BothLanguagesFailed {
                    reference: reference.to_string(),
                    he,
                    en,
                });
            }
            (he, en) => (
                partial(reference, Language::He, he),
                partial(reference, Language::En, en),
            ),
        };

        let entry = TextEntry::assemble(reference, he.as_ref(), en.as_ref())
            .unwrap_or_else(|| TextEntry::empty(reference));
        debug!(reference = reference, passages = entry.len(), "Text fetched");

        self.save_text_in_background(entry.clone());
        Ok(LoadedText::new(entry))
    }

    /// Write without making the caller wait; failures are only logged.
    fn save_text_in_background(&self, entry: TextEntry) {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let reference = entry.reference.clone();
            if let Err(e) = cache.save_text(&CachedData::new(entry)).await {
                warn!(reference = %reference, error = %e, "Failed to cache text");
            }
        });
    }

    /// Concatenate several references in order.
    ///
    /// A reference that cannot be read contributes no passages and counts as
    /// having neither language.
    pub async fn get_merged_text(&self, references: &[String]) -> LoadedText {
        let results = join_all(references.iter().map(|r| self.get_text(r))).await;

        let mut passages = Vec::new();
        let mut breaks = Vec::new();
        // Nothing merged means nothing loaded
        let mut languages = if references.is_empty() {
            LanguagesLoaded::none()
        } else {
            LanguagesLoaded::both()
        };

        for (reference, result) in references.iter().zip(results) {
            let loaded = match result {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Reference failed, merging without it");
                    languages = languages.and(LanguagesLoaded::none());
                    continue;
                }
            };
            languages = languages.and(loaded.languages_loaded);

            if loaded.entry.is_empty() {
                continue;
            }
            let offset = passages.len();
            if offset > 0 {
                breaks.push(offset);
            }
            breaks.extend(loaded.entry.chapter_breaks.iter().map(|b| b + offset));
            passages.extend(loaded.entry.passages);
        }

        let entry = TextEntry {
            reference: references.join("; "),
            passages,
            chapter_breaks: breaks,
            languages: Some(languages),
        };
        LoadedText {
            entry,
            languages_loaded: languages,
        }
    }

    // ===== Reconciliation =====

    /// Read a day's calendar entry and text together, repairing a stored
    /// passage count that disagrees with the text.
    pub async fn get_day(&self, date: NaiveDate, path: &StudyPath) -> Result<DayContent, FetchError> {
        let mut entry = self.get_calendar_entry(date, path).await?;
        let text = self.get_merged_text(&entry.references).await;

        let count = text.entry.len();
        if count > 0 && entry.count != count {
            if !path.is_local() {
                self.repair_count(&entry, count).await;
            }
            entry.count = count;
        }

        Ok(DayContent { entry, text })
    }

    async fn repair_count(&self, entry: &CalendarEntry, count: usize) {
        let key = entry.key();
        let stored = match self.cache.load_calendar(&entry.path, entry.date).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return,
            Err(e) => {
                warn!(key = %key, error = %e, "Could not read calendar entry for count repair");
                return;
            }
        };
        if stored.data.references != entry.references {
            return;
        }

        info!(key = %key, from = stored.data.count, to = count, "Repairing passage count");
        let mut data = stored.data;
        data.count = count;
        let repaired = CachedData::with_timestamp(data, stored.cached_at);
        if let Err(e) = self.cache.save_calendar(&repaired).await {
            warn!(key = %key, error = %e, "Failed to write repaired count");
        }
    }
}

/// Treat an undecodable entry as absent so it gets re-fetched.
fn miss_if_corrupt<T>(
    result: Result<Option<T>, StoreError>,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match result {
        Err(StoreError::Corrupt(e)) => {
            warn!(key = key, error = %e, "Ignoring corrupt cache entry");
            Ok(None)
        }
        other => other,
    }
}

fn partial<T>(reference: &str, language: Language, result: Result<T, ApiError>) -> Option<T> {
    result
        .map_err(|e| warn!(reference = reference, language = %language, error = %e, "Language fetch failed"))
        .ok()
}

fn join_display<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.filter(|p| !p.is_empty()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocalSchedule, Passage};
    use crate::store::{MemoryStore, Store};
    use crate::testing::{calendar_item, date, sectioned, wait_for_text, FakeProber, FakeSource};
    use chrono::Utc;

    struct Harness {
        fetcher: ContentFetcher,
        source: Arc<FakeSource>,
        prober: Arc<FakeProber>,
        store: Arc<MemoryStore>,
    }

    fn harness(source: FakeSource, reachable: bool) -> Harness {
        let source = Arc::new(source);
        let prober = Arc::new(FakeProber::new(reachable));
        let store = Arc::new(MemoryStore::new());
        let fetcher = ContentFetcher::new(
            CacheManager::new(store.clone()),
            source.clone(),
            prober.clone(),
        );
        Harness {
            fetcher,
            source,
            prober,
            store,
        }
    }

    fn mishnah() -> StudyPath {
        StudyPath::remote("mishnah", "Daily Mishnah")
    }

    fn text_entry(reference: &str, sizes: &[usize]) -> TextEntry {
        let he = sectioned(1, sizes, "he");
        let en = sectioned(1, sizes, "en");
        TextEntry::assemble(reference, Some(&he), Some(&en)).unwrap()
    }

    async fn cache_text(h: &Harness, entry: TextEntry, days_old: i64) {
        let cached = CachedData::with_timestamp(entry, Utc::now() - Duration::days(days_old));
        h.fetcher.cache().save_text(&cached).await.unwrap();
    }

    async fn cache_calendar(h: &Harness, entry: CalendarEntry, hours_old: i64) {
        let cached = CachedData::with_timestamp(entry, Utc::now() - Duration::hours(hours_old));
        h.fetcher.cache().save_calendar(&cached).await.unwrap();
    }

    fn calendar_entry(references: &[&str], count: usize) -> CalendarEntry {
        CalendarEntry {
            path: "mishnah".into(),
            date: date(2026, 10, 18),
            display: Bilingual::new("cached", "cached"),
            references: references.iter().map(|r| r.to_string()).collect(),
            count,
            localized: Default::default(),
        }
    }

    // ----- texts -----

    #[tokio::test]
    async fn test_fresh_text_makes_no_network_calls() {
        let h = harness(FakeSource::new(), true);
        cache_text(&h, text_entry("Berakhot 2", &[4]), 1).await;

        let loaded = h.fetcher.get_text("Berakhot 2").await.unwrap();
        assert_eq!(loaded.entry.len(), 4);
        assert_eq!(loaded.languages_loaded, LanguagesLoaded::both());
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.prober.probes(), 0);
    }

    #[tokio::test]
    async fn test_offline_without_cache_fails() {
        let h = harness(FakeSource::new(), false);
        let err = h.fetcher.get_text("Berakhot 2").await.unwrap_err();
        assert!(matches!(err, FetchError::OfflineNoCachedText(ref r) if r == "Berakhot 2"));
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_offline_serves_stale_text() {
        let h = harness(FakeSource::new(), false);
        cache_text(&h, text_entry("Berakhot 2", &[3]), 30).await;

        let loaded = h.fetcher.get_text("Berakhot 2").await.unwrap();
        assert_eq!(loaded.entry.len(), 3);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_text_is_refetched_when_reachable() {
        let source = FakeSource::new()
            .with_text("Berakhot 2", Language::He, sectioned(1, &[6], "he"))
            .with_text("Berakhot 2", Language::En, sectioned(1, &[6], "en"));
        let h = harness(source, true);
        cache_text(&h, text_entry("Berakhot 2", &[3]), 8).await;

        let loaded = h.fetcher.get_text("Berakhot 2").await.unwrap();
        assert_eq!(loaded.entry.len(), 6);
        assert_eq!(h.source.text_calls(), 2);
    }

    #[tokio::test]
    async fn test_hebrew_only_success() {
        let source =
            FakeSource::new().with_text("Sotah 5", Language::He, sectioned(1, &[7], "he"));
        let h = harness(source, true);

        let loaded = h.fetcher.get_text("Sotah 5").await.unwrap();
        assert_eq!(loaded.entry.len(), 7);
        assert_eq!(loaded.languages_loaded, LanguagesLoaded { he: true, en: false });
        assert!(loaded.entry.passages.iter().all(|p| p.en.is_none()));

        assert!(wait_for_text(h.fetcher.cache(), "Sotah 5").await);
        let stored = h.fetcher.cache().load_text("Sotah 5").await.unwrap().unwrap();
        assert_eq!(stored.data.languages, Some(LanguagesLoaded { he: true, en: false }));
    }

    #[tokio::test]
    async fn test_english_structure_used_when_hebrew_fails() {
        let source = FakeSource::new().with_text("Genesis 1-2", Language::En, sectioned(1, &[31, 25], "en"));
        let h = harness(source, true);

        let loaded = h.fetcher.get_text("Genesis 1-2").await.unwrap();
        assert_eq!(loaded.entry.len(), 56);
        assert_eq!(loaded.entry.chapter_breaks, vec![31]);
        assert_eq!(loaded.languages_loaded, LanguagesLoaded { he: false, en: true });
    }

    #[tokio::test]
    async fn test_both_languages_failing_is_fatal_and_not_cached() {
        let h = harness(FakeSource::new(), true);

        let err = h.fetcher.get_text("Nowhere 1").await.unwrap_err();
        assert!(matches!(err, FetchError::BothLanguagesFailed { .. }));
        assert_eq!(h.source.text_calls(), 2);

        tokio::task::yield_now().await;
        assert!(h.fetcher.cache().load_text("Nowhere 1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_both_languages_failing_falls_back_to_stale() {
        let h = harness(FakeSource::new(), true);
        cache_text(&h, text_entry("Berakhot 2", &[2]), 10).await;

        let loaded = h.fetcher.get_text("Berakhot 2").await.unwrap();
        assert_eq!(loaded.entry.len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_entry_languages_are_derived() {
        let h = harness(FakeSource::new(), false);
        let entry = TextEntry {
            reference: "Avot 1".into(),
            passages: vec![Passage {
                he: "משה קבל".into(),
                en: None,
                chapter: 1,
                first_in_chapter: true,
            }],
            chapter_breaks: vec![],
            languages: None,
        };
        cache_text(&h, entry, 0).await;

        let loaded = h.fetcher.get_text("Avot 1").await.unwrap();
        assert_eq!(loaded.languages_loaded, LanguagesLoaded { he: true, en: false });
    }

    #[tokio::test]
    async fn test_corrupt_text_entry_is_refetched() {
        let source = FakeSource::new().with_text("Avot 1", Language::He, sectioned(1, &[2], "he"));
        let h = harness(source, true);
        h.store
            .put(crate::store::Collection::Texts, "Avot 1", serde_json::json!({"bogus": true}))
            .await
            .unwrap();

        let loaded = h.fetcher.get_text("Avot 1").await.unwrap();
        assert_eq!(loaded.entry.len(), 2);
    }

    // ----- merged texts -----

    #[tokio::test]
    async fn test_merge_with_failed_middle_reference() {
        let source = FakeSource::new()
            .with_text("A 1", Language::He, sectioned(1, &[4], "he"))
            .with_text("A 1", Language::En, sectioned(1, &[4], "en"))
            .with_text("C 1", Language::He, sectioned(1, &[5], "he"))
            .with_text("C 1", Language::En, sectioned(1, &[5], "en"));
        let h = harness(source, true);
        let references = vec!["A 1".to_string(), "B 1".to_string(), "C 1".to_string()];

        let merged = h.fetcher.get_merged_text(&references).await;
        assert_eq!(merged.entry.len(), 9);
        assert_eq!(merged.entry.chapter_breaks, vec![4]);
        assert_eq!(merged.languages_loaded, LanguagesLoaded::none());
        assert_eq!(merged.entry.passages[4].he, "he 1:1");
    }

    #[tokio::test]
    async fn test_merge_language_flags_use_and() {
        let source = FakeSource::new()
            .with_text("A 1", Language::He, sectioned(1, &[2], "he"))
            .with_text("A 1", Language::En, sectioned(1, &[2], "en"))
            .with_text("B 1", Language::He, sectioned(1, &[2], "he"))
            .with_text("C 1", Language::He, sectioned(1, &[2], "he"))
            .with_text("C 1", Language::En, sectioned(1, &[2], "en"));
        let h = harness(source, true);
        let references = vec!["A 1".to_string(), "B 1".to_string(), "C 1".to_string()];

        let merged = h.fetcher.get_merged_text(&references).await;
        assert_eq!(merged.entry.len(), 6);
        assert_eq!(merged.languages_loaded, LanguagesLoaded { he: true, en: false });
        assert_eq!(merged.entry.chapter_breaks, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_merge_keeps_internal_chapter_breaks() {
        let source = FakeSource::new()
            .with_text("Rambam 1-3", Language::He, sectioned(1, &[23, 20, 15], "he"))
            .with_text("Rambam 4", Language::He, sectioned(4, &[10], "he"));
        let h = harness(source, true);
        let references = vec!["Rambam 1-3".to_string(), "Rambam 4".to_string()];

        let merged = h.fetcher.get_merged_text(&references).await;
        assert_eq!(merged.entry.len(), 68);
        assert_eq!(merged.entry.chapter_breaks, vec![23, 43, 58]);
        assert_eq!(merged.entry.passages[58].chapter, 4);
    }

    #[tokio::test]
    async fn test_merge_of_nothing() {
        let h = harness(FakeSource::new(), true);
        let merged = h.fetcher.get_merged_text(&[]).await;
        assert!(merged.entry.is_empty());
        assert!(merged.entry.chapter_breaks.is_empty());
        assert_eq!(merged.languages_loaded, LanguagesLoaded::none());
        assert!(!merged.languages_loaded.any());
    }

    // ----- calendar -----

    #[tokio::test]
    async fn test_local_path_needs_no_network_or_cache() {
        let h = harness(FakeSource::new(), false);
        let path = StudyPath::local("daf-yomi", LocalSchedule::DafYomi);

        let entry = h.fetcher.get_calendar_entry(date(2026, 10, 18), &path).await.unwrap();
        assert_eq!(entry.references, vec!["Bekhorot 30"]);
        assert_eq!(entry.localized.gregorian, "October 18, 2026");
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.prober.probes(), 0);
    }

    #[tokio::test]
    async fn test_fetches_and_caches_calendar_entry() {
        let source = FakeSource::new().with_calendar(
            date(2026, 10, 18),
            vec![
                calendar_item("Parashat Hashavua", "Lech-Lecha", "Genesis 12:1-17:27"),
                calendar_item("Daily Mishnah", "Avot 1:1-2", "Pirkei Avot 1:1-2"),
            ],
        );
        let h = harness(source, true);

        let entry = h.fetcher.get_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.references, vec!["Pirkei Avot 1:1-2"]);
        assert_eq!(entry.display.en, "Avot 1:1-2");
        assert_eq!(entry.count, 0);
        assert_eq!(entry.localized.hebrew_en, "7 Cheshvan 5787");

        // Second read is a cache hit
        h.fetcher.get_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(h.source.calendar_calls(), 1);
    }

    #[tokio::test]
    async fn test_multiple_matching_items_keep_response_order() {
        let source = FakeSource::new().with_calendar(
            date(2026, 10, 18),
            vec![
                calendar_item("Daily Mishnah", "Avot 1:1", "Pirkei Avot 1:1"),
                calendar_item("Daf Yomi", "Bekhorot 30", "Bekhorot 30"),
                calendar_item("Daily Mishnah", "Avot 1:2", "Pirkei Avot 1:2"),
            ],
        );
        let h = harness(source, true);

        let entry = h.fetcher.get_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.references, vec!["Pirkei Avot 1:1", "Pirkei Avot 1:2"]);
        assert_eq!(entry.display.en, "Avot 1:1, Avot 1:2");
    }

    #[tokio::test]
    async fn test_stale_calendar_served_offline() {
        let h = harness(FakeSource::new(), false);
        cache_calendar(&h, calendar_entry(&["Pirkei Avot 1:1"], 3), 48).await;

        let entry = h.fetcher.get_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.display.en, "cached");
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_offline_without_calendar_entry_fails() {
        let h = harness(FakeSource::new(), false);
        let err = h
            .fetcher
            .get_calendar_entry(date(2026, 10, 18), &mishnah())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::OfflineNoCachedData { .. }));
    }

    #[tokio::test]
    async fn test_missing_title_is_a_mismatch_even_with_stale_entry() {
        let source = FakeSource::new().with_calendar(
            date(2026, 10, 18),
            vec![calendar_item("Daf Yomi", "Bekhorot 30", "Bekhorot 30")],
        );
        let h = harness(source, true);
        cache_calendar(&h, calendar_entry(&["Pirkei Avot 1:1"], 3), 48).await;

        let err = h
            .fetcher
            .get_calendar_entry(date(2026, 10, 18), &mishnah())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RemoteDataMismatch { ref title, .. } if title == "Daily Mishnah"));
    }

    #[tokio::test]
    async fn test_matching_items_without_references_are_a_mismatch() {
        let mut item = calendar_item("Daily Mishnah", "Avot 1:1", "Pirkei Avot 1:1");
        item.reference = None;
        let source = FakeSource::new().with_calendar(date(2026, 10, 18), vec![item]);
        let h = harness(source, true);

        let err = h
            .fetcher
            .get_day(date(2026, 10, 18), &mishnah())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RemoteDataMismatch { .. }));
        assert!(h
            .fetcher
            .cache()
            .load_calendar("mishnah", date(2026, 10, 18))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_stale_calendar() {
        // No calendar registered: the fake answers with a server error
        let h = harness(FakeSource::new(), true);
        cache_calendar(&h, calendar_entry(&["Pirkei Avot 1:1"], 3), 48).await;

        let entry = h.fetcher.get_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.display.en, "cached");
        assert_eq!(h.source.calendar_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_count_when_references_unchanged() {
        let source = FakeSource::new().with_calendar(
            date(2026, 10, 18),
            vec![calendar_item("Daily Mishnah", "Avot 1:1", "Pirkei Avot 1:1")],
        );
        let h = harness(source, true);
        cache_calendar(&h, calendar_entry(&["Pirkei Avot 1:1"], 3), 0).await;

        let entry = h.fetcher.refresh_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.display.en, "Avot 1:1");
        assert_eq!(h.source.calendar_calls(), 1);

        h.source.set_calendar(
            date(2026, 10, 18),
            vec![calendar_item("Daily Mishnah", "Avot 1:3", "Pirkei Avot 1:3")],
        );
        let entry = h.fetcher.refresh_calendar_entry(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(entry.count, 0);
    }

    // ----- repair -----

    #[tokio::test]
    async fn test_get_day_repairs_count() {
        let source = FakeSource::new()
            .with_calendar(
                date(2026, 10, 18),
                vec![calendar_item("Daily Mishnah", "Avot 1:1-2", "Pirkei Avot 1:1-2")],
            )
            .with_text("Pirkei Avot 1:1-2", Language::He, sectioned(1, &[2], "he"))
            .with_text("Pirkei Avot 1:1-2", Language::En, sectioned(1, &[2], "en"));
        let h = harness(source, true);

        let day = h.fetcher.get_day(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(day.entry.count, 2);
        assert_eq!(day.text.entry.len(), 2);

        let stored = h
            .fetcher
            .cache()
            .load_calendar("mishnah", date(2026, 10, 18))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.data.count, 2);
    }

    #[tokio::test]
    async fn test_get_day_leaves_count_when_text_unavailable() {
        let h = harness(FakeSource::new(), false);
        cache_calendar(&h, calendar_entry(&["Pirkei Avot 1:1"], 3), 0).await;

        let day = h.fetcher.get_day(date(2026, 10, 18), &mishnah()).await.unwrap();
        assert_eq!(day.entry.count, 3);
        assert!(day.text.entry.is_empty());
    }
}
