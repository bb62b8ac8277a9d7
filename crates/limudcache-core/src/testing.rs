//! Test doubles for the network seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::api::{ApiError, CalendarItem, ContentSource};
use crate::cache::CacheManager;
use crate::models::{Bilingual, Language, SectionedText};
use crate::reachability::Reachability;
use crate::store::{Collection, MemoryStore, Store, StoreError};

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Chapters of the given sizes with passages tagged `"{tag} {chapter}:{n}"`.
pub(crate) fn sectioned(start: u32, sizes: &[usize], tag: &str) -> SectionedText {
    SectionedText {
        start_chapter: start,
        chapters: sizes
            .iter()
            .enumerate()
            .map(|(c, size)| {
                (1..=*size)
                    .map(|n| format!("{} {}:{}", tag, start as usize + c, n))
                    .collect()
            })
            .collect(),
    }
}

pub(crate) fn calendar_item(title: &str, display: &str, reference: &str) -> CalendarItem {
    CalendarItem {
        title: Bilingual::new(title, title),
        display_value: Bilingual::new(display, display),
        reference: Some(reference.to_string()),
    }
}

/// In-memory content provider. Anything not registered answers like a
/// provider that has never heard of it.
#[derive(Default)]
pub(crate) struct FakeSource {
    calendars: Mutex<HashMap<NaiveDate, Vec<CalendarItem>>>,
    texts: Mutex<HashMap<(String, Language), SectionedText>>,
    calendar_calls: AtomicUsize,
    text_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calendar(self, date: NaiveDate, items: Vec<CalendarItem>) -> Self {
        self.set_calendar(date, items);
        self
    }

    pub fn with_text(self, reference: &str, language: Language, text: SectionedText) -> Self {
        self.set_text(reference, language, text);
        self
    }

    pub fn set_calendar(&self, date: NaiveDate, items: Vec<CalendarItem>) {
        self.calendars.lock().unwrap().insert(date, items);
    }

    pub fn set_text(&self, reference: &str, language: Language, text: SectionedText) {
        self.texts
            .lock()
            .unwrap()
            .insert((reference.to_string(), language), text);
    }

    pub fn calendar_calls(&self) -> usize {
        self.calendar_calls.load(Ordering::SeqCst)
    }

    pub fn text_calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calendar_calls() + self.text_calls()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_calendar(&self, date: NaiveDate) -> Result<Vec<CalendarItem>, ApiError> {
        self.calendar_calls.fetch_add(1, Ordering::SeqCst);
        self.calendars
            .lock()
            .unwrap()
            .get(&date)
            .cloned()
            .ok_or_else(|| ApiError::ServerError(format!("no calendar for {}", date)))
    }

    async fn fetch_text(&self, reference: &str, language: Language) -> Result<SectionedText, ApiError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.texts
            .lock()
            .unwrap()
            .get(&(reference.to_string(), language))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("{} ({})", reference, language)))
    }
}

pub(crate) struct FakeProber {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

impl FakeProber {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reachability for FakeProber {
    async fn is_reachable(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}

/// Memory store that counts writes per collection.
#[derive(Default)]
pub(crate) struct CountingStore {
    inner: MemoryStore,
    puts: Mutex<HashMap<Collection, usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn puts(&self, collection: Collection) -> usize {
        self.puts
            .lock()
            .unwrap()
            .get(&collection)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: Collection, key: &str, entry: Value) -> Result<(), StoreError> {
        *self.puts.lock().unwrap().entry(collection).or_insert(0) += 1;
        self.inner.put(collection, key, entry).await
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn scan(&self, collection: Collection) -> Result<Vec<(String, Value)>, StoreError> {
        self.inner.scan(collection).await
    }

    async fn clear(&self, collection: Collection) -> Result<(), StoreError> {
        self.inner.clear(collection).await
    }
}

/// Wait for a spawned best-effort text write to land.
pub(crate) async fn wait_for_text(cache: &CacheManager, reference: &str) -> bool {
    for _ in 0..100 {
        if cache.has_text(reference).await.unwrap_or(false) {
            return true;
        }
        tokio::task::yield_now().await;
    }
    false
}
