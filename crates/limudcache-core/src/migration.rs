//! One-time import of the legacy single-file cache.
//!
//! Earlier versions kept everything in one JSON blob keyed
//! `path -> date -> entry`. Each distinct reference found there is written to
//! the text collection once; the blob itself is never modified. Which day each
//! reference belonged to is kept under [`LEGACY_DAYS_KEY`] so the retention
//! sweep can still tell which migrated texts an unfinished day needs.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, CachedData};
use crate::models::{calendar_key, Passage, TextEntry};

/// Metadata key set once the legacy blob has been processed.
pub const MIGRATION_COMPLETE_KEY: &str = "migration_complete";

/// Metadata key holding the legacy day -> references mapping.
pub const LEGACY_DAYS_KEY: &str = "legacy_days";

/// Calendar key (`path/date`) -> references studied that day.
pub type LegacyDays = BTreeMap<String, Vec<String>>;

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    #[serde(rename = "ref", alias = "reference", default)]
    reference: Option<String>,
    #[serde(alias = "text", default)]
    passages: Vec<Passage>,
    #[serde(rename = "chapterBreaks", default)]
    chapter_breaks: Option<Vec<usize>>,
    #[serde(rename = "fetchedAt", alias = "timestamp", default)]
    fetched_at: Option<DateTime<Utc>>,
}

/// Paths and records stay raw so one bad record cannot spoil the rest.
type LegacyBlob = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub already_complete: bool,
    /// Distinct references with passages found in the blob.
    pub found: usize,
    pub migrated: usize,
    pub skipped_existing: usize,
    /// Records that could not be parsed; skipped, not retried.
    pub malformed: usize,
    pub failed: usize,
}

pub struct MigrationRunner {
    cache: CacheManager,
    legacy_path: PathBuf,
}

impl MigrationRunner {
    pub fn new(cache: CacheManager, legacy_path: PathBuf) -> Self {
        Self { cache, legacy_path }
    }

    /// Run the import if it has not completed before. Never fails; problems
    /// are logged and reflected in the report.
    pub async fn run(&self) -> MigrationReport {
        match self.cache.get_meta::<bool>(MIGRATION_COMPLETE_KEY).await {
            Ok(Some(true)) => {
                debug!("Legacy migration already complete");
                return MigrationReport {
                    already_complete: true,
                    ..Default::default()
                };
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not read migration flag, running migration"),
        }

        let mut report = MigrationReport::default();
        if let Some(blob) = self.read_blob().await {
            self.import(blob, &mut report).await;
        }

        if report.failed > 0 {
            warn!(failed = report.failed, "Legacy migration incomplete, will retry next start");
        } else if let Err(e) = self.cache.set_meta(MIGRATION_COMPLETE_KEY, &true).await {
            warn!(error = %e, "Failed to record migration completion");
        }

        info!(
            found = report.found,
            migrated = report.migrated,
            skipped = report.skipped_existing,
            malformed = report.malformed,
            failed = report.failed,
            "Legacy migration finished"
        );
        report
    }

    async fn read_blob(&self) -> Option<LegacyBlob> {
        let contents = match tokio::fs::read_to_string(&self.legacy_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.legacy_path.display(), "No legacy cache to migrate");
                return None;
            }
            Err(e) => {
                warn!(path = %self.legacy_path.display(), error = %e, "Unreadable legacy cache");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(path = %self.legacy_path.display(), error = %e, "Malformed legacy cache");
                None
            }
        }
    }

    async fn import(&self, blob: LegacyBlob, report: &mut MigrationReport) {
        let mut seen = HashSet::new();
        let mut days = LegacyDays::new();

        for (path, raw_days) in blob {
            let by_date: BTreeMap<String, Value> = match serde_json::from_value(raw_days) {
                Ok(by_date) => by_date,
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping malformed legacy path");
                    report.malformed += 1;
                    continue;
                }
            };
            for (date, raw) in by_date {
                let entry: LegacyEntry = match serde_json::from_value(raw) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(path = %path, date = %date, error = %e, "Skipping malformed legacy record");
                        report.malformed += 1;
                        continue;
                    }
                };
                let Some(reference) = entry.reference.clone().filter(|r| !r.is_empty()) else {
                    continue;
                };
                if entry.passages.is_empty() {
                    continue;
                }
                match date.parse::<NaiveDate>() {
                    Ok(day) => days
                        .entry(calendar_key(&path, day))
                        .or_default()
                        .push(reference.clone()),
                    Err(e) => debug!(path = %path, date = %date, error = %e, "Legacy record has no usable date"),
                }
                if !seen.insert(reference.clone()) {
                    continue;
                }
                report.found += 1;
                self.import_text(reference, entry, report).await;
            }
        }

        if days.is_empty() {
            return;
        }
        if let Err(e) = self.cache.set_meta(LEGACY_DAYS_KEY, &days).await {
            warn!(error = %e, "Failed to record legacy day references");
            report.failed += 1;
        }
    }

    async fn import_text(&self, reference: String, entry: LegacyEntry, report: &mut MigrationReport) {
        match self.cache.has_text(&reference).await {
            Ok(true) => {
                report.skipped_existing += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(reference = %reference, error = %e, "Could not check existing text");
                report.failed += 1;
                return;
            }
        }

        let fetched_at = entry.fetched_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let text = into_text_entry(reference.clone(), entry);
        match self.cache.save_text(&CachedData::with_timestamp(text, fetched_at)).await {
            Ok(()) => report.migrated += 1,
            Err(e) => {
                warn!(reference = %reference, error = %e, "Failed to migrate text");
                report.failed += 1;
            }
        }
    }
}

/// Legacy entries carry no language flags; they are derived on read.
fn into_text_entry(reference: String, entry: LegacyEntry) -> TextEntry {
    let chapter_breaks = entry.chapter_breaks.unwrap_or_else(|| {
        entry
            .passages
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, p)| p.first_in_chapter)
            .map(|(i, _)| i)
            .collect()
    });
    TextEntry {
        reference,
        passages: entry.passages,
        chapter_breaks,
        languages: None,
    }
}
