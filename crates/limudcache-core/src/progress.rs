//! Completion records and bookmarks.
//!
//! The engine only reads progress (the retention sweep must not evict days
//! the user is working through). `ProgressLog` is the file-backed record the
//! CLI writes to.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{calendar_key, parse_calendar_key};

/// Progress on one (path, date) day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayProgress {
    pub done: usize,
    pub bookmarked: bool,
}

impl DayProgress {
    /// Some passages done but not all of them. An unknown count (0) with any
    /// progress counts as unfinished.
    pub fn is_incomplete(&self, count: usize) -> bool {
        self.done > 0 && (count == 0 || self.done < count)
    }

    /// Days the retention sweep must keep.
    pub fn is_protected(&self, count: usize) -> bool {
        self.bookmarked || self.is_incomplete(count)
    }
}

/// Read access to user progress.
pub trait ProgressView: Send + Sync {
    fn day_progress(&self, path: &str, date: NaiveDate) -> DayProgress;

    /// Every day with at least one completion or a bookmark.
    fn tracked_days(&self) -> Vec<(String, NaiveDate)>;
}

/// Progress file name in cache directory
pub const PROGRESS_FILE: &str = "progress.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProgressData {
    /// Day key -> passage index -> completion time
    #[serde(default)]
    completions: BTreeMap<String, BTreeMap<usize, DateTime<Utc>>>,
    #[serde(default)]
    bookmarks: BTreeSet<String>,
}

pub struct ProgressLog {
    file: PathBuf,
    data: ProgressData,
}

impl ProgressLog {
    /// Load from disk; a missing file is an empty log.
    pub fn open(file: PathBuf) -> Result<Self> {
        let data = if file.exists() {
            let contents = std::fs::read_to_string(&file).context("Failed to read progress file")?;
            serde_json::from_str(&contents).context("Failed to parse progress file")?
        } else {
            ProgressData::default()
        };
        Ok(Self { file, data })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.file, contents).context("Failed to write progress file")?;
        Ok(())
    }

    pub fn mark_done(&mut self, path: &str, date: NaiveDate, index: usize) {
        self.data
            .completions
            .entry(calendar_key(path, date))
            .or_default()
            .entry(index)
            .or_insert_with(Utc::now);
    }

    pub fn unmark(&mut self, path: &str, date: NaiveDate, index: usize) {
        let key = calendar_key(path, date);
        if let Some(day) = self.data.completions.get_mut(&key) {
            day.remove(&index);
            if day.is_empty() {
                self.data.completions.remove(&key);
            }
        }
    }

    pub fn is_done(&self, path: &str, date: NaiveDate, index: usize) -> bool {
        self.data
            .completions
            .get(&calendar_key(path, date))
            .is_some_and(|day| day.contains_key(&index))
    }

    /// Returns whether the day is bookmarked afterwards.
    pub fn toggle_bookmark(&mut self, path: &str, date: NaiveDate) -> bool {
        let key = calendar_key(path, date);
        if self.data.bookmarks.remove(&key) {
            false
        } else {
            self.data.bookmarks.insert(key);
            true
        }
    }

    /// Whole-number percentage of `count` passages done.
    pub fn completion_percentage(&self, path: &str, date: NaiveDate, count: usize) -> u8 {
        if count == 0 {
            return 0;
        }
        let done = self.day_progress(path, date).done.min(count);
        ((done * 100) / count) as u8
    }
}

impl ProgressView for ProgressLog {
    fn day_progress(&self, path: &str, date: NaiveDate) -> DayProgress {
        let key = calendar_key(path, date);
        DayProgress {
            done: self.data.completions.get(&key).map_or(0, |day| day.len()),
            bookmarked: self.data.bookmarks.contains(&key),
        }
    }

    fn tracked_days(&self) -> Vec<(String, NaiveDate)> {
        let keys: BTreeSet<&String> = self
            .data
            .completions
            .keys()
            .chain(self.data.bookmarks.iter())
            .collect();
        keys.into_iter().filter_map(|k| parse_calendar_key(k)).collect()
    }
}
