use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Text in English and Hebrew.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bilingual {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub he: String,
}

impl Bilingual {
    pub fn new(en: impl Into<String>, he: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            he: he.into(),
        }
    }
}

/// Display strings for a calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LocalizedDate {
    /// e.g. "October 18, 2026"
    pub gregorian: String,
    /// e.g. "7 Cheshvan 5787"
    #[serde(rename = "hebrewEn")]
    pub hebrew_en: String,
    /// e.g. "ז׳ חשון תשפ״ז"
    pub hebrew: String,
}

/// What a study path assigns to one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CalendarEntry {
    pub path: String,
    pub date: NaiveDate,
    pub display: Bilingual,
    pub references: Vec<String>,
    /// Passage count of the referenced text; 0 until reconciled.
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub localized: LocalizedDate,
}

impl CalendarEntry {
    pub fn key(&self) -> String {
        calendar_key(&self.path, self.date)
    }
}

/// Store key for a (path, date) pair.
pub fn calendar_key(path: &str, date: NaiveDate) -> String {
    format!("{}/{}", path, date.format("%Y-%m-%d"))
}

/// Inverse of [`calendar_key`].
pub fn parse_calendar_key(key: &str) -> Option<(String, NaiveDate)> {
    let (path, date) = key.rsplit_once('/')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some((path.to_string(), date))
}
