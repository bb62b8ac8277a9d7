//! Data models for cached study content.
//!
//! - `TextEntry`, `Passage`: text bodies keyed by content reference
//! - `CalendarEntry`: what a study path assigns to a given day
//! - `StudyPath`: path configuration (local schedule or remote calendar title)

pub mod calendar;
pub mod path;
pub mod text;

pub use calendar::{calendar_key, parse_calendar_key, Bilingual, CalendarEntry, LocalizedDate};
pub use path::{default_paths, LocalSchedule, PathSource, StudyPath};
pub use text::{chapter_breaks, Language, LanguagesLoaded, Passage, SectionedText, TextEntry};
