//! Locally computed schedules and date strings.
//!
//! Nothing here touches the network or the store. Remote paths resolve to
//! `None` and are looked up in the remote calendar by the fetcher.

pub mod daf_yomi;
pub mod hebrew_date;

use chrono::NaiveDate;

use crate::models::{Bilingual, LocalSchedule, LocalizedDate, PathSource, StudyPath};

pub use daf_yomi::Daf;
pub use hebrew_date::{gematria, HebrewDate, HebrewMonth};

/// The assignment a local schedule produces for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDay {
    pub display: Bilingual,
    pub references: Vec<String>,
    pub localized: LocalizedDate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleResolver;

impl ScheduleResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a locally computable path; `None` for remote paths.
    pub fn resolve(&self, date: NaiveDate, path: &StudyPath) -> Option<ScheduledDay> {
        let PathSource::Local { schedule } = &path.source else {
            return None;
        };

        let localized = self.localized_date(date);
        match schedule {
            LocalSchedule::DafYomi => {
                let daf = Daf::for_date(date);
                let reference = daf.reference();
                Some(ScheduledDay {
                    display: Bilingual::new(reference.clone(), daf.display_he()),
                    references: vec![reference],
                    localized,
                })
            }
        }
    }

    pub fn localized_date(&self, date: NaiveDate) -> LocalizedDate {
        let hebrew = HebrewDate::from_gregorian(date);
        LocalizedDate {
            gregorian: date.format("%B %-d, %Y").to_string(),
            hebrew_en: hebrew.format_en(),
            hebrew: hebrew.format_he(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_daf_yomi() {
        let resolver = ScheduleResolver::new();
        let path = StudyPath::local("daf-yomi", LocalSchedule::DafYomi);

        let day = resolver.resolve(date(2026, 10, 18), &path).unwrap();
        assert_eq!(day.references, vec!["Bekhorot 30"]);
        assert_eq!(day.display.en, "Bekhorot 30");
        assert_eq!(day.display.he, "בכורות ל׳");
        assert_eq!(day.localized.hebrew_en, "7 Cheshvan 5787");
    }

    #[test]
    fn test_remote_path_is_not_resolved() {
        let resolver = ScheduleResolver::new();
        let path = StudyPath::remote("mishnah", "Daily Mishnah");
        assert!(resolver.resolve(date(2026, 10, 18), &path).is_none());
    }

    #[test]
    fn test_localized_date() {
        let localized = ScheduleResolver::new().localized_date(date(2026, 10, 18));
        assert_eq!(localized.gregorian, "October 18, 2026");
        assert_eq!(localized.hebrew_en, "7 Cheshvan 5787");
        assert_eq!(localized.hebrew, "ז׳ חשון תשפ״ז");

        let single_digit = ScheduleResolver::new().localized_date(date(2026, 3, 5));
        assert_eq!(single_digit.gregorian, "March 5, 2026");
    }

    #[test]
    fn test_any_date_resolves() {
        let resolver = ScheduleResolver::new();
        let path = StudyPath::local("daf-yomi", LocalSchedule::DafYomi);
        let mut day = date(1990, 1, 1);
        while day < date(1992, 1, 1) {
            let resolved = resolver.resolve(day, &path).unwrap();
            assert_eq!(resolved.references.len(), 1);
            day = day.succ_opt().unwrap();
        }
    }
}
