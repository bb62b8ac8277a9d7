//! Gregorian to Hebrew calendar conversion and Hebrew numerals.
//!
//! Year starts are found from the molad of Tishrei with the four
//! postponement rules; month lengths follow from the resulting year length.

use chrono::{Datelike, NaiveDate};

/// Fixed day number (days since 0001-01-01, counting it as day 1) offset of
/// the Hebrew epoch.
const HEBREW_EPOCH_OFFSET: i64 = 1_373_428;

const PARTS_PER_HOUR: i64 = 1080;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HebrewMonth {
    Tishrei,
    Cheshvan,
    Kislev,
    Tevet,
    Shevat,
    /// Adar of a common year.
    Adar,
    AdarI,
    AdarII,
    Nisan,
    Iyar,
    Sivan,
    Tamuz,
    Av,
    Elul,
}

impl HebrewMonth {
    pub fn name_en(&self) -> &'static str {
        match self {
            HebrewMonth::Tishrei => "Tishrei",
            HebrewMonth::Cheshvan => "Cheshvan",
            HebrewMonth::Kislev => "Kislev",
            HebrewMonth::Tevet => "Tevet",
            HebrewMonth::Shevat => "Shevat",
            HebrewMonth::Adar => "Adar",
            HebrewMonth::AdarI => "Adar I",
            HebrewMonth::AdarII => "Adar II",
            HebrewMonth::Nisan => "Nisan",
            HebrewMonth::Iyar => "Iyar",
            HebrewMonth::Sivan => "Sivan",
            HebrewMonth::Tamuz => "Tamuz",
            HebrewMonth::Av => "Av",
            HebrewMonth::Elul => "Elul",
        }
    }

    pub fn name_he(&self) -> &'static str {
        match self {
            HebrewMonth::Tishrei => "תשרי",
            HebrewMonth::Cheshvan => "חשון",
            HebrewMonth::Kislev => "כסלו",
            HebrewMonth::Tevet => "טבת",
            HebrewMonth::Shevat => "שבט",
            HebrewMonth::Adar => "אדר",
            HebrewMonth::AdarI => "אדר א׳",
            HebrewMonth::AdarII => "אדר ב׳",
            HebrewMonth::Nisan => "ניסן",
            HebrewMonth::Iyar => "אייר",
            HebrewMonth::Sivan => "סיון",
            HebrewMonth::Tamuz => "תמוז",
            HebrewMonth::Av => "אב",
            HebrewMonth::Elul => "אלול",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HebrewDate {
    pub year: i64,
    pub month: HebrewMonth,
    pub day: u32,
}

impl HebrewDate {
    pub fn from_gregorian(date: NaiveDate) -> Self {
        let fixed = i64::from(date.num_days_from_ce());

        let mut year = i64::from(date.year()) + 3760;
        if fixed >= new_year(year + 1) {
            year += 1;
        }

        let mut day_of_year = fixed - new_year(year);
        for (month, length) in month_lengths(year) {
            if day_of_year < length {
                return Self {
                    year,
                    month,
                    day: (day_of_year + 1) as u32,
                };
            }
            day_of_year -= length;
        }

        // Month lengths always sum to the year length
        unreachable!("day {} past the end of Hebrew year {}", day_of_year, year)
    }

    /// "7 Cheshvan 5787"
    pub fn format_en(&self) -> String {
        format!("{} {} {}", self.day, self.month.name_en(), self.year)
    }

    /// "ז׳ חשון תשפ״ז"; the thousands are omitted, as is customary.
    pub fn format_he(&self) -> String {
        format!(
            "{} {} {}",
            gematria(self.day),
            self.month.name_he(),
            gematria(self.year.rem_euclid(1000) as u32)
        )
    }
}

pub fn is_leap_year(year: i64) -> bool {
    (1 + 7 * year).rem_euclid(19) < 7
}

/// Days from the epoch to Tishrei 1 of `year`, after postponements.
fn elapsed_days(year: i64) -> i64 {
    let cycles = (year - 1).div_euclid(19);
    let in_cycle = (year - 1).rem_euclid(19);
    let months = 235 * cycles + 12 * in_cycle + (7 * in_cycle + 1) / 19;

    let parts_elapsed = 204 + 793 * (months % PARTS_PER_HOUR);
    let hours_elapsed =
        5 + 12 * months + 793 * (months / PARTS_PER_HOUR) + parts_elapsed / PARTS_PER_HOUR;
    let mut day = 1 + 29 * months + hours_elapsed / 24;
    let parts = PARTS_PER_HOUR * (hours_elapsed % 24) + parts_elapsed % PARTS_PER_HOUR;

    // Molad zaken, GaTaRaD and BeTUTaKPaT
    if parts >= 18 * PARTS_PER_HOUR
        || (day % 7 == 2 && parts >= 9924 && !is_leap_year(year))
        || (day % 7 == 1 && parts >= 16789 && is_leap_year(year - 1))
    {
        day += 1;
    }
    // Lo ADU Rosh
    if matches!(day % 7, 0 | 3 | 5) {
        day += 1;
    }
    day
}

/// Fixed day number of Tishrei 1.
fn new_year(year: i64) -> i64 {
    elapsed_days(year) - HEBREW_EPOCH_OFFSET
}

pub fn year_length(year: i64) -> i64 {
    new_year(year + 1) - new_year(year)
}

fn month_lengths(year: i64) -> Vec<(HebrewMonth, i64)> {
    let length = year_length(year);
    // Complete years (355/385) lengthen Cheshvan; deficient years (353/383)
    // shorten Kislev.
    let cheshvan = if length % 10 == 5 { 30 } else { 29 };
    let kislev = if length % 10 == 3 { 29 } else { 30 };

    let mut months = vec![
        (HebrewMonth::Tishrei, 30),
        (HebrewMonth::Cheshvan, cheshvan),
        (HebrewMonth::Kislev, kislev),
        (HebrewMonth::Tevet, 29),
        (HebrewMonth::Shevat, 30),
    ];
    if is_leap_year(year) {
        months.push((HebrewMonth::AdarI, 30));
        months.push((HebrewMonth::AdarII, 29));
    } else {
        months.push((HebrewMonth::Adar, 29));
    }
    months.extend([
        (HebrewMonth::Nisan, 30),
        (HebrewMonth::Iyar, 29),
        (HebrewMonth::Sivan, 30),
        (HebrewMonth::Tamuz, 29),
        (HebrewMonth::Av, 30),
        (HebrewMonth::Elul, 29),
    ]);
    months
}

const UNITS: [char; 9] = ['א', 'ב', 'ג', 'ד', 'ה', 'ו', 'ז', 'ח', 'ט'];
const TENS: [char; 9] = ['י', 'כ', 'ל', 'מ', 'נ', 'ס', 'ע', 'פ', 'צ'];
const HUNDREDS: [char; 4] = ['ק', 'ר', 'ש', 'ת'];

const GERESH: char = '׳';
const GERSHAYIM: char = '״';

/// Hebrew numeral for `n`, punctuated: `ז׳`, `ט״ו`, `תשפ״ז`.
///
/// 15 and 16 are written ט״ו and ט״ז. Zero yields an empty string.
pub fn gematria(n: u32) -> String {
    let mut letters = Vec::new();
    let mut rest = n;
    while rest >= 400 {
        letters.push(HUNDREDS[3]);
        rest -= 400;
    }
    if rest >= 100 {
        letters.push(HUNDREDS[(rest / 100 - 1) as usize]);
        rest %= 100;
    }
    match rest {
        15 => letters.extend(['ט', 'ו']),
        16 => letters.extend(['ט', 'ז']),
        _ => {
            if rest >= 10 {
                letters.push(TENS[(rest / 10 - 1) as usize]);
            }
            if rest % 10 > 0 {
                letters.push(UNITS[(rest % 10 - 1) as usize]);
            }
        }
    }

    match letters.len() {
        0 => String::new(),
        1 => format!("{}{}", letters[0], GERESH),
        len => {
            letters.insert(len - 1, GERSHAYIM);
            letters.into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hebrew(y: i32, m: u32, d: u32) -> HebrewDate {
        HebrewDate::from_gregorian(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_known_dates() {
        assert_eq!(hebrew(2026, 10, 18).format_en(), "7 Cheshvan 5787");
        assert_eq!(hebrew(2026, 9, 12).format_en(), "1 Tishrei 5787");
        assert_eq!(hebrew(2026, 9, 11).format_en(), "29 Elul 5786");
        assert_eq!(hebrew(2025, 9, 23).format_en(), "1 Tishrei 5786");
        assert_eq!(hebrew(2024, 4, 23).format_en(), "15 Nisan 5784");
        assert_eq!(hebrew(2000, 1, 1).format_en(), "23 Tevet 5760");
    }

    #[test]
    fn test_leap_year_adar() {
        let purim = hebrew(2024, 3, 24);
        assert_eq!(purim.month, HebrewMonth::AdarII);
        assert_eq!(purim.day, 14);
        assert!(is_leap_year(5784));
        assert!(!is_leap_year(5786));
    }

    #[test]
    fn test_year_lengths() {
        assert_eq!(year_length(5786), 354);
        assert_eq!(year_length(5787), 385);
        for year in 5700..5900 {
            let length = year_length(year);
            assert!(
                matches!(length, 353 | 354 | 355 | 383 | 384 | 385),
                "year {} has {} days",
                year,
                length
            );
            let total: i64 = month_lengths(year).iter().map(|(_, days)| days).sum();
            assert_eq!(total, length);
        }
    }

    #[test]
    fn test_hebrew_format() {
        assert_eq!(hebrew(2026, 10, 18).format_he(), "ז׳ חשון תשפ״ז");
        assert_eq!(hebrew(2024, 4, 23).format_he(), "ט״ו ניסן תשפ״ד");
    }

    #[test]
    fn test_gematria() {
        assert_eq!(gematria(1), "א׳");
        assert_eq!(gematria(15), "ט״ו");
        assert_eq!(gematria(16), "ט״ז");
        assert_eq!(gematria(30), "ל׳");
        assert_eq!(gematria(64), "ס״ד");
        assert_eq!(gematria(176), "קע״ו");
        assert_eq!(gematria(787), "תשפ״ז");
        assert_eq!(gematria(0), "");
    }
}
