//! Daf Yomi: one folio of the Babylonian Talmud per day, 2711 days per cycle.

use chrono::NaiveDate;

use super::hebrew_date::gematria;

/// Cycle length in days.
pub const CYCLE_DAYS: i64 = 2711;

/// Every tractate starts at folio 2.
const FIRST_DAF: u32 = 2;

struct Tractate {
    name: &'static str,
    name_he: &'static str,
    last_daf: u32,
}

const fn tractate(name: &'static str, name_he: &'static str, last_daf: u32) -> Tractate {
    Tractate {
        name,
        name_he,
        last_daf,
    }
}

/// Tractates in study order. The Meilah block also covers Kinnim, Tamid and
/// Middot; see [`split_meilah`].
const TRACTATES: [Tractate; 37] = [
    tractate("Berakhot", "ברכות", 64),
    tractate("Shabbat", "שבת", 157),
    tractate("Eruvin", "עירובין", 105),
    tractate("Pesachim", "פסחים", 121),
    tractate("Shekalim", "שקלים", 22),
    tractate("Yoma", "יומא", 88),
    tractate("Sukkah", "סוכה", 56),
    tractate("Beitzah", "ביצה", 40),
    tractate("Rosh Hashanah", "ראש השנה", 35),
    tractate("Taanit", "תענית", 31),
    tractate("Megillah", "מגילה", 32),
    tractate("Moed Katan", "מועד קטן", 29),
    tractate("Chagigah", "חגיגה", 27),
    tractate("Yevamot", "יבמות", 122),
    tractate("Ketubot", "כתובות", 112),
    tractate("Nedarim", "נדרים", 91),
    tractate("Nazir", "נזיר", 66),
    tractate("Sotah", "סוטה", 49),
    tractate("Gittin", "גיטין", 90),
    tractate("Kiddushin", "קידושין", 82),
    tractate("Bava Kamma", "בבא קמא", 119),
    tractate("Bava Metzia", "בבא מציעא", 119),
    tractate("Bava Batra", "בבא בתרא", 176),
    tractate("Sanhedrin", "סנהדרין", 113),
    tractate("Makkot", "מכות", 24),
    tractate("Shevuot", "שבועות", 49),
    tractate("Avodah Zarah", "עבודה זרה", 76),
    tractate("Horayot", "הוריות", 14),
    tractate("Zevachim", "זבחים", 120),
    tractate("Menachot", "מנחות", 110),
    tractate("Chullin", "חולין", 142),
    tractate("Bekhorot", "בכורות", 61),
    tractate("Arakhin", "ערכין", 34),
    tractate("Temurah", "תמורה", 34),
    tractate("Keritot", "כריתות", 28),
    tractate("Meilah", "מעילה", 37),
    tractate("Niddah", "נדה", 73),
];

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 5).expect("valid anchor date")
}

/// The folio studied on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Daf {
    pub tractate: &'static str,
    pub tractate_he: &'static str,
    pub daf: u32,
}

impl Daf {
    pub fn for_date(date: NaiveDate) -> Self {
        let mut remaining = (date - anchor()).num_days().rem_euclid(CYCLE_DAYS) as u32;
        for t in &TRACTATES {
            let length = t.last_daf - FIRST_DAF + 1;
            if remaining < length {
                let daf = FIRST_DAF + remaining;
                let (tractate, tractate_he) = if t.name == "Meilah" {
                    split_meilah(daf)
                } else {
                    (t.name, t.name_he)
                };
                return Self {
                    tractate,
                    tractate_he,
                    daf,
                };
            }
            remaining -= length;
        }

        unreachable!("tractate table does not cover the {}-day cycle", CYCLE_DAYS)
    }

    /// Content reference, e.g. "Bekhorot 30".
    pub fn reference(&self) -> String {
        format!("{} {}", self.tractate, self.daf)
    }

    /// e.g. "בכורות ל׳"
    pub fn display_he(&self) -> String {
        format!("{} {}", self.tractate_he, gematria(self.daf))
    }
}

/// Kinnim, Tamid and Middot are studied within Meilah's folio numbering.
fn split_meilah(daf: u32) -> (&'static str, &'static str) {
    match daf {
        34.. => ("Middot", "מידות"),
        26..=33 => ("Tamid", "תמיד"),
        23..=25 => ("Kinnim", "קינים"),
        _ => ("Meilah", "מעילה"),
    }
}
