use serde::{Deserialize, Serialize};

/// The two languages a text is fetched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    He,
    En,
}

impl Language {
    /// Value of the `version` query parameter on the text endpoint.
    pub fn version_selector(&self) -> &'static str {
        match self {
            Language::He => "hebrew",
            Language::En => "english",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::He => write!(f, "he"),
            Language::En => write!(f, "en"),
        }
    }
}

/// Which languages were populated for a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct LanguagesLoaded {
    pub he: bool,
    pub en: bool,
}

impl LanguagesLoaded {
    pub fn both() -> Self {
        Self { he: true, en: true }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// A language counts as loaded only if it is loaded on both sides.
    pub fn and(self, other: Self) -> Self {
        Self {
            he: self.he && other.he,
            en: self.en && other.en,
        }
    }

    pub fn any(&self) -> bool {
        self.he || self.en
    }

    /// Reconstruct the flags from passage content, for entries written
    /// before the flag was stored.
    pub fn derive(passages: &[Passage]) -> Self {
        Self {
            he: passages.iter().any(|p| !p.he.trim().is_empty()),
            en: passages
                .iter()
                .any(|p| p.en.as_deref().is_some_and(|en| !en.trim().is_empty())),
        }
    }
}

/// Smallest trackable unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Passage {
    #[serde(default)]
    pub he: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en: Option<String>,
    /// 1-based chapter number within the source book.
    pub chapter: u32,
    #[serde(rename = "firstInChapter", default)]
    pub first_in_chapter: bool,
}

/// Text body split into chapters, as returned for one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionedText {
    pub start_chapter: u32,
    pub chapters: Vec<Vec<String>>,
}

impl SectionedText {
    fn segment(&self, chapter: usize, index: usize) -> Option<&str> {
        self.chapters
            .get(chapter)
            .and_then(|c| c.get(index))
            .map(|s| s.as_str())
    }
}

/// Cached text for one content reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TextEntry {
    pub reference: String,
    #[serde(default)]
    pub passages: Vec<Passage>,
    /// Passage index where each chapter after the first begins.
    #[serde(rename = "chapterBreaks", default, skip_serializing_if = "Vec::is_empty")]
    pub chapter_breaks: Vec<usize>,
    /// Absent on entries cached before per-language tracking existed.
    #[serde(rename = "languagesLoaded", default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<LanguagesLoaded>,
}

impl TextEntry {
    pub fn empty(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            passages: Vec::new(),
            chapter_breaks: Vec::new(),
            languages: Some(LanguagesLoaded::none()),
        }
    }

    /// Merge the per-language responses positionally.
    ///
    /// The chapter structure comes from the Hebrew text when present, otherwise
    /// from the translation. Returns `None` when neither language loaded.
    pub fn assemble(
        reference: impl Into<String>,
        he: Option<&SectionedText>,
        en: Option<&SectionedText>,
    ) -> Option<Self> {
        let layout = he.or(en)?;

        let mut passages = Vec::new();
        let mut sizes = Vec::with_capacity(layout.chapters.len());
        for (ci, chapter) in layout.chapters.iter().enumerate() {
            sizes.push(chapter.len());
            for pi in 0..chapter.len() {
                passages.push(Passage {
                    he: he
                        .and_then(|t| t.segment(ci, pi))
                        .unwrap_or_default()
                        .to_string(),
                    en: en.and_then(|t| t.segment(ci, pi)).map(str::to_string),
                    chapter: layout.start_chapter + ci as u32,
                    first_in_chapter: pi == 0,
                });
            }
        }

        Some(Self {
            reference: reference.into(),
            passages,
            chapter_breaks: chapter_breaks(&sizes),
            languages: Some(LanguagesLoaded {
                he: he.is_some(),
                en: en.is_some(),
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn languages_loaded(&self) -> LanguagesLoaded {
        self.languages
            .unwrap_or_else(|| LanguagesLoaded::derive(&self.passages))
    }
}

/// Chapter-break offsets for consecutive chapters of the given sizes.
///
/// Offsets are strictly increasing and fall within `[1, total - 1]`; empty
/// chapters produce no break.
pub fn chapter_breaks(sizes: &[usize]) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    let mut breaks = Vec::new();
    let mut offset = 0;
    for (i, size) in sizes.iter().enumerate() {
        if i > 0 && offset > 0 && offset < total && breaks.last() != Some(&offset) {
            breaks.push(offset);
        }
        offset += size;
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sectioned(start: u32, sizes: &[usize], tag: &str) -> SectionedText {
        SectionedText {
            start_chapter: start,
            chapters: sizes
                .iter()
                .enumerate()
                .map(|(c, n)| (0..*n).map(|p| format!("{} {}:{}", tag, c, p)).collect())
                .collect(),
        }
    }

    #[test]
    fn test_chapter_breaks_spanning() {
        assert_eq!(chapter_breaks(&[23, 20, 15]), vec![23, 43]);
    }

    #[test]
    fn test_chapter_breaks_single_chapter() {
        assert!(chapter_breaks(&[12]).is_empty());
        assert!(chapter_breaks(&[]).is_empty());
    }

    #[test]
    fn test_chapter_breaks_skip_empty_chapters() {
        assert_eq!(chapter_breaks(&[0, 5, 0, 3, 0]), vec![5]);
        assert_eq!(chapter_breaks(&[4, 0, 0, 2]), vec![4]);
    }

    #[test]
    fn test_assemble_both_languages() {
        let he = sectioned(5, &[2, 1], "he");
        let en = sectioned(5, &[2, 1], "en");
        let entry = TextEntry::assemble("Genesis 5-6", Some(&he), Some(&en)).unwrap();

        assert_eq!(entry.len(), 3);
        assert_eq!(entry.chapter_breaks, vec![2]);
        assert_eq!(entry.passages[0].chapter, 5);
        assert!(entry.passages[0].first_in_chapter);
        assert!(!entry.passages[1].first_in_chapter);
        assert_eq!(entry.passages[2].chapter, 6);
        assert!(entry.passages[2].first_in_chapter);
        assert_eq!(entry.passages[2].en.as_deref(), Some("en 1:0"));
        assert_eq!(entry.languages_loaded(), LanguagesLoaded::both());
    }

    #[test]
    fn test_assemble_translation_only_uses_its_layout() {
        let en = sectioned(1, &[3], "en");
        let entry = TextEntry::assemble("Avot 1", None, Some(&en)).unwrap();
        assert_eq!(entry.len(), 3);
        assert!(entry.passages.iter().all(|p| p.he.is_empty()));
        assert_eq!(
            entry.languages_loaded(),
            LanguagesLoaded { he: false, en: true }
        );
    }

    #[test]
    fn test_assemble_shorter_translation_leaves_gaps() {
        let he = sectioned(1, &[3], "he");
        let en = sectioned(1, &[2], "en");
        let entry = TextEntry::assemble("Avot 1", Some(&he), Some(&en)).unwrap();
        assert_eq!(entry.len(), 3);
        assert!(entry.passages[2].en.is_none());
    }

    #[test]
    fn test_assemble_nothing_loaded() {
        assert!(TextEntry::assemble("Avot 1", None, None).is_none());
    }

    #[test]
    fn test_languages_derived_for_legacy_entries() {
        let entry = TextEntry {
            reference: "Avot 1".to_string(),
            passages: vec![
                Passage {
                    he: "משה קבל תורה".to_string(),
                    en: Some("  ".to_string()),
                    chapter: 1,
                    first_in_chapter: true,
                },
                Passage {
                    he: String::new(),
                    en: None,
                    chapter: 1,
                    first_in_chapter: false,
                },
            ],
            chapter_breaks: vec![],
            languages: None,
        };
        assert_eq!(
            entry.languages_loaded(),
            LanguagesLoaded { he: true, en: false }
        );
    }

    #[test]
    fn test_languages_and() {
        let partial = LanguagesLoaded { he: true, en: false };
        assert_eq!(LanguagesLoaded::both().and(partial), partial);
        assert!(!LanguagesLoaded::none().any());
    }
}
