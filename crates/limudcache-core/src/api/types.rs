//! Wire types for the calendar and text endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiError;
use crate::models::{Bilingual, SectionedText};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CalendarResponse {
    #[serde(default)]
    pub calendar_items: Vec<CalendarItem>,
}

/// One named item in the day's remote calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub title: Bilingual,
    #[serde(rename = "displayValue", default)]
    pub display_value: Bilingual,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TextResponse {
    #[serde(default)]
    versions: Vec<TextVersion>,
    #[serde(default)]
    sections: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextVersion {
    text: TextBody,
}

/// The three shapes a text body arrives in.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TextBody {
    /// Single-passage reference
    Single(String),
    /// Passages of one chapter
    Flat(Vec<String>),
    /// Reference spanning several chapters
    Nested(Vec<Vec<String>>),
}

impl TextResponse {
    pub(crate) fn into_sectioned(self, reference: &str) -> Result<SectionedText, ApiError> {
        let start_chapter = self.sections.first().and_then(section_number).unwrap_or(1);

        let body = self
            .versions
            .into_iter()
            .next()
            .map(|v| v.text)
            .ok_or_else(|| ApiError::NotFound(format!("no text version for {}", reference)))?;

        let chapters = match body {
            TextBody::Single(s) => vec![vec![s]],
            TextBody::Flat(passages) => vec![passages],
            TextBody::Nested(chapters) => chapters,
        };

        if chapters.iter().flatten().all(|s| s.trim().is_empty()) {
            return Err(ApiError::InvalidResponse(format!("empty text for {}", reference)));
        }

        Ok(SectionedText {
            start_chapter,
            chapters,
        })
    }
}

/// Leading chapter number of a section address: `5`, `"5"`, or `"2a"`.
fn section_number(section: &Value) -> Option<u32> {
    let number = match section {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    };
    number.filter(|n| *n > 0)
}
