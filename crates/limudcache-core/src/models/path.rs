use serde::{Deserialize, Serialize};

/// Schedules that can be computed from the date alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSchedule {
    DafYomi,
}

/// Where a study path's daily assignment comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PathSource {
    Local { schedule: LocalSchedule },
    /// Looked up in the remote calendar by item title.
    Remote { calendar_title: String },
}

/// One of the parallel curricula a user may follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyPath {
    pub id: String,
    #[serde(flatten)]
    pub source: PathSource,
}

impl StudyPath {
    pub fn local(id: impl Into<String>, schedule: LocalSchedule) -> Self {
        Self {
            id: id.into(),
            source: PathSource::Local { schedule },
        }
    }

    pub fn remote(id: impl Into<String>, calendar_title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: PathSource::Remote {
                calendar_title: calendar_title.into(),
            },
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, PathSource::Local { .. })
    }
}

/// Paths configured on a fresh install.
pub fn default_paths() -> Vec<StudyPath> {
    vec![
        StudyPath::local("daf-yomi", LocalSchedule::DafYomi),
        StudyPath::remote("rambam-3", "Daily Rambam (3 Chapters)"),
        StudyPath::remote("rambam-1", "Daily Rambam"),
        StudyPath::remote("mishnah", "Daily Mishnah"),
        StudyPath::remote("halakhah", "Halakhah Yomit"),
        StudyPath::remote("tanakh", "Tanakh Yomi"),
        StudyPath::remote("929", "929"),
    ]
}
