//! Nested view model consumed by presentation code.

use serde::{Deserialize, Serialize};

use crate::records::{LessonRecord, RecordId};

/// A lesson as displayed inside a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: RecordId,
    pub title: String,

    /// Never empty; falls back to [`Lesson::NO_DESCRIPTION`].
    pub description: String,

    /// `" • "`-separated display fragments, possibly empty.
    pub metadata: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_plan_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pptx_url: Option<String>,

    /// Completion percentage, 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Source record, kept for detail views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_data: Option<LessonRecord>,
}

impl Lesson {
    pub const NO_DESCRIPTION: &'static str = "No description available";

    /// Create a lesson with no attachments.
    pub fn new(id: impl Into<RecordId>, title: &str, description: &str, metadata: &str) -> Self {
        let description = if description.trim().is_empty() {
            Self::NO_DESCRIPTION.to_string()
        } else {
            description.to_string()
        };

        Self {
            id: id.into(),
            title: title.to_string(),
            description,
            metadata: metadata.to_string(),
            lesson_plan_url: None,
            pptx_url: None,
            progress: None,
            duration: None,
            icon: None,
            full_data: None,
        }
    }

    /// Set progress, clamped to 100.
    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }
}

/// Separator between metadata fragments.
pub const METADATA_SEPARATOR: &str = " • ";

/// A named group of lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub lessons: Vec<Lesson>,
}

/// View-model root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CourseData {
    pub units: Vec<Unit>,
}

impl CourseData {
    /// Total number of lessons across all units.
    pub fn lesson_count(&self) -> usize {
        self.units.iter().map(|u| u.lessons.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
