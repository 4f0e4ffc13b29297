//! Lesson entry form and its validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use lesson_core::{Audience, LessonError, LessonRecord, MaterialType, RecordId, Result, TextOrList};

/// Raw operator input. Every field is free text; JSON fields hold JSON source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonForm {
    /// Lesson id; a blank id is replaced with a fresh UUID. Must not contain
    /// path separators or `..`.
    pub id: String,
    pub title: String,
    pub curriculum_group_id: String,
    pub topic: String,
    pub subject: String,
    pub target_audience: String,
    pub level: String,
    pub lesson_number: String,

    /// JSON list of strings, or a JSON string.
    pub learning_objectives: String,

    /// Any JSON value.
    pub materials: String,

    /// JSON list of strings, or a JSON string.
    pub teaching_activities: String,

    pub application: String,
    pub assessment: String,
    pub refs: String,
    pub uploaded_by: String,

    /// Local lesson plan document to upload.
    pub lesson_plan: Option<PathBuf>,

    /// Local slide deck to upload.
    pub slide_deck: Option<PathBuf>,
}

/// A local file to attach to the lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment<'a> {
    pub material_type: MaterialType,
    pub path: &'a Path,
}

impl LessonForm {
    /// Validate the form and build the row to insert.
    ///
    /// Blank optional fields are left out of the row.
    pub fn to_record(&self) -> Result<LessonRecord> {
        let id = match non_blank(&self.id) {
            Some(id) if id.contains(|c: char| c == '/' || c == '\\') || id.contains("..") => {
                return Err(LessonError::validation(
                    "id",
                    format!("'{}' must not contain '/', '\\' or '..'", id),
                ));
            }
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let title = non_blank(&self.title)
            .ok_or_else(|| LessonError::validation("title", "is required"))?
            .to_string();

        let target_audience = non_blank(&self.target_audience)
            .map(|raw| {
                Audience::parse(raw).map(|a| a.as_str().to_string()).ok_or_else(|| {
                    LessonError::validation(
                        "target_audience",
                        format!("'{}' is not one of Elementary, Middle, High", raw),
                    )
                })
            })
            .transpose()?;

        let lesson_number = non_blank(&self.lesson_number)
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| {
                    LessonError::validation("lesson_number", format!("'{}' is not a number", raw))
                })
            })
            .transpose()?;

        Ok(LessonRecord {
            id: Some(RecordId::Text(id)),
            title,
            description: None,
            curriculum_group_id: non_blank(&self.curriculum_group_id).map(parse_id),
            topic: non_blank(&self.topic).map(parse_id),
            subject: owned(&self.subject),
            target_audience,
            level: owned(&self.level),
            lesson_number,
            learning_objectives: text_or_list("learning_objectives", &self.learning_objectives)?,
            materials: json_field("materials", &self.materials)?,
            teaching_activities: text_or_list("teaching_activities", &self.teaching_activities)?,
            application: owned(&self.application),
            assessment: owned(&self.assessment),
            refs: owned(&self.refs).map(TextOrList::Text),
            upload_time: None,
            uploaded_by: owned(&self.uploaded_by),
        })
    }

    /// Files to upload, lesson plan first.
    pub fn attachments(&self) -> Vec<Attachment<'_>> {
        let plan = self.lesson_plan.as_deref().map(|path| Attachment {
            material_type: MaterialType::LessonPlan,
            path,
        });
        let deck = self.slide_deck.as_deref().map(|path| Attachment {
            material_type: MaterialType::LessonPpt,
            path,
        });
        plan.into_iter().chain(deck).collect()
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn owned(s: &str) -> Option<String> {
    non_blank(s).map(str::to_string)
}

/// Integer-looking ids are sent as integers.
fn parse_id(raw: &str) -> RecordId {
    raw.parse::<i64>()
        .map(RecordId::Int)
        .unwrap_or_else(|_| RecordId::Text(raw.to_string()))
}

fn json_field(field: &str, raw: &str) -> Result<Option<Value>> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| LessonError::validation(field, format!("invalid JSON: {}", e)))
}

fn text_or_list(field: &str, raw: &str) -> Result<Option<TextOrList>> {
    match json_field(field, raw)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value).map(Some).map_err(|_| {
            LessonError::validation(field, "must be a list of strings or a string")
        }),
    }
}

/// MIME type sent with an upload, from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Object-safe file name: ASCII letters, digits, `.`, `-` and `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
