//! Flat source records as served by the lesson backend.
//!
//! Rows arrive as loosely typed JSON objects. Each entity has a dedicated
//! [`FromRow`] mapping that reads fields one at a time, so a single field of
//! the wrong shape degrades to "absent" instead of failing the whole batch.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::LessonError;

/// Opaque record identifier.
///
/// The backend mixes serial integer keys and UUID keys, and foreign keys are
/// not always encoded the same way as the key they point at. Equality and
/// hashing therefore go through the textual form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Textual form used for comparisons and query filters.
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Self::Int(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.trim().to_string())),
            _ => None,
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.as_key() == other.as_key()
    }
}

impl Eq for RecordId {}

impl Hash for RecordId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_key().hash(state);
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Grade band a lesson targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    Elementary,
    Middle,
    High,
}

impl Audience {
    pub const ALL: [Audience; 3] = [Self::Elementary, Self::Middle, Self::High];

    /// Parse a grade name, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "elementary" => Some(Self::Elementary),
            "middle" => Some(Self::Middle),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Numeric code used in composite lesson numbers.
    pub fn code(&self) -> u8 {
        match self {
            Self::Elementary => 1,
            Self::Middle => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elementary => "Elementary",
            Self::Middle => "Middle",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Audience {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            LessonError::invalid_argument(format!(
                "unknown grade level '{}' (expected Elementary, Middle or High)",
                s
            ))
        })
    }
}

/// Role of an attached lesson file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    LessonPlan,
    LessonPpt,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessonPlan => "LESSON_PLAN",
            Self::LessonPpt => "LESSON_PPT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LESSON_PLAN" => Some(Self::LessonPlan),
            "LESSON_PPT" => Some(Self::LessonPpt),
            _ => None,
        }
    }
}

/// A field stored either as a JSON list of strings or as a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    List(Vec<String>),
    Text(String),
}

impl TextOrList {
    /// Non-blank entries, trimmed.
    pub fn items(&self) -> Vec<&str> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Text(s) if !s.trim().is_empty() => vec![s.trim()],
            Self::Text(_) => Vec::new(),
        }
    }
}

/// A curriculum group (displayed as a unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumGroup {
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A numbered sub-grouping inside a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub relevant_unit: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_number: Option<i64>,
}

/// Insert payload for a topic; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    pub relevant_unit: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_number: Option<i64>,
}

/// A lesson row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LessonRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curriculum_group_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_objectives: Option<TextOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaching_activities: Option<TextOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<TextOrList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_by: Option<String>,
}

impl LessonRecord {
    /// Title used when a row carries none.
    pub const UNTITLED: &'static str = "Untitled lesson";

    /// Parsed grade band, if the audience is one of the known values.
    pub fn audience(&self) -> Option<Audience> {
        self.target_audience.as_deref().and_then(Audience::parse)
    }
}

/// A file attached to a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub lesson_id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_type: Option<MaterialType>,
}

/// A registered uploader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub email: String,
}

/// The four collections an assembly pass works from.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub groups: Vec<CurriculumGroup>,
    pub topics: Vec<Topic>,
    pub lessons: Vec<LessonRecord>,
    pub files: Vec<LessonFile>,
}

/// Lenient mapping from one raw backend row.
pub trait FromRow: Sized {
    /// Collection name, for logging.
    const RESOURCE: &'static str;

    /// Map a row, or `None` when a key needed for joining is unusable.
    fn from_row(row: &Map<String, Value>) -> Option<Self>;
}

/// Map a batch of raw rows, skipping the ones that cannot be joined.
pub fn map_rows<T: FromRow>(rows: &[Value]) -> Vec<T> {
    let mut mapped = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let record = row.as_object().and_then(T::from_row);
        match record {
            Some(record) => mapped.push(record),
            None => warn!("Skipping malformed {} row at position {}", T::RESOURCE, idx),
        }
    }

    mapped
}

impl FromRow for CurriculumGroup {
    const RESOURCE: &'static str = "curriculum_groups";

    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let id = id_field(row, "id")?;
        Some(Self {
            name: text_field(row, "name").unwrap_or_else(|| id.to_string()),
            id,
            unit: int_field(row, "unit"),
            description: text_field(row, "description"),
        })
    }
}

impl FromRow for Topic {
    const RESOURCE: &'static str = "topics";

    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            id: id_field(row, "id")?,
            name: text_field(row, "name"),
            relevant_unit: id_field(row, "relevant_unit")?,
            topic_number: int_field(row, "topic_number"),
        })
    }
}

impl FromRow for LessonRecord {
    const RESOURCE: &'static str = "lessons";

    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            id: Some(id_field(row, "id")?),
            title: text_field(row, "title").unwrap_or_else(|| Self::UNTITLED.to_string()),
            description: text_field(row, "description"),
            curriculum_group_id: id_field(row, "curriculum_group_id"),
            topic: id_field(row, "topic"),
            subject: text_field(row, "subject"),
            target_audience: text_field(row, "target_audience"),
            level: text_field(row, "level"),
            lesson_number: int_field(row, "lesson_number"),
            learning_objectives: typed_field(row, "learning_objectives"),
            materials: row.get("materials").filter(|v| !v.is_null()).cloned(),
            teaching_activities: typed_field(row, "teaching_activities"),
            application: text_field(row, "application"),
            assessment: text_field(row, "assessment"),
            refs: typed_field(row, "refs"),
            upload_time: typed_field(row, "upload_time"),
            uploaded_by: text_field(row, "uploaded_by"),
        })
    }
}

impl FromRow for LessonFile {
    const RESOURCE: &'static str = "lesson_files";

    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            id: id_field(row, "id"),
            lesson_id: id_field(row, "lesson_id")?,
            file_url: text_field(row, "file_url"),
            file_type: text_field(row, "file_type"),
            material_type: text_field(row, "material_type")
                .as_deref()
                .and_then(MaterialType::parse),
        })
    }
}

impl FromRow for User {
    const RESOURCE: &'static str = "users";

    fn from_row(row: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            id: Some(id_field(row, "id")?),
            name: text_field(row, "name").unwrap_or_default(),
            email: text_field(row, "email")?,
        })
    }
}

fn id_field(row: &Map<String, Value>, key: &str) -> Option<RecordId> {
    row.get(key).and_then(RecordId::from_value)
}

/// Non-blank text; numbers and booleans are rendered as text.
fn text_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::String(_) => None,
        other => {
            debug!("Ignoring non-text value for '{}': {}", key, other);
            None
        }
    }
}

fn int_field(row: &Map<String, Value>, key: &str) -> Option<i64> {
    match row.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn typed_field<T: DeserializeOwned>(row: &Map<String, Value>, key: &str) -> Option<T> {
    let value = row.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!("Ignoring unparseable '{}': {}", key, e);
            None
        }
    }
}
