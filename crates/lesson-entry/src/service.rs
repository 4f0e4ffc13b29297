//! Insert-only write path: lessons, lesson files, topics and users.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use lesson_core::{
    LessonError, LessonFile, LessonRecord, MaterialType, NewTopic, ObjectStore, RecordId,
    RecordSink, RecordSource, Result, Topic, Upload, User,
};
use lesson_view::next_topic_number;

use crate::form::{content_type_for, sanitize_file_name, Attachment, LessonForm};

/// Outcome kind shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Success,
    Error,
}

/// Operator-facing status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }

    /// Status for a failed submission.
    pub fn from_error(err: &LessonError) -> Self {
        match err {
            LessonError::Validation { .. } => Self::error(err.to_string()),
            _ => Self::error(format!("Error: {}", err)),
        }
    }
}

/// Result of uploading and recording one attached file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub material_type: MaterialType,

    /// Object path inside the bucket.
    pub path: String,

    /// Public URL, when the upload succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a submission whose lesson row was inserted.
///
/// File failures do not undo the lesson; they are listed here instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReport {
    pub lesson: LessonRecord,
    pub files: Vec<FileOutcome>,
}

impl SubmitReport {
    /// Whether every attached file was uploaded and recorded.
    pub fn is_complete(&self) -> bool {
        self.files.iter().all(FileOutcome::is_ok)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_ok())
    }

    pub fn status(&self) -> Status {
        if self.is_complete() {
            return Status::success("Lesson added successfully!");
        }

        let failed: Vec<String> = self
            .failures()
            .map(|f| format!("{} ({})", f.path, f.error.as_deref().unwrap_or("unknown error")))
            .collect();
        Status::error(format!(
            "Lesson added, but {} of {} files failed: {}",
            failed.len(),
            self.files.len(),
            failed.join("; ")
        ))
    }
}

/// Write path over a backend that can read, insert and store objects.
pub struct EntryService<B: ?Sized> {
    backend: Arc<B>,
}

impl<B> EntryService<B>
where
    B: RecordSource + RecordSink + ObjectStore + ?Sized,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Validate the form, insert the lesson, then upload and record each file.
    ///
    /// Fails only if validation or the lesson insert fails; nothing has been
    /// written in that case.
    pub async fn submit(&self, form: &LessonForm) -> Result<SubmitReport> {
        let record = form.to_record()?;
        info!("Adding lesson '{}'", record.title);

        let lesson = self.backend.insert_lesson(&record).await?;
        let lesson_id = lesson
            .id
            .clone()
            .or(record.id)
            .ok_or_else(|| LessonError::internal("inserted lesson has no id"))?;

        let mut files = Vec::new();
        for attachment in form.attachments() {
            files.push(self.attach(&lesson_id, attachment).await);
        }

        let report = SubmitReport { lesson, files };
        if report.is_complete() {
            info!("Lesson {} added with {} files", lesson_id, report.files.len());
        } else {
            warn!(
                "Lesson {} added, {} file(s) failed",
                lesson_id,
                report.failures().count()
            );
        }
        Ok(report)
    }

    async fn attach(&self, lesson_id: &RecordId, attachment: Attachment<'_>) -> FileOutcome {
        let file_name = attachment
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_file_name)
            .unwrap_or_else(|| "file".to_string());
        let path = format!(
            "{}/{}",
            sanitize_file_name(&lesson_id.to_string()),
            file_name
        );

        let mut outcome = FileOutcome {
            material_type: attachment.material_type,
            path: path.clone(),
            url: None,
            error: None,
        };

        let bytes = match tokio::fs::read(attachment.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Cannot read {}: {}", attachment.path.display(), e);
                outcome.error = Some(format!("cannot read {}: {}", attachment.path.display(), e));
                return outcome;
            }
        };

        let upload = Upload {
            path,
            content_type: content_type_for(attachment.path).to_string(),
            bytes,
        };
        let url = match self.backend.upload(upload).await {
            Ok(url) => url,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        outcome.url = Some(url.clone());

        let row = LessonFile {
            id: None,
            lesson_id: lesson_id.clone(),
            file_url: Some(url),
            file_type: attachment
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase),
            material_type: Some(attachment.material_type),
        };
        if let Err(e) = self.backend.insert_file(&row).await {
            outcome.error = Some(e.to_string());
        }

        outcome
    }

    /// Get or create a topic by name within a unit.
    ///
    /// Without an explicit number the next free number is used. A duplicate
    /// name reuses the existing topic.
    pub async fn ensure_topic(
        &self,
        unit: &RecordId,
        name: &str,
        topic_number: Option<i64>,
    ) -> Result<Topic> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LessonError::validation("name", "is required"));
        }

        let topic_number = match topic_number {
            Some(n) => n,
            None => self.suggest_topic_number(unit).await?,
        };

        let new_topic = NewTopic {
            name: name.to_string(),
            relevant_unit: unit.clone(),
            topic_number: Some(topic_number),
        };

        match self.backend.insert_topic(&new_topic).await {
            Ok(topic) => {
                info!("Created topic '{}' ({}) in unit {}", name, topic.id, unit);
                Ok(topic)
            }
            Err(e) if e.is_conflict() => {
                info!("Topic '{}' already exists in unit {}, reusing it", name, unit);
                self.backend.find_topic(unit, name).await?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Get or create an uploader by email.
    pub async fn ensure_user(&self, name: &str, email: &str) -> Result<User> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(LessonError::validation(
                "email",
                format!("'{}' is not an email address", email),
            ));
        }

        let user = User {
            id: None,
            name: name.trim().to_string(),
            email: email.to_string(),
        };

        match self.backend.insert_user(&user).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_conflict() => {
                info!("User {} already registered, reusing it", email);
                self.backend.find_user_by_email(email).await?.ok_or(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Next free topic number in a unit.
    pub async fn suggest_topic_number(&self, unit: &RecordId) -> Result<i64> {
        let topics = self.backend.topics_in_unit(unit).await?;
        Ok(next_topic_number(&topics, unit))
    }
}
