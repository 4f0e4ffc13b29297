//! Core traits defining the interfaces to the lesson backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::records::{
    Audience, CurriculumGroup, LessonFile, LessonRecord, NewTopic, RecordId, Topic, User,
};

/// Read side of the backend.
#[async_trait]
pub trait RecordSource: Send + Sync {
    // Collections consumed by the assembler
    async fn fetch_groups(&self) -> Result<Vec<CurriculumGroup>>;
    async fn fetch_topics(&self) -> Result<Vec<Topic>>;
    async fn fetch_lessons(&self) -> Result<Vec<LessonRecord>>;
    async fn fetch_files(&self) -> Result<Vec<LessonFile>>;

    /// Most recently uploaded lesson.
    async fn latest_lesson(&self) -> Result<Option<LessonRecord>>;

    /// Lessons for one grade band, newest first.
    async fn lessons_for_audience(&self, audience: Audience) -> Result<Vec<LessonRecord>>;

    /// Topics belonging to one unit.
    async fn topics_in_unit(&self, unit: &RecordId) -> Result<Vec<Topic>>;
}

/// Insert-only write side of the backend.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert a lesson and return the stored row.
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonRecord>;

    /// Insert a lesson file row.
    async fn insert_file(&self, file: &LessonFile) -> Result<LessonFile>;

    /// Insert a topic; fails with a conflict if the name is taken in the unit.
    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic>;

    /// Look up a topic by unit and name.
    async fn find_topic(&self, unit: &RecordId, name: &str) -> Result<Option<Topic>>;

    /// Insert a user; fails with a conflict if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<User>;

    /// Look up a user by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// File bytes headed for object storage.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Object path inside the bucket.
    pub path: String,

    /// MIME type sent with the upload.
    pub content_type: String,

    pub bytes: Vec<u8>,
}

/// Object storage bucket for lesson files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object and return its public URL.
    async fn upload(&self, upload: Upload) -> Result<String>;

    /// Public URL for an object path.
    fn public_url(&self, path: &str) -> String;
}
