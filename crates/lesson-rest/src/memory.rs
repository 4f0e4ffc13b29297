//! In-memory backend for tests and offline use.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use lesson_core::{
    Audience, CurriculumGroup, LessonError, LessonFile, LessonRecord, NewTopic, ObjectStore,
    RecordId, RecordSet, RecordSink, RecordSource, Result, Topic, Upload, User,
};

/// Resource name used to fail uploads with [`MemoryBackend::fail_on`].
pub const STORAGE_RESOURCE: &str = "storage";

#[derive(Default)]
struct State {
    records: RecordSet,
    users: Vec<User>,
    objects: HashMap<String, Upload>,
    failing: HashSet<String>,
    next_id: i64,
}

impl State {
    fn check(&self, resource: &str) -> Result<()> {
        if self.failing.contains(resource) {
            return Err(LessonError::Request {
                resource: resource.to_string(),
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId::Int(self.next_id)
    }
}

/// Backend that keeps every collection in process memory.
///
/// Enforces the same unique keys as the hosted schema: lesson id, topic
/// name within a unit, and user email.
pub struct MemoryBackend {
    state: Mutex<State>,
    public_base: String,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::from_records(RecordSet::default())
    }

    /// Create a backend seeded with records.
    pub fn from_records(records: RecordSet) -> Self {
        // Start generated ids past any numeric id already present
        let max_id = records
            .groups
            .iter()
            .map(|g| &g.id)
            .chain(records.topics.iter().map(|t| &t.id))
            .chain(records.lessons.iter().filter_map(|l| l.id.as_ref()))
            .filter_map(|id| match id {
                RecordId::Int(n) => Some(*n),
                RecordId::Text(_) => None,
            })
            .max()
            .unwrap_or(0);

        Self {
            state: Mutex::new(State {
                records,
                next_id: max_id,
                ..Default::default()
            }),
            public_base: "memory://lesson-files".to_string(),
        }
    }

    /// Make every operation on `resource` fail with a 503.
    pub fn fail_on(self, resource: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.failing.insert(resource.to_string());
        }
        self
    }

    /// Snapshot of the stored collections.
    pub fn records(&self) -> Result<RecordSet> {
        self.with_state(|state| Ok(state.records.clone()))
    }

    /// Registered users.
    pub fn users(&self) -> Result<Vec<User>> {
        self.with_state(|state| Ok(state.users.clone()))
    }

    /// Stored object at `path`, if any.
    pub fn object(&self, path: &str) -> Result<Option<Upload>> {
        self.with_state(|state| Ok(state.objects.get(path).cloned()))
    }

    fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut State) -> Result<T>,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|e| LessonError::internal(format!("Lock poisoned: {}", e)))?;
        f(&mut state)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(resource: &str, message: String) -> LessonError {
    LessonError::Conflict {
        resource: resource.to_string(),
        message,
    }
}

#[async_trait]
impl RecordSource for MemoryBackend {
    async fn fetch_groups(&self) -> Result<Vec<CurriculumGroup>> {
        self.with_state(|state| {
            state.check("curriculum_groups")?;
            Ok(state.records.groups.clone())
        })
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        self.with_state(|state| {
            state.check("topics")?;
            Ok(state.records.topics.clone())
        })
    }

    async fn fetch_lessons(&self) -> Result<Vec<LessonRecord>> {
        self.with_state(|state| {
            state.check("lessons")?;
            Ok(state.records.lessons.clone())
        })
    }

    async fn fetch_files(&self) -> Result<Vec<LessonFile>> {
        self.with_state(|state| {
            state.check("lesson_files")?;
            Ok(state.records.files.clone())
        })
    }

    async fn latest_lesson(&self) -> Result<Option<LessonRecord>> {
        let lessons = self.fetch_lessons().await?;
        Ok(lessons
            .into_iter()
            .filter(|l| l.upload_time.is_some())
            .max_by_key(|l| l.upload_time))
    }

    async fn lessons_for_audience(&self, audience: Audience) -> Result<Vec<LessonRecord>> {
        let mut lessons: Vec<LessonRecord> = self
            .fetch_lessons()
            .await?
            .into_iter()
            .filter(|l| l.target_audience.as_deref() == Some(audience.as_str()))
            .collect();
        lessons.sort_by(|a, b| b.upload_time.cmp(&a.upload_time));
        Ok(lessons)
    }

    async fn topics_in_unit(&self, unit: &RecordId) -> Result<Vec<Topic>> {
        let mut topics: Vec<Topic> = self
            .fetch_topics()
            .await?
            .into_iter()
            .filter(|t| &t.relevant_unit == unit)
            .collect();
        topics.sort_by_key(|t| t.topic_number);
        Ok(topics)
    }
}

#[async_trait]
impl RecordSink for MemoryBackend {
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonRecord> {
        self.with_state(|state| {
            state.check("lessons")?;

            let mut stored = lesson.clone();
            if let Some(id) = &lesson.id {
                if state.records.lessons.iter().any(|l| l.id.as_ref() == Some(id)) {
                    return Err(conflict("lessons", format!("lesson {} already exists", id)));
                }
            } else {
                stored.id = Some(state.allocate_id());
            }
            if stored.upload_time.is_none() {
                stored.upload_time = Some(chrono::Utc::now());
            }

            debug!("Inserted lesson {:?}", stored.id);
            state.records.lessons.push(stored.clone());
            Ok(stored)
        })
    }

    async fn insert_file(&self, file: &LessonFile) -> Result<LessonFile> {
        self.with_state(|state| {
            state.check("lesson_files")?;

            let mut stored = file.clone();
            if stored.id.is_none() {
                stored.id = Some(state.allocate_id());
            }

            debug!("Inserted file for lesson {}", stored.lesson_id);
            state.records.files.push(stored.clone());
            Ok(stored)
        })
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic> {
        self.with_state(|state| {
            state.check("topics")?;

            let taken = state.records.topics.iter().any(|t| {
                t.relevant_unit == topic.relevant_unit && t.name.as_deref() == Some(&topic.name)
            });
            if taken {
                return Err(conflict(
                    "topics",
                    format!("topic '{}' already exists in unit {}", topic.name, topic.relevant_unit),
                ));
            }

            let stored = Topic {
                id: state.allocate_id(),
                name: Some(topic.name.clone()),
                relevant_unit: topic.relevant_unit.clone(),
                topic_number: topic.topic_number,
            };

            debug!("Inserted topic {}", stored.id);
            state.records.topics.push(stored.clone());
            Ok(stored)
        })
    }

    async fn find_topic(&self, unit: &RecordId, name: &str) -> Result<Option<Topic>> {
        self.with_state(|state| {
            state.check("topics")?;
            Ok(state
                .records
                .topics
                .iter()
                .find(|t| &t.relevant_unit == unit && t.name.as_deref() == Some(name))
                .cloned())
        })
    }

    async fn insert_user(&self, user: &User) -> Result<User> {
        self.with_state(|state| {
            state.check("users")?;

            if state.users.iter().any(|u| u.email == user.email) {
                return Err(conflict("users", format!("email {} already registered", user.email)));
            }

            let mut stored = user.clone();
            if stored.id.is_none() {
                stored.id = Some(state.allocate_id());
            }

            debug!("Inserted user {}", stored.email);
            state.users.push(stored.clone());
            Ok(stored)
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_state(|state| {
            state.check("users")?;
            Ok(state.users.iter().find(|u| u.email == email).cloned())
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn upload(&self, upload: Upload) -> Result<String> {
        let url = self.public_url(&upload.path);
        self.with_state(|state| {
            if state.failing.contains(STORAGE_RESOURCE) {
                return Err(LessonError::Upload {
                    path: upload.path.clone(),
                    message: "injected failure".to_string(),
                });
            }
            debug!("Stored object {} ({} bytes)", upload.path, upload.bytes.len());
            state.objects.insert(upload.path.clone(), upload);
            Ok(url)
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base, path.trim_start_matches('/'))
    }
}
