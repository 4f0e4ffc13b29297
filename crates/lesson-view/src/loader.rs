//! Fetch, assemble and fall back.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use lesson_core::{
    CourseData, CurriculumGroup, LessonError, LessonFile, LessonRecord, RecordSet, RecordSource,
    Result, Topic,
};

use crate::assemble::{assemble, AssembleOptions};
use crate::sample::sample_course_data;

/// Message shown alongside the fallback course.
pub const FALLBACK_ADVISORY: &str =
    "Could not load data from the lesson service. Using sample data.";

/// Fetch the four collections concurrently.
///
/// Groups and lessons are required; files and topics degrade to empty.
/// Returns `Ok(None)` when the backend has no curriculum groups.
pub async fn fetch_record_set<S>(source: &S) -> Result<Option<RecordSet>>
where
    S: RecordSource + ?Sized,
{
    let (groups, topics, lessons, files): (
        Result<Vec<CurriculumGroup>>,
        Result<Vec<Topic>>,
        Result<Vec<LessonRecord>>,
        Result<Vec<LessonFile>>,
    ) = tokio::join!(
        source.fetch_groups(),
        source.fetch_topics(),
        source.fetch_lessons(),
        source.fetch_files()
    );

    let groups = groups?;
    if groups.is_empty() {
        info!("Backend returned no curriculum groups");
        return Ok(None);
    }

    let lessons = lessons?;

    let files = files.unwrap_or_else(|e| {
        warn!("Continuing without lesson files: {}", e);
        Vec::new()
    });
    let topics = topics.unwrap_or_else(|e| {
        warn!("Continuing without topics: {}", e);
        Vec::new()
    });

    debug!(
        "Fetched {} groups, {} topics, {} lessons, {} files",
        groups.len(),
        topics.len(),
        lessons.len(),
        files.len()
    );

    Ok(Some(RecordSet {
        groups,
        topics,
        lessons,
        files,
    }))
}

/// Where a loaded course came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Live,
    Fallback,
}

/// Result of a load: always a course, plus an advisory when it is the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub data: CourseData,
    pub origin: DataOrigin,
    pub advisory: Option<String>,
}

impl LoadOutcome {
    fn live(data: CourseData) -> Self {
        Self {
            data,
            origin: DataOrigin::Live,
            advisory: None,
        }
    }

    fn fallback() -> Self {
        Self {
            data: sample_course_data(),
            origin: DataOrigin::Fallback,
            advisory: Some(FALLBACK_ADVISORY.to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == DataOrigin::Fallback
    }
}

/// Loads the course view model from a record source.
pub struct CourseLoader<S: ?Sized> {
    source: Arc<S>,
    options: AssembleOptions,
}

impl<S> CourseLoader<S>
where
    S: RecordSource + ?Sized,
{
    pub fn new(source: Arc<S>, options: AssembleOptions) -> Self {
        Self { source, options }
    }

    /// Fetch and assemble without falling back.
    ///
    /// Fails with [`LessonError::NoData`] when the backend has no groups.
    pub async fn fetch(&self) -> Result<CourseData> {
        let records = fetch_record_set(self.source.as_ref())
            .await?
            .ok_or(LessonError::NoData)?;
        Ok(assemble(&records, &self.options))
    }

    /// Fetch and assemble, substituting the sample course on any failure.
    pub async fn load(&self) -> LoadOutcome {
        match self.fetch().await {
            Ok(data) => {
                info!(
                    "Loaded {} units with {} lessons",
                    data.units.len(),
                    data.lesson_count()
                );
                LoadOutcome::live(data)
            }
            Err(e) => {
                warn!("Falling back to sample data: {}", e);
                LoadOutcome::fallback()
            }
        }
    }

    /// Load into a view session, discarding the result if it went stale.
    pub async fn load_into(&self, session: &ViewSession) -> bool {
        let ticket = session.begin();
        let outcome = self.load().await;
        session.commit(ticket, outcome)
    }
}

/// Proof that a load was started in a given session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    closed: bool,
    current: Option<LoadOutcome>,
}

/// Transient state of one open view.
///
/// Each `begin` starts a new generation. Results from an older generation,
/// or arriving after `close`, are dropped instead of overwriting newer state.
#[derive(Default)]
pub struct ViewSession {
    state: Mutex<SessionState>,
}

impl ViewSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a load and invalidate any load still in flight.
    pub fn begin(&self) -> LoadTicket {
        let mut state = self.lock();
        state.generation += 1;
        LoadTicket {
            generation: state.generation,
        }
    }

    /// Store an outcome if its ticket is still current.
    pub fn commit(&self, ticket: LoadTicket, outcome: LoadOutcome) -> bool {
        let mut state = self.lock();
        if state.closed || ticket.generation != state.generation {
            debug!(
                "Discarding stale load (ticket {}, current {})",
                ticket.generation, state.generation
            );
            return false;
        }
        state.current = Some(outcome);
        true
    }

    /// Tear down the view; later commits are ignored.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.generation += 1;
        state.current = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Latest committed outcome.
    pub fn current(&self) -> Option<LoadOutcome> {
        self.lock().current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::{MaterialType, RecordId};
    use lesson_rest::MemoryBackend;

    fn records() -> RecordSet {
        RecordSet {
            groups: vec![CurriculumGroup {
                id: RecordId::from("u1"),
                name: "Intro".to_string(),
                unit: Some(1),
                description: None,
            }],
            topics: vec![Topic {
                id: RecordId::from("t1"),
                name: Some("Counting".to_string()),
                relevant_unit: RecordId::from("u1"),
                topic_number: Some(1),
            }],
            lessons: vec![LessonRecord {
                id: Some(RecordId::Int(1)),
                title: "L1".to_string(),
                topic: Some(RecordId::from("t1")),
                curriculum_group_id: Some(RecordId::from("u1")),
                lesson_number: Some(2),
                target_audience: Some("Middle".to_string()),
                ..Default::default()
            }],
            files: vec![LessonFile {
                id: None,
                lesson_id: RecordId::Int(1),
                file_url: Some("https://cdn.example/plan.pdf".to_string()),
                file_type: None,
                material_type: Some(MaterialType::LessonPlan),
            }],
        }
    }

    fn loader(backend: MemoryBackend) -> CourseLoader<MemoryBackend> {
        CourseLoader::new(Arc::new(backend), AssembleOptions::default())
    }

    #[tokio::test]
    async fn test_live_load() {
        let outcome = loader(MemoryBackend::from_records(records())).load().await;

        assert_eq!(outcome.origin, DataOrigin::Live);
        assert_eq!(outcome.advisory, None);
        let lesson = &outcome.data.units[0].lessons[0];
        assert_eq!(lesson.metadata, "#1.1.2.2 • Audience: Middle");
        assert_eq!(lesson.lesson_plan_url.as_deref(), Some("https://cdn.example/plan.pdf"));
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back() {
        for resource in ["curriculum_groups", "lessons"] {
            let backend = MemoryBackend::from_records(records()).fail_on(resource);
            let outcome = loader(backend).load().await;

            assert!(outcome.is_fallback());
            assert_eq!(outcome.data, sample_course_data());
            assert_eq!(outcome.advisory.as_deref(), Some(FALLBACK_ADVISORY));
        }
    }

    #[tokio::test]
    async fn test_no_groups_falls_back() {
        let outcome = loader(MemoryBackend::new()).load().await;
        assert!(outcome.is_fallback());
        assert!(outcome.advisory.is_some());
    }

    #[tokio::test]
    async fn test_fetch_reports_no_data() {
        let err = loader(MemoryBackend::new()).fetch().await.unwrap_err();
        assert!(matches!(err, LessonError::NoData));
    }

    #[tokio::test]
    async fn test_secondary_failures_degrade() {
        let backend = MemoryBackend::from_records(records())
            .fail_on("lesson_files")
            .fail_on("topics");
        let outcome = loader(backend).load().await;

        assert_eq!(outcome.origin, DataOrigin::Live);
        let lesson = &outcome.data.units[0].lessons[0];
        assert_eq!(lesson.lesson_plan_url, None);
        assert_eq!(lesson.metadata, "Audience: Middle");
    }

    #[tokio::test]
    async fn test_fetch_record_set_through_trait_object() {
        let source: Arc<dyn RecordSource> = Arc::new(MemoryBackend::from_records(records()));
        let set = fetch_record_set(source.as_ref()).await.unwrap().unwrap();
        assert_eq!(set.lessons.len(), 1);
        assert_eq!(set.files.len(), 1);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let session = ViewSession::new();
        let first = session.begin();
        let second = session.begin();

        assert!(!session.commit(first, LoadOutcome::fallback()));
        assert!(session.current().is_none());

        assert!(session.commit(second, LoadOutcome::live(CourseData::default())));
        assert_eq!(session.current().map(|o| o.origin), Some(DataOrigin::Live));
    }

    #[test]
    fn test_commit_after_close_is_ignored() {
        let session = ViewSession::new();
        let ticket = session.begin();
        session.close();

        assert!(session.is_closed());
        assert!(!session.commit(ticket, LoadOutcome::fallback()));
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn test_load_into_session() {
        let session = ViewSession::new();
        let loader = loader(MemoryBackend::from_records(records()));

        assert!(loader.load_into(&session).await);
        assert_eq!(session.current().map(|o| o.data.lesson_count()), Some(1));
    }
}
