//! Join flat backend records into the nested course view model.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use lesson_core::{
    BrowseConfig, CourseData, CurriculumGroup, Lesson, LessonFile, LessonRecord, MaterialType,
    RecordId, RecordSet, Topic, Unit, METADATA_SEPARATOR,
};

/// Leading composite number such as `1.2.3.2 - ` in a stored title.
static NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(\.\d+)?\s*-?\s*").expect("Invalid regex pattern for title prefix")
});

/// Options for an assembly pass.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Prepend `#unit.topic.lesson.audience` to metadata and strip stored
    /// number prefixes from titles.
    pub composite_numbering: bool,

    /// Keep the source record on each lesson.
    pub keep_full_data: bool,

    /// Public storage prefix used to resolve bare object paths.
    pub public_base: Option<String>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            composite_numbering: true,
            keep_full_data: false,
            public_base: None,
        }
    }
}

impl AssembleOptions {
    /// Build options from the browse configuration.
    ///
    /// `public_base` is ignored when storage path resolution is disabled.
    pub fn from_config(config: &BrowseConfig, public_base: Option<String>) -> Self {
        Self {
            composite_numbering: config.composite_numbering,
            keep_full_data: config.keep_full_data,
            public_base: public_base.filter(|_| config.resolve_storage_paths),
        }
    }
}

/// Lookup tables built once per assembly pass.
struct Indexes<'a> {
    topics: HashMap<&'a RecordId, &'a Topic>,
    lessons_by_unit: HashMap<&'a RecordId, Vec<&'a LessonRecord>>,
    files_by_lesson: HashMap<&'a RecordId, Vec<&'a LessonFile>>,
}

impl<'a> Indexes<'a> {
    fn build(records: &'a RecordSet) -> Self {
        let topics: HashMap<&RecordId, &Topic> =
            records.topics.iter().map(|t| (&t.id, t)).collect();

        let mut lessons_by_unit: HashMap<&RecordId, Vec<&LessonRecord>> = HashMap::new();
        for lesson in &records.lessons {
            let via_topic = lesson
                .topic
                .as_ref()
                .and_then(|id| topics.get(id).copied())
                .map(|t| &t.relevant_unit);

            match via_topic.or(lesson.curriculum_group_id.as_ref()) {
                Some(unit) => lessons_by_unit.entry(unit).or_default().push(lesson),
                None => debug!("Lesson {:?} has no unit, skipping", lesson.id),
            }
        }

        let mut files_by_lesson: HashMap<&RecordId, Vec<&LessonFile>> = HashMap::new();
        for file in &records.files {
            files_by_lesson.entry(&file.lesson_id).or_default().push(file);
        }

        Self {
            topics,
            lessons_by_unit,
            files_by_lesson,
        }
    }
}

/// Assemble the nested view model from flat records.
///
/// Units follow the group order, lessons follow the fetched order, and a
/// unit with no lessons is left out. Every derived field is recomputed, so
/// assembling the same records twice yields equal output.
pub fn assemble(records: &RecordSet, options: &AssembleOptions) -> CourseData {
    let indexes = Indexes::build(records);
    let mut units = Vec::with_capacity(records.groups.len());

    for group in &records.groups {
        let lessons: Vec<Lesson> = indexes
            .lessons_by_unit
            .get(&group.id)
            .map(|lessons| {
                lessons
                    .iter()
                    .filter_map(|lesson| build_lesson(group, lesson, &indexes, options))
                    .collect()
            })
            .unwrap_or_default();

        if lessons.is_empty() {
            debug!("Unit '{}' has no lessons, dropping", group.name);
            continue;
        }

        units.push(Unit {
            name: group.name.clone(),
            description: group.description.clone(),
            lessons,
        });
    }

    debug!(
        "Assembled {} units from {} groups and {} lessons",
        units.len(),
        records.groups.len(),
        records.lessons.len()
    );

    CourseData { units }
}

fn build_lesson(
    group: &CurriculumGroup,
    record: &LessonRecord,
    indexes: &Indexes<'_>,
    options: &AssembleOptions,
) -> Option<Lesson> {
    let Some(id) = record.id.clone() else {
        debug!("Lesson '{}' has no id, skipping", record.title);
        return None;
    };

    let topic = record
        .topic
        .as_ref()
        .and_then(|id| indexes.topics.get(id))
        .copied();

    let (title, number) = if options.composite_numbering {
        (
            strip_number_prefix(&record.title).to_string(),
            composite_number(group, topic, record),
        )
    } else {
        (record.title.clone(), None)
    };

    let mut lesson = Lesson::new(id, &title, &describe(record), &metadata(record, number));

    let files = record
        .id
        .as_ref()
        .and_then(|id| indexes.files_by_lesson.get(id))
        .map(Vec::as_slice)
        .unwrap_or_default();
    let public_base = options.public_base.as_deref();

    lesson.lesson_plan_url = attachment(files, MaterialType::LessonPlan)
        .and_then(|f| resolve_url(f.file_url.as_deref(), public_base));
    lesson.pptx_url = attachment(files, MaterialType::LessonPpt)
        .and_then(|f| resolve_url(f.file_url.as_deref(), public_base));

    if options.keep_full_data {
        lesson.full_data = Some(record.clone());
    }

    Some(lesson)
}

/// Remove a leading composite number from a title.
///
/// A title that would become empty is returned unchanged.
pub fn strip_number_prefix(title: &str) -> &str {
    match NUMBER_PREFIX.find(title) {
        Some(prefix) if !title[prefix.end()..].trim().is_empty() => &title[prefix.end()..],
        _ => title,
    }
}

/// `#unit.topic.lesson.audience`, only when all four parts resolve.
fn composite_number(
    group: &CurriculumGroup,
    topic: Option<&Topic>,
    record: &LessonRecord,
) -> Option<String> {
    let unit = group.unit?;
    let topic = topic?.topic_number?;
    let lesson = record.lesson_number?;
    let audience = record.audience()?.code();
    Some(format!("#{}.{}.{}.{}", unit, topic, lesson, audience))
}

fn metadata(record: &LessonRecord, number: Option<String>) -> String {
    let labelled = [
        ("Subject", record.subject.as_deref()),
        ("Audience", record.target_audience.as_deref()),
        ("Level", record.level.as_deref()),
    ];

    let mut parts: Vec<String> = number.into_iter().collect();
    for (label, value) in labelled {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            parts.push(format!("{}: {}", label, value));
        }
    }

    parts.join(METADATA_SEPARATOR)
}

fn describe(record: &LessonRecord) -> String {
    if let Some(description) = record
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    {
        return description.to_string();
    }

    let objectives = record
        .learning_objectives
        .as_ref()
        .map(|o| o.items().join(", "))
        .unwrap_or_default();

    if objectives.is_empty() {
        Lesson::NO_DESCRIPTION.to_string()
    } else {
        objectives
    }
}

/// First file of the given kind.
///
/// An explicit `material_type` wins. Without one, untyped files are sniffed
/// by `file_type` and then by the URL extension.
fn attachment<'a>(files: &[&'a LessonFile], kind: MaterialType) -> Option<&'a LessonFile> {
    files
        .iter()
        .find(|f| f.material_type == Some(kind))
        .or_else(|| {
            files
                .iter()
                .filter(|f| f.material_type.is_none())
                .find(|f| sniff(f) == Some(kind))
        })
        .copied()
}

fn sniff(file: &LessonFile) -> Option<MaterialType> {
    file.file_type
        .as_deref()
        .and_then(kind_from_file_type)
        .or_else(|| file.file_url.as_deref().and_then(kind_from_url))
}

fn kind_from_file_type(file_type: &str) -> Option<MaterialType> {
    let token = file_type.trim().to_lowercase();
    let token = token.trim_start_matches('.');
    let subtype = token.rsplit('/').next().unwrap_or(token);

    if token.contains("ppt") || token.contains("presentation") || token.contains("powerpoint") {
        Some(MaterialType::LessonPpt)
    } else if token.contains("plan") || matches!(subtype, "pdf" | "doc" | "docx") {
        Some(MaterialType::LessonPlan)
    } else {
        None
    }
}

fn kind_from_url(url: &str) -> Option<MaterialType> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = name.rsplit_once('.')?;

    match extension.to_lowercase().as_str() {
        "ppt" | "pptx" => Some(MaterialType::LessonPpt),
        "pdf" | "doc" | "docx" => Some(MaterialType::LessonPlan),
        _ => None,
    }
}

/// Absolute URLs pass through; bare storage paths resolve against the
/// public bucket prefix when one is configured.
fn resolve_url(raw: Option<&str>, public_base: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|u| !u.is_empty())?;

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }

    match public_base {
        Some(base) => Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            raw.trim_start_matches('/')
        )),
        None => Some(raw.to_string()),
    }
}

/// Next free topic number in a unit: the highest used number plus one.
///
/// Saturates at `i64::MAX`.
pub fn next_topic_number(topics: &[Topic], unit: &RecordId) -> i64 {
    topics
        .iter()
        .filter(|t| &t.relevant_unit == unit)
        .filter_map(|t| t.topic_number)
        .max()
        .map_or(1, |n| n.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str, unit: Option<i64>) -> CurriculumGroup {
        CurriculumGroup {
            id: RecordId::from(id),
            name: name.to_string(),
            unit,
            description: None,
        }
    }

    fn lesson(id: i64, title: &str, group: &str) -> LessonRecord {
        LessonRecord {
            id: Some(RecordId::Int(id)),
            title: title.to_string(),
            curriculum_group_id: Some(RecordId::from(group)),
            ..Default::default()
        }
    }

    fn file(lesson_id: i64, url: &str, material: Option<MaterialType>) -> LessonFile {
        LessonFile {
            id: None,
            lesson_id: RecordId::Int(lesson_id),
            file_url: Some(url.to_string()),
            file_type: None,
            material_type: material,
        }
    }

    fn topic(id: &str, unit: &str, number: Option<i64>) -> Topic {
        Topic {
            id: RecordId::from(id),
            name: Some(format!("Topic {}", id)),
            relevant_unit: RecordId::from(unit),
            topic_number: number,
        }
    }

    #[test]
    fn test_single_lesson_unit() {
        let mut l1 = lesson(1, "L1", "u1");
        l1.target_audience = Some("Middle".to_string());
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![l1],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());

        assert_eq!(data.units.len(), 1);
        assert_eq!(data.units[0].name, "Intro");
        let lesson = &data.units[0].lessons[0];
        assert_eq!(lesson.metadata, "Audience: Middle");
        assert!(!lesson.metadata.contains("Subject"));
        assert!(!lesson.metadata.contains("Level"));
        assert_eq!(lesson.lesson_plan_url, None);
        assert_eq!(lesson.pptx_url, None);
    }

    #[test]
    fn test_description_from_objectives() {
        let mut l1 = lesson(1, "L1", "u1");
        l1.learning_objectives = Some(lesson_core::TextOrList::List(vec![
            "A".to_string(),
            "B".to_string(),
        ]));
        let mut l2 = lesson(2, "L2", "u1");
        l2.learning_objectives = Some(lesson_core::TextOrList::Text("Count to ten".to_string()));
        let mut l3 = lesson(3, "L3", "u1");
        l3.description = Some("   ".to_string());

        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![l1, l2, l3],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        let descriptions: Vec<&str> = data.units[0]
            .lessons
            .iter()
            .map(|l| l.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["A, B", "Count to ten", Lesson::NO_DESCRIPTION]);
    }

    #[test]
    fn test_material_type_attachments() {
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![lesson(5, "L5", "u1")],
            files: vec![
                file(5, "https://cdn.example/deck.pptx", Some(MaterialType::LessonPpt)),
                file(5, "https://cdn.example/plan.pdf", Some(MaterialType::LessonPlan)),
            ],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        let lesson = &data.units[0].lessons[0];
        assert_eq!(lesson.lesson_plan_url.as_deref(), Some("https://cdn.example/plan.pdf"));
        assert_eq!(lesson.pptx_url.as_deref(), Some("https://cdn.example/deck.pptx"));
    }

    #[test]
    fn test_first_matching_file_wins() {
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![lesson(5, "L5", "u1")],
            files: vec![
                file(5, "https://cdn.example/first.pdf", Some(MaterialType::LessonPlan)),
                file(5, "https://cdn.example/second.pdf", Some(MaterialType::LessonPlan)),
            ],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        assert_eq!(
            data.units[0].lessons[0].lesson_plan_url.as_deref(),
            Some("https://cdn.example/first.pdf")
        );
    }

    #[test]
    fn test_untyped_files_are_sniffed() {
        let mut typed = file(1, "https://cdn.example/a", None);
        typed.file_type = Some("application/pdf".to_string());
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![lesson(1, "L1", "u1"), lesson(2, "L2", "u1")],
            files: vec![
                typed,
                file(1, "https://cdn.example/slides.PPTX?download=1", None),
                file(2, "https://cdn.example/notes.txt", None),
            ],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        let first = &data.units[0].lessons[0];
        assert_eq!(first.lesson_plan_url.as_deref(), Some("https://cdn.example/a"));
        assert_eq!(
            first.pptx_url.as_deref(),
            Some("https://cdn.example/slides.PPTX?download=1")
        );

        let second = &data.units[0].lessons[1];
        assert_eq!(second.lesson_plan_url, None);
        assert_eq!(second.pptx_url, None);
    }

    #[test]
    fn test_storage_paths_resolve_against_public_base() {
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![lesson(1, "L1", "u1")],
            files: vec![file(1, "1/plan.pdf", Some(MaterialType::LessonPlan))],
            ..Default::default()
        };

        let options = AssembleOptions {
            public_base: Some(
                "https://x.example/storage/v1/object/public/lesson-files/".to_string(),
            ),
            ..Default::default()
        };
        let data = assemble(&records, &options);
        assert_eq!(
            data.units[0].lessons[0].lesson_plan_url.as_deref(),
            Some("https://x.example/storage/v1/object/public/lesson-files/1/plan.pdf")
        );

        let data = assemble(&records, &AssembleOptions::default());
        assert_eq!(data.units[0].lessons[0].lesson_plan_url.as_deref(), Some("1/plan.pdf"));
    }

    #[test]
    fn test_composite_number_requires_all_parts() {
        let mut numbered = lesson(1, "1.2.3.2 - Ratios", "u1");
        numbered.topic = Some(RecordId::from("t1"));
        numbered.lesson_number = Some(3);
        numbered.target_audience = Some("middle".to_string());
        numbered.subject = Some("Math".to_string());

        let mut missing_number = numbered.clone();
        missing_number.id = Some(RecordId::Int(2));
        missing_number.lesson_number = None;

        let records = RecordSet {
            groups: vec![group("u1", "Intro", Some(1))],
            topics: vec![topic("t1", "u1", Some(2))],
            lessons: vec![numbered, missing_number],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        let lessons = &data.units[0].lessons;

        assert_eq!(lessons[0].title, "Ratios");
        assert_eq!(
            lessons[0].metadata,
            "#1.2.3.2 • Subject: Math • Audience: middle"
        );
        assert_eq!(lessons[1].title, "Ratios");
        assert!(!lessons[1].metadata.contains('#'));
    }

    #[test]
    fn test_composite_numbering_disabled() {
        let mut numbered = lesson(1, "1.2.3 Ratios", "u1");
        numbered.topic = Some(RecordId::from("t1"));
        numbered.lesson_number = Some(3);
        numbered.target_audience = Some("High".to_string());

        let records = RecordSet {
            groups: vec![group("u1", "Intro", Some(1))],
            topics: vec![topic("t1", "u1", Some(2))],
            lessons: vec![numbered],
            ..Default::default()
        };

        let options = AssembleOptions {
            composite_numbering: false,
            ..Default::default()
        };
        let data = assemble(&records, &options);
        assert_eq!(data.units[0].lessons[0].title, "1.2.3 Ratios");
        assert_eq!(data.units[0].lessons[0].metadata, "Audience: High");
    }

    #[test]
    fn test_strip_number_prefix() {
        assert_eq!(strip_number_prefix("1.2.3 - Fractions"), "Fractions");
        assert_eq!(strip_number_prefix("1.2.3.1Fractions"), "Fractions");
        assert_eq!(strip_number_prefix("Fractions 1.2.3"), "Fractions 1.2.3");
        assert_eq!(strip_number_prefix("1.2 Fractions"), "1.2 Fractions");
        assert_eq!(strip_number_prefix("1.2.3 - "), "1.2.3 - ");
    }

    #[test]
    fn test_topic_routes_lesson_to_its_unit() {
        let mut l1 = lesson(1, "L1", "u1");
        l1.topic = Some(RecordId::from("t2"));
        let mut orphan = lesson(2, "L2", "u1");
        orphan.curriculum_group_id = None;

        let records = RecordSet {
            groups: vec![group("u1", "Intro", None), group("u2", "Fractions", None)],
            topics: vec![topic("t2", "u2", Some(1))],
            lessons: vec![l1, orphan],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        assert_eq!(data.units.len(), 1);
        assert_eq!(data.units[0].name, "Fractions");
        assert_eq!(data.units[0].lessons.len(), 1);
    }

    #[test]
    fn test_units_keep_group_order_and_drop_empty() {
        let records = RecordSet {
            groups: vec![
                group("u2", "Second", None),
                group("u3", "Empty", None),
                group("u1", "First", None),
            ],
            lessons: vec![lesson(1, "A", "u1"), lesson(2, "B", "u2"), lesson(3, "C", "u1")],
            ..Default::default()
        };

        let data = assemble(&records, &AssembleOptions::default());
        let names: Vec<&str> = data.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);
        let titles: Vec<&str> = data.units[1].lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert!(data.units.iter().all(|u| !u.lessons.is_empty()));
    }

    #[test]
    fn test_full_data_and_repeatable_assembly() {
        let records = RecordSet {
            groups: vec![group("u1", "Intro", None)],
            lessons: vec![lesson(1, "L1", "u1")],
            ..Default::default()
        };
        let options = AssembleOptions {
            keep_full_data: true,
            ..Default::default()
        };

        let first = assemble(&records, &options);
        let second = assemble(&records, &options);
        assert_eq!(first, second);
        assert_eq!(
            first.units[0].lessons[0].full_data.as_ref().map(|r| r.title.as_str()),
            Some("L1")
        );
    }

    #[test]
    fn test_from_config_respects_path_resolution() {
        let mut browse = BrowseConfig::default();
        browse.resolve_storage_paths = false;
        let options = AssembleOptions::from_config(&browse, Some("https://x".to_string()));
        assert_eq!(options.public_base, None);
    }

    #[test]
    fn test_next_topic_number() {
        let topics = vec![
            topic("t1", "u1", Some(1)),
            topic("t2", "u1", Some(4)),
            topic("t3", "u1", None),
            topic("t4", "u2", Some(9)),
        ];
        assert_eq!(next_topic_number(&topics, &RecordId::from("u1")), 5);
        assert_eq!(next_topic_number(&topics, &RecordId::from("u3")), 1);
    }

    #[test]
    fn test_next_topic_number_saturates() {
        let topics = vec![topic("t1", "u1", Some(i64::MAX))];
        assert_eq!(next_topic_number(&topics, &RecordId::from("u1")), i64::MAX);
    }
}
