//! Plain-text output.

use std::fmt::Write;

use lesson_core::{CourseData, LessonRecord};
use lesson_view::{lesson_count, search_units, GradeFilter};

/// Course grouped by unit, one block per lesson.
pub fn course(data: &CourseData) -> String {
    let mut out = String::new();

    if data.is_empty() {
        out.push_str("No lessons match.\n");
        return out;
    }

    for unit in &data.units {
        let _ = writeln!(out, "{} ({} lessons)", unit.name, unit.lessons.len());
        if let Some(description) = unit.description.as_deref().filter(|d| *d != unit.name) {
            let _ = writeln!(out, "  {}", description);
        }

        for (idx, lesson) in unit.lessons.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", idx + 1, lesson.title);
            if !lesson.metadata.is_empty() {
                let _ = writeln!(out, "     {}", lesson.metadata);
            }
            let _ = writeln!(out, "     {}", lesson.description);
            if let Some(progress) = lesson.progress {
                let _ = writeln!(out, "     progress: {}%", progress);
            }
            if let Some(url) = &lesson.lesson_plan_url {
                let _ = writeln!(out, "     plan: {}", url);
            }
            if let Some(url) = &lesson.pptx_url {
                let _ = writeln!(out, "     slides: {}", url);
            }
        }
        out.push('\n');
    }

    out
}

/// Unit names with per-grade lesson counts.
///
/// Units are matched against the search text only. Under a grade filter, units
/// with no matching lessons are left out.
pub fn sidebar(data: &CourseData, grade: &GradeFilter, search: &str) -> String {
    let mut out = String::new();

    for unit in &search_units(data, search).units {
        let count = lesson_count(unit, grade);
        if *grade != GradeFilter::All && count == 0 {
            continue;
        }
        let _ = writeln!(out, "{} ({})", unit.name, count);
    }

    out
}

/// One source lesson row.
pub fn record(lesson: &LessonRecord) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", lesson.title);
    if let Some(id) = &lesson.id {
        let _ = writeln!(out, "  id: {}", id);
    }
    for (label, value) in [
        ("subject", lesson.subject.as_deref()),
        ("audience", lesson.target_audience.as_deref()),
        ("level", lesson.level.as_deref()),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "  {}: {}", label, value);
        }
    }
    if let Some(objectives) = &lesson.learning_objectives {
        let _ = writeln!(out, "  objectives: {}", objectives.items().join(", "));
    }
    if let Some(activities) = &lesson.teaching_activities {
        let _ = writeln!(out, "  activities: {}", activities.items().join(", "));
    }
    for (label, value) in [
        ("application", lesson.application.as_deref()),
        ("assessment", lesson.assessment.as_deref()),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "  {}: {}", label, value);
        }
    }
    if let Some(refs) = &lesson.refs {
        let _ = writeln!(out, "  refs: {}", refs.items().join(", "));
    }
    if let Some(time) = lesson.upload_time {
        let _ = writeln!(out, "  uploaded: {}", time.format("%Y-%m-%d %H:%M UTC"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::{Audience, Lesson, RecordId, TextOrList, Unit};
    use lesson_view::sample_course_data;

    #[test]
    fn test_course_lists_lessons_under_units() {
        let mut lesson = Lesson::new(1i64, "Ratios", "", "Audience: Middle");
        lesson.pptx_url = Some("https://cdn.example/deck.pptx".to_string());
        let data = CourseData {
            units: vec![Unit {
                name: "Intro".to_string(),
                description: Some("Intro".to_string()),
                lessons: vec![lesson],
            }],
        };

        let text = course(&data);
        assert!(text.starts_with("Intro (1 lessons)\n  1. Ratios\n"));
        assert!(text.contains(Lesson::NO_DESCRIPTION));
        assert!(text.contains("slides: https://cdn.example/deck.pptx"));
        assert!(!text.contains("plan:"));
    }

    #[test]
    fn test_empty_course() {
        assert_eq!(course(&CourseData::default()), "No lessons match.\n");
    }

    #[test]
    fn test_record_skips_missing_fields() {
        let lesson = LessonRecord {
            id: Some(RecordId::Int(3)),
            title: "Derivatives".to_string(),
            level: Some("Applied".to_string()),
            ..Default::default()
        };
        assert_eq!(record(&lesson), "Derivatives\n  id: 3\n  level: Applied\n");
    }

    #[test]
    fn test_record_shows_teaching_fields() {
        let lesson = LessonRecord {
            title: "Ratios".to_string(),
            teaching_activities: Some(TextOrList::List(vec![
                "Warm-up".to_string(),
                "Pair work".to_string(),
            ])),
            application: Some("Recipe scaling".to_string()),
            assessment: Some("Exit ticket".to_string()),
            refs: Some(TextOrList::Text("Chapter 4".to_string())),
            ..Default::default()
        };
        assert_eq!(
            record(&lesson),
            "Ratios\n  activities: Warm-up, Pair work\n  application: Recipe scaling\n  \
             assessment: Exit ticket\n  refs: Chapter 4\n"
        );
    }

    #[test]
    fn test_sidebar_follows_search() {
        let data = sample_course_data();

        let all = sidebar(&data, &GradeFilter::All, "");
        assert_eq!(all.lines().count(), 3);

        let text = sidebar(&data, &GradeFilter::All, "BASICS");
        assert_eq!(text, "Learn the basics first or fail on the long run. (4)\n");
    }

    #[test]
    fn test_sidebar_hides_units_without_grade_matches() {
        let data = sample_course_data();

        let text = sidebar(&data, &GradeFilter::Only(Audience::Elementary), "");
        assert_eq!(
            text,
            "Why I created this course. (1)\nLearn the basics first or fail on the long run. (1)\n"
        );
    }
}
