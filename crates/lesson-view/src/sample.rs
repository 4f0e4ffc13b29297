//! Static course shown when the backend cannot be reached.

use lesson_core::{CourseData, Lesson, Unit};

struct SampleLesson {
    id: i64,
    description: &'static str,
    metadata: &'static str,
    duration: &'static str,
    icon: &'static str,
    progress: Option<u8>,
}

const fn sample(
    id: i64,
    description: &'static str,
    metadata: &'static str,
    duration: &'static str,
    icon: &'static str,
    progress: Option<u8>,
) -> SampleLesson {
    SampleLesson {
        id,
        description,
        metadata,
        duration,
        icon,
        progress,
    }
}

const UNITS: [(&str, &[SampleLesson]); 3] = [
    (
        "Why I created this course.",
        &[
            sample(
                1,
                "Introduction to the course and overview of key concepts",
                "Subject: Math • Audience: Middle • Level: Developing",
                "6:30",
                "rocket",
                None,
            ),
            sample(
                2,
                "Getting started with foundational principles and practice exercises",
                "Subject: Science • Audience: Elementary • Level: Applied",
                "4:40",
                "target",
                None,
            ),
            sample(
                3,
                "Core concepts and advanced understanding",
                "Subject: Math • Audience: High • Level: Foundational",
                "6:20",
                "plant",
                Some(50),
            ),
        ],
    ),
    (
        "Learn the basics first or fail on the long run.",
        &[
            sample(
                4,
                "Fundamentals and core principles for building a strong foundation",
                "Subject: Science • Audience: Middle • Level: Developing",
                "7:23",
                "globe",
                None,
            ),
            sample(
                5,
                "Building blocks of understanding with practical applications",
                "Subject: Math • Audience: Elementary • Level: Applied",
                "6:30",
                "user",
                None,
            ),
            sample(
                6,
                "Practice exercises to reinforce learning and build confidence",
                "Subject: Science • Audience: High • Level: Transformational",
                "8:12",
                "tool",
                None,
            ),
            sample(
                7,
                "Advanced techniques for mastery and deeper understanding",
                "Subject: Math • Audience: Middle • Level: Foundational",
                "3:10",
                "eye",
                Some(50),
            ),
        ],
    ),
    (
        "Let's build some nice stuff.",
        &[
            sample(
                8,
                "Project setup and initial configuration for success",
                "Subject: Technology • Audience: High • Level: Applied",
                "7:23",
                "broadcast",
                None,
            ),
            sample(
                9,
                "Implementation strategies and best practices",
                "Subject: Science • Audience: Middle • Level: Transformational",
                "6:30",
                "card",
                None,
            ),
            sample(
                10,
                "Final touches and refinement for excellence",
                "Subject: Math • Audience: High • Level: Foundational",
                "8:12",
                "hourglass",
                None,
            ),
        ],
    ),
];

/// Fallback course: three units, ten lessons.
pub fn sample_course_data() -> CourseData {
    let units = UNITS
        .iter()
        .map(|(name, lessons)| Unit {
            name: name.to_string(),
            description: Some(name.to_string()),
            lessons: lessons.iter().map(to_lesson).collect(),
        })
        .collect();

    CourseData { units }
}

fn to_lesson(sample: &SampleLesson) -> Lesson {
    let mut lesson = Lesson::new(
        sample.id,
        &format!("Lesson {}", sample.id),
        sample.description,
        sample.metadata,
    );
    lesson.duration = Some(sample.duration.to_string());
    lesson.icon = Some(sample.icon.to_string());
    if let Some(progress) = sample.progress {
        lesson = lesson.with_progress(progress);
    }
    lesson.lesson_plan_url = Some(format!("/lessons/{}/plan", sample.id));
    lesson.pptx_url = Some(format!("/lessons/{}/pptx", sample.id));
    lesson
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_shape() {
        let data = sample_course_data();
        assert_eq!(data.units.len(), 3);
        assert_eq!(data.lesson_count(), 10);
        assert!(data.units.iter().all(|u| !u.lessons.is_empty()));
        assert!(data
            .units
            .iter()
            .flat_map(|u| &u.lessons)
            .all(|l| !l.description.is_empty() && l.lesson_plan_url.is_some()));
    }

    #[test]
    fn test_sample_progress() {
        let data = sample_course_data();
        let in_progress: Vec<String> = data
            .units
            .iter()
            .flat_map(|u| &u.lessons)
            .filter(|l| l.progress == Some(50))
            .map(|l| l.title.clone())
            .collect();
        assert_eq!(in_progress, vec!["Lesson 3", "Lesson 7"]);
    }
}
