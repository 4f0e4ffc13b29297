//! Pure in-memory filters over the course view model.

use lesson_core::{Audience, CourseData, LessonError, Unit};

/// Grade selection for browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradeFilter {
    /// No filtering.
    #[default]
    All,
    Only(Audience),
}

impl GradeFilter {
    /// Whether a lesson with this metadata passes the filter.
    ///
    /// Matching is a case-insensitive substring test on the metadata string.
    pub fn matches(&self, metadata: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(audience) => metadata
                .to_lowercase()
                .contains(&audience.as_str().to_lowercase()),
        }
    }
}

impl std::fmt::Display for GradeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Only(audience) => write!(f, "{}", audience),
        }
    }
}

impl std::str::FromStr for GradeFilter {
    type Err = LessonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Keep lessons matching the grade and drop units left empty.
///
/// `GradeFilter::All` returns the input unchanged.
pub fn filter_by_grade(data: &CourseData, grade: &GradeFilter) -> CourseData {
    if *grade == GradeFilter::All {
        return data.clone();
    }

    let units = data
        .units
        .iter()
        .filter_map(|unit| {
            let lessons: Vec<_> = unit
                .lessons
                .iter()
                .filter(|l| grade.matches(&l.metadata))
                .cloned()
                .collect();

            (!lessons.is_empty()).then(|| Unit {
                name: unit.name.clone(),
                description: unit.description.clone(),
                lessons,
            })
        })
        .collect();

    CourseData { units }
}

/// Keep only the unit with exactly this name.
pub fn select_unit(data: &CourseData, name: &str) -> CourseData {
    CourseData {
        units: data
            .units
            .iter()
            .filter(|u| u.name == name)
            .cloned()
            .collect(),
    }
}

/// Keep units whose name contains the query, ignoring case.
///
/// Lesson content is never searched. A blank query keeps every unit.
pub fn search_units(data: &CourseData, query: &str) -> CourseData {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return data.clone();
    }

    CourseData {
        units: data
            .units
            .iter()
            .filter(|u| u.name.to_lowercase().contains(&query))
            .cloned()
            .collect(),
    }
}

/// Number of lessons in a unit visible under a grade filter.
pub fn lesson_count(unit: &Unit, grade: &GradeFilter) -> usize {
    unit.lessons
        .iter()
        .filter(|l| grade.matches(&l.metadata))
        .count()
}

/// Combined browse filter: grade, then unit, then search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFilter {
    pub grade: GradeFilter,

    /// Exact unit name to show on its own.
    pub unit: Option<String>,

    /// Unit name search text.
    pub search: String,
}

impl ViewFilter {
    pub fn new(grade: GradeFilter) -> Self {
        Self {
            grade,
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Apply every filter to the data.
    pub fn apply(&self, data: &CourseData) -> CourseData {
        let mut filtered = filter_by_grade(data, &self.grade);
        if let Some(unit) = &self.unit {
            filtered = select_unit(&filtered, unit);
        }
        search_units(&filtered, &self.search)
    }
}
