//! lesson-view - Course view model for the lesson catalog
//!
//! This crate turns the flat backend collections into the nested
//! `CourseData -> Unit -> Lesson` structure that presentation code renders.
//!
//! # Features
//!
//! - Single indexed join of groups, topics, lessons and files
//! - Attachment resolution with type sniffing and public URL resolution
//! - Composite `#unit.topic.lesson.audience` numbering
//! - Pure grade, unit and search filters
//! - Static fallback dataset and a loader that falls back to it
//!
//! # Example
//!
//! ```rust,ignore
//! use lesson_view::{CourseLoader, AssembleOptions, GradeFilter, ViewFilter};
//! use std::sync::Arc;
//!
//! let loader = CourseLoader::new(Arc::new(client), AssembleOptions::default());
//! let outcome = loader.load().await;
//! let filter = ViewFilter::new(GradeFilter::Only(Audience::Middle));
//! let visible = filter.apply(&outcome.data);
//! ```

mod assemble;
mod filter;
mod loader;
mod sample;

pub use assemble::{assemble, next_topic_number, strip_number_prefix, AssembleOptions};
pub use filter::{filter_by_grade, lesson_count, search_units, select_unit, GradeFilter, ViewFilter};
pub use loader::{
    fetch_record_set, CourseLoader, DataOrigin, LoadOutcome, LoadTicket, ViewSession,
    FALLBACK_ADVISORY,
};
pub use sample::sample_course_data;

// Re-export the view model for convenience
pub use lesson_core::{CourseData, Lesson, Unit};
