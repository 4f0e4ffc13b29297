//! lesson-entry - Data entry for the lesson catalog
//!
//! This crate implements the insert-only write path used by operators to
//! add content: a lesson row, its uploaded files, and the topics and users
//! lessons refer to.
//!
//! # Operations
//!
//! - [`EntryService::submit`] - validate a form, insert the lesson, upload
//!   attached files and record them
//! - [`EntryService::ensure_topic`] - get or create a topic in a unit
//! - [`EntryService::ensure_user`] - get or create an uploader by email
//! - [`EntryService::suggest_topic_number`] - next free topic number

mod form;
mod service;

pub use form::{content_type_for, sanitize_file_name, Attachment, LessonForm};
pub use service::{EntryService, FileOutcome, Status, StatusKind, SubmitReport};
