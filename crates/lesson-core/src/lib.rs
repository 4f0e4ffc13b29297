//! lesson-core - Core types and traits for the lesson catalog
//!
//! This crate provides the flat source records served by the lesson backend,
//! the nested view model built from them, the traits at the backend seams,
//! and the shared error and configuration types.

pub mod config;
pub mod error;
pub mod records;
pub mod traits;
pub mod view;

pub use config::*;
pub use error::{LessonError, Result};
pub use records::*;
pub use traits::*;
pub use view::*;
