//! lesson-rest - Backend access for the lesson catalog
//!
//! This crate talks to a REST-over-Postgres endpoint and its object storage
//! API. It also ships an in-memory backend with the same traits, used by
//! tests and offline runs.
//!
//! # Backends
//!
//! - [`RestClient`]: HTTP client sending the `apikey` and bearer headers,
//!   PostgREST-style `order=` and `eq.` filters, and storage uploads.
//! - [`MemoryBackend`]: in-process collections with injectable failures.

mod memory;
mod rest;

pub use memory::{MemoryBackend, STORAGE_RESOURCE};
pub use rest::RestClient;

// Re-export the backend traits for convenience
pub use lesson_core::{ObjectStore, RecordSink, RecordSource, Upload};
