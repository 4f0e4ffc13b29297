//! Configuration types for the lesson catalog.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{LessonError, Result};

/// Environment variable holding the backend base URL.
pub const ENV_API_URL: &str = "LESSONS_API_URL";

/// Environment variable holding the backend API key.
pub const ENV_API_KEY: &str = "LESSONS_API_KEY";

/// Environment variable overriding the storage bucket.
pub const ENV_STORAGE_BUCKET: &str = "LESSONS_STORAGE_BUCKET";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonsConfig {
    /// Backend connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Collection names.
    #[serde(default)]
    pub tables: TableConfig,

    /// File storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Browsing behaviour.
    #[serde(default)]
    pub browse: BrowseConfig,
}

/// Backend connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST endpoint (e.g. `https://project.example.co`).
    #[serde(default)]
    pub url: String,

    /// API key, sent as `apikey` and as the bearer token.
    #[serde(default)]
    pub api_key: String,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

/// Collection names on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_groups_table")]
    pub groups: String,

    #[serde(default = "default_topics_table")]
    pub topics: String,

    #[serde(default = "default_lessons_table")]
    pub lessons: String,

    #[serde(default = "default_files_table")]
    pub files: String,

    #[serde(default = "default_users_table")]
    pub users: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            groups: default_groups_table(),
            topics: default_topics_table(),
            lessons: default_lessons_table(),
            files: default_files_table(),
            users: default_users_table(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket that receives lesson files.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Overwrite an existing object at the same path.
    #[serde(default)]
    pub upsert: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            upsert: false,
        }
    }
}

/// Browsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// Column curriculum groups are ordered by (`id` or `unit`).
    #[serde(default = "default_group_order")]
    pub group_order: String,

    /// Prefix metadata with `#unit.topic.lesson.audience` numbers.
    #[serde(default = "default_true")]
    pub composite_numbering: bool,

    /// Keep the source record on each lesson for detail views.
    #[serde(default)]
    pub keep_full_data: bool,

    /// Resolve bare storage paths in file URLs to public bucket URLs.
    #[serde(default = "default_true")]
    pub resolve_storage_paths: bool,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            group_order: default_group_order(),
            composite_numbering: true,
            keep_full_data: false,
            resolve_storage_paths: true,
        }
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_groups_table() -> String {
    "curriculum_groups".to_string()
}

fn default_topics_table() -> String {
    "topics".to_string()
}

fn default_lessons_table() -> String {
    "lessons".to_string()
}

fn default_files_table() -> String {
    "lesson_files".to_string()
}

fn default_users_table() -> String {
    "users".to_string()
}

fn default_bucket() -> String {
    "lesson-files".to_string()
}

fn default_group_order() -> String {
    "id".to_string()
}

impl LessonsConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| LessonError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lessons").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("lessons.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Override backend settings from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.url = url;
        }
        if let Some(key) = var(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.backend.api_key = key;
        }
        if let Some(bucket) = var(ENV_STORAGE_BUCKET).filter(|v| !v.trim().is_empty()) {
            self.storage.bucket = bucket;
        }
    }

    /// Check that the backend can be contacted with this configuration.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.url.trim();
        if url.is_empty() {
            return Err(LessonError::config(format!(
                "backend URL is not set (use [backend].url or {})",
                ENV_API_URL
            )));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(LessonError::config(format!(
                "backend URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        if self.backend.api_key.trim().is_empty() {
            return Err(LessonError::config(format!(
                "backend API key is not set (use [backend].api_key or {})",
                ENV_API_KEY
            )));
        }
        Ok(())
    }
}
