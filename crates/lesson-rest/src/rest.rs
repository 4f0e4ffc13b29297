//! REST-over-Postgres client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use lesson_core::{
    map_rows, Audience, CurriculumGroup, FromRow, LessonError, LessonFile, LessonRecord,
    LessonsConfig, NewTopic, ObjectStore, RecordId, RecordSink, RecordSource, Result,
    StorageConfig, TableConfig, Topic, Upload, User,
};

/// HTTP client for the lesson backend.
///
/// Every request carries the API key both as the `apikey` header and as a
/// bearer token. The client is constructed once from configuration and
/// passed to whatever needs backend access.
pub struct RestClient {
    client: Client,

    /// Base URL without a trailing slash.
    base_url: String,

    api_key: String,

    tables: TableConfig,

    storage: StorageConfig,

    /// Column curriculum groups are ordered by.
    group_order: String,
}

impl RestClient {
    /// Create a client, failing fast on missing backend configuration.
    pub fn new(config: &LessonsConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.backend.connect_timeout_ms))
            .timeout(Duration::from_millis(config.backend.request_timeout_ms))
            .build()
            .map_err(|e| LessonError::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.backend.url.trim().trim_end_matches('/').to_string();
        info!("Lesson backend at {}", base_url);

        Ok(Self {
            client,
            base_url,
            api_key: config.backend.api_key.trim().to_string(),
            tables: config.tables.clone(),
            storage: config.storage.clone(),
            group_order: config.browse.group_order.clone(),
        })
    }

    /// Public URL prefix of the storage bucket, without a trailing slash.
    pub fn public_base(&self) -> String {
        format!(
            "{}/storage/v1/object/public/{}",
            self.base_url, self.storage.bucket
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Read rows from a table with PostgREST query parameters.
    async fn select(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<Value>> {
        debug!("GET {} {:?}", table, query);

        let request = self
            .authorized(self.client.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(query);

        let response = request
            .send()
            .await
            .map_err(|e| LessonError::transport(table, e.to_string()))?;

        let body = Self::handle_response(table, response).await?;
        match body {
            Value::Array(rows) => {
                debug!("{} returned {} rows", table, rows.len());
                Ok(rows)
            }
            other => Err(LessonError::transport(
                table,
                format!("expected a JSON array, got {}", json_kind(&other)),
            )),
        }
    }

    async fn select_mapped<T: FromRow>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let rows = self.select(table, query).await?;
        Ok(map_rows(&rows))
    }

    /// Insert one row and map the representation the backend returns.
    async fn insert<B: Serialize + ?Sized, T: FromRow>(&self, table: &str, row: &B) -> Result<T> {
        debug!("POST {}", table);

        let response = self
            .authorized(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .map_err(|e| LessonError::transport(table, e.to_string()))?;

        let body = Self::handle_response(table, response).await?;
        let rows = match body {
            Value::Array(rows) => rows,
            single @ Value::Object(_) => vec![single],
            other => {
                return Err(LessonError::transport(
                    table,
                    format!("expected inserted rows, got {}", json_kind(&other)),
                ))
            }
        };

        map_rows::<T>(&rows)
            .into_iter()
            .next()
            .ok_or_else(|| LessonError::internal(format!("{} insert returned no usable row", table)))
    }

    /// Check the status and parse the JSON body.
    async fn handle_response(resource: &str, response: Response) -> Result<Value> {
        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| LessonError::transport(resource, e.to_string()))?;
            if text.trim().is_empty() {
                return Ok(Value::Array(Vec::new()));
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let body = response.text().await.unwrap_or_default();
        error!("Request for {} failed with status {}: {}", resource, status, body);

        if status == StatusCode::CONFLICT {
            return Err(LessonError::Conflict {
                resource: resource.to_string(),
                message: body,
            });
        }

        Err(LessonError::Request {
            resource: resource.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

#[async_trait]
impl RecordSource for RestClient {
    async fn fetch_groups(&self) -> Result<Vec<CurriculumGroup>> {
        let order = format!("{}.asc", self.group_order);
        self.select_mapped(&self.tables.groups, &[("order", order)]).await
    }

    async fn fetch_topics(&self) -> Result<Vec<Topic>> {
        self.select_mapped(&self.tables.topics, &[("order", "topic_number.asc".to_string())])
            .await
    }

    async fn fetch_lessons(&self) -> Result<Vec<LessonRecord>> {
        self.select_mapped(&self.tables.lessons, &[("order", "id.asc".to_string())])
            .await
    }

    async fn fetch_files(&self) -> Result<Vec<LessonFile>> {
        self.select_mapped(&self.tables.files, &[]).await
    }

    async fn latest_lesson(&self) -> Result<Option<LessonRecord>> {
        let lessons: Vec<LessonRecord> = self
            .select_mapped(
                &self.tables.lessons,
                &[
                    ("order", "upload_time.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(lessons.into_iter().next())
    }

    async fn lessons_for_audience(&self, audience: Audience) -> Result<Vec<LessonRecord>> {
        self.select_mapped(
            &self.tables.lessons,
            &[
                ("target_audience", eq(audience)),
                ("order", "upload_time.desc".to_string()),
            ],
        )
        .await
    }

    async fn topics_in_unit(&self, unit: &RecordId) -> Result<Vec<Topic>> {
        self.select_mapped(
            &self.tables.topics,
            &[
                ("relevant_unit", eq(unit)),
                ("order", "topic_number.asc".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl RecordSink for RestClient {
    async fn insert_lesson(&self, lesson: &LessonRecord) -> Result<LessonRecord> {
        self.insert(&self.tables.lessons, lesson).await
    }

    async fn insert_file(&self, file: &LessonFile) -> Result<LessonFile> {
        self.insert(&self.tables.files, file).await
    }

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic> {
        self.insert(&self.tables.topics, topic).await
    }

    async fn find_topic(&self, unit: &RecordId, name: &str) -> Result<Option<Topic>> {
        let topics: Vec<Topic> = self
            .select_mapped(
                &self.tables.topics,
                &[("relevant_unit", eq(unit)), ("name", eq(name))],
            )
            .await?;
        Ok(topics.into_iter().next())
    }

    async fn insert_user(&self, user: &User) -> Result<User> {
        self.insert(&self.tables.users, user).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self
            .select_mapped(&self.tables.users, &[("email", eq(email))])
            .await?;
        Ok(users.into_iter().next())
    }
}

#[async_trait]
impl ObjectStore for RestClient {
    async fn upload(&self, upload: Upload) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.storage.bucket, upload.path
        );
        info!("Uploading {} ({} bytes)", upload.path, upload.bytes.len());

        let response = self
            .authorized(self.client.post(url))
            .header("Content-Type", upload.content_type.as_str())
            .header("x-upsert", if self.storage.upsert { "true" } else { "false" })
            .body(upload.bytes)
            .send()
            .await
            .map_err(|e| LessonError::Upload {
                path: upload.path.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Upload of {} failed with status {}: {}", upload.path, status, body);
            return Err(LessonError::Upload {
                path: upload.path,
                message: format!("status {}: {}", status.as_u16(), body),
            });
        }

        Ok(self.public_url(&upload.path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base(), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LessonsConfig {
        let mut config = LessonsConfig::default();
        config.backend.url = format!("{}/", server.uri());
        config.backend.api_key = "anon".to_string();
        config
    }

    #[test]
    fn test_new_requires_configuration() {
        let config = LessonsConfig::default();
        assert!(matches!(
            RestClient::new(&config),
            Err(LessonError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_groups_sends_auth_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_groups"))
            .and(query_param("order", "id.asc"))
            .and(header("apikey", "anon"))
            .and(header("Authorization", "Bearer anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "u1", "name": "Intro", "unit": 1},
                {"id": "u2", "name": "Fractions", "description": "Parts of a whole"},
                {"name": "missing id"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let groups = client.fetch_groups().await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "Intro");
        assert_eq!(groups[0].unit, Some(1));
        assert_eq!(groups[1].description.as_deref(), Some("Parts of a whole"));
    }

    #[tokio::test]
    async fn test_group_order_column_is_configurable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/curriculum_groups"))
            .and(query_param("order", "unit.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.browse.group_order = "unit".to_string();
        let client = RestClient::new(&config).unwrap();

        assert!(client.fetch_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/lessons"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let err = client.fetch_lessons().await.unwrap_err();

        match err {
            LessonError::Request { resource, status, body } => {
                assert_eq!(resource, "lessons");
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_lessons_for_audience_filters_server_side() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/lessons"))
            .and(query_param("target_audience", "eq.High"))
            .and(query_param("order", "upload_time.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 3, "title": "Derivatives", "target_audience": "High"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let lessons = client.lessons_for_audience(Audience::High).await.unwrap();

        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].title, "Derivatives");
    }

    #[tokio::test]
    async fn test_latest_lesson_limits_to_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/lessons"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        assert!(client.latest_lesson().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_topic_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/topics"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!([
                {"name": "Ratios", "relevant_unit": "u1", "topic_number": 2}
            ])))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint"
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let err = client
            .insert_topic(&NewTopic {
                name: "Ratios".to_string(),
                relevant_unit: RecordId::from("u1"),
                topic_number: Some(2),
            })
            .await
            .unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_insert_lesson_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/lessons"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {"id": "abc", "title": "Fractions", "upload_time": "2025-10-01T08:00:00+00:00"}
            ])))
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let lesson = LessonRecord {
            id: Some(RecordId::from("abc")),
            title: "Fractions".to_string(),
            ..Default::default()
        };
        let stored = client.insert_lesson(&lesson).await.unwrap();

        assert_eq!(stored.id, Some(RecordId::from("abc")));
        assert!(stored.upload_time.is_some());
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/lesson-files/abc/plan.pdf"))
            .and(header("Content-Type", "application/pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "lesson-files/abc/plan.pdf"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let url = client
            .upload(Upload {
                path: "abc/plan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.4".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(
            url,
            format!("{}/storage/v1/object/public/lesson-files/abc/plan.pdf", server.uri())
        );
    }

    #[tokio::test]
    async fn test_upload_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/lesson-files/abc/deck.pptx"))
            .respond_with(ResponseTemplate::new(413).set_body_string("Payload too large"))
            .mount(&server)
            .await;

        let client = RestClient::new(&config_for(&server)).unwrap();
        let err = client
            .upload(Upload {
                path: "abc/deck.pptx".to_string(),
                content_type: "application/octet-stream".to_string(),
                bytes: vec![0; 16],
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "UPLOAD_FAILED");
        assert!(err.to_string().contains("413"));
    }
}
