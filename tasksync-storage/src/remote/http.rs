//! HTTP client for the remote task service.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tasksync_core::{ApiResponse, RemoteConfig, Task, TaskError};
use tracing::debug;

use super::TasksApi;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not found: {path}")]
    NotFound { path: String, id: Option<String> },
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ApiClientError> for TaskError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::NotFound { id: Some(id), .. } => TaskError::not_found(id),
            ApiClientError::NotFound { path, id: None } => TaskError::not_found(path),
            ApiClientError::Http(_) | ApiClientError::Status { .. } => {
                TaskError::transport(err.to_string())
            }
            ApiClientError::Serde(_) | ApiClientError::Config(_) => {
                TaskError::unknown(err.to_string())
            }
        }
    }
}

/// reqwest-backed [`TasksApi`].
///
/// Endpoints:
/// - `GET {base_url}/b/{collection_bin}/latest` returns `{"records": [Task]}`
/// - `GET {base_url}/b/{id}/latest` returns a bare `Task`
#[derive(Clone)]
pub struct HttpTasksApi {
    client: reqwest::Client,
    base_url: String,
    collection_bin: String,
    collection_headers: HeaderMap,
}

impl HttpTasksApi {
    pub fn new(config: &RemoteConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let collection_headers = build_secret_headers(config.secret_key.as_deref())?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection_bin: config.collection_bin.clone(),
            collection_headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(
        &self,
        path: &str,
        headers: HeaderMap,
        id: Option<&str>,
    ) -> Result<T, ApiClientError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "GET");
        let response = self.client.get(url).headers(headers).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiClientError::NotFound {
                path: path.to_string(),
                id: id.map(str::to_string),
            });
        }
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TasksApi for HttpTasksApi {
    type Error = ApiClientError;

    async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiClientError> {
        let path = format!("/b/{}/latest", self.collection_bin);
        let response: ApiResponse<Task> = self
            .get_json(&path, self.collection_headers.clone(), None)
            .await?;
        Ok(response.records)
    }

    async fn fetch_task(&self, id: &str) -> Result<Task, ApiClientError> {
        let path = format!("/b/{}/latest", id);
        self.get_json(&path, HeaderMap::new(), Some(id)).await
    }
}

fn build_secret_headers(secret_key: Option<&str>) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(secret) = secret_key {
        headers.insert(
            HeaderName::from_static("secret-key"),
            HeaderValue::from_str(secret).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}
