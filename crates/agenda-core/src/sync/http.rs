//! HTTP implementation of the remote collaborator.
//!
//! Routes: `POST {base}/{table}`, `PATCH {base}/{table}/{id}`,
//! `DELETE {base}/{table}/{id}`, plus `GET {base}/health` for probing.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::remote::{RemoteCollaborator, RemoteError, RemoteResult};
use crate::config::{ConfigError, SyncConfig};
use crate::models::{EntityId, EntityKey, EntityRecord};
use crate::util::compact_text;

#[derive(Clone)]
pub struct HttpCollaborator {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpCollaborator {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpCollaborator")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpCollaborator {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            auth_token,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Build from configuration; the base URL must be set
    pub fn from_config(config: &SyncConfig) -> Result<Self, HttpSetupError> {
        let base_url = config.require_remote_base_url()?;
        Ok(Self::new(
            base_url,
            config.auth_token.clone(),
            config.request_timeout(),
        )?)
    }

    /// Whether the backend health endpoint answers with success
    pub async fn check_health(&self) -> bool {
        let request = self.authorized(self.client.get(format!("{}/health", self.base_url)));
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Health check failed: {error}");
                false
            }
        }
    }

    fn collection_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(table))
    }

    fn entity_url(&self, table: &str, id: &EntityId) -> String {
        format!(
            "{}/{}",
            self.collection_url(table),
            urlencoding::encode(id.as_str())
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<()> {
        let response = self.authorized(request).send().await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: Some(status.as_u16()),
            message: parse_api_error(status, &body),
        })
    }
}

#[async_trait]
impl RemoteCollaborator for HttpCollaborator {
    async fn create(&self, table: &str, payload: &Map<String, Value>) -> RemoteResult<()> {
        self.send(self.client.post(self.collection_url(table)).json(payload))
            .await
    }

    async fn update(&self, table: &str, record: &EntityRecord) -> RemoteResult<()> {
        self.send(
            self.client
                .patch(self.entity_url(table, &record.id))
                .json(record),
        )
        .await
    }

    async fn delete(&self, table: &str, key: &EntityKey) -> RemoteResult<()> {
        self.send(self.client.delete(self.entity_url(table, &key.id)))
            .await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
