//! HTTP client for the deployment-status API.
//!
//! Every response is wrapped in the backend envelope
//! `{ code, status, result, errors }`; errors may arrive with a 2xx status,
//! so the envelope is checked on every path.

use std::time::Duration;

use reqwest::Client;
use rollout_core::types::{DeploymentStatusDetails, ViewKey};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::RuntimeConfig;
use crate::source::{ResyncTrigger, SourceError, TimelineSource};

/// Request header carrying the API token.
pub const TOKEN_HEADER: &str = "token";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    status: String,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiErrorItem {
    code: String,
    internal_message: String,
    user_message: String,
}

impl<T> Envelope<T> {
    fn into_error(self) -> Option<SourceError> {
        let first = self.errors.into_iter().next()?;
        let message = if first.user_message.is_empty() {
            first.internal_message
        } else {
            first.user_message
        };
        let message = if message.is_empty() {
            format!("{} ({})", self.status, first.code)
        } else {
            message
        };
        Some(SourceError::Api {
            code: self.code,
            message,
        })
    }
}

/// Client for the timeline and manual-resync endpoints.
#[derive(Debug, Clone)]
pub struct DeploymentApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl DeploymentApiClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(SourceError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: trimmed.to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self, SourceError> {
        Self::new(
            &config.base_url,
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Envelope<T>, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "GET");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
                && let Some(err) = envelope.into_error()
            {
                return Err(err);
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

/// Path of the timeline endpoint for `view`.
pub fn timeline_path(view: &ViewKey) -> String {
    if view.helm_app {
        let mut path = format!(
            "/app-store/deployment-status/timeline/{}/{}?showTimeline=true",
            view.app_id, view.env_id
        );
        if let Some(id) = view.attempt_id {
            path.push_str(&format!("&installedAppVersionHistoryId={id}"));
        }
        path
    } else {
        let mut path = format!(
            "/app/deployment-status/timeline/{}/{}?showTimeline=true",
            view.app_id, view.env_id
        );
        if let Some(id) = view.attempt_id {
            path.push_str(&format!("&wfrId={id}"));
        }
        path
    }
}

/// Path of the manual-resync endpoint for `view`.
pub fn manual_sync_path(view: &ViewKey) -> String {
    format!(
        "/app/deployment-status/manual-sync/{}/{}",
        view.app_id, view.env_id
    )
}

impl TimelineSource for DeploymentApiClient {
    async fn fetch_timeline(&self, view: &ViewKey) -> Result<DeploymentStatusDetails, SourceError> {
        let envelope = self
            .get_envelope::<DeploymentStatusDetails>(&timeline_path(view))
            .await?;
        if !envelope.errors.is_empty() {
            return Err(envelope
                .into_error()
                .unwrap_or(SourceError::EmptyResult));
        }
        envelope.result.ok_or(SourceError::EmptyResult)
    }
}

impl ResyncTrigger for DeploymentApiClient {
    async fn trigger_resync(&self, view: &ViewKey) -> Result<(), SourceError> {
        let envelope = self
            .get_envelope::<serde_json::Value>(&manual_sync_path(view))
            .await?;
        match envelope.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
