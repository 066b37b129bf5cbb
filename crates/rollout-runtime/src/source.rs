//! Seams between the polling driver and the deployment backend.
//!
//! The driver only sees these traits; the HTTP client implements them and
//! tests substitute in-memory fakes.

use std::future::Future;

use rollout_core::types::{DeploymentStatusDetails, ViewKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("response carried no result")]
    EmptyResult,

    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Backend endpoint returning the timeline of one deployment attempt.
pub trait TimelineSource: Send + Sync {
    fn fetch_timeline(
        &self,
        view: &ViewKey,
    ) -> impl Future<Output = Result<DeploymentStatusDetails, SourceError>> + Send;
}

/// Backend endpoint that forces a status re-sync for one deployment.
///
/// Returns once the backend acknowledged; the effect shows up on a later
/// timeline fetch.
pub trait ResyncTrigger: Send + Sync {
    fn trigger_resync(&self, view: &ViewKey) -> impl Future<Output = Result<(), SourceError>> + Send;
}
