//! `rollout resync`: manual status re-sync for a timed-out deployment.

use chrono::Utc;
use rollout_core::types::{EnvKind, ViewKey};

use crate::cli::TargetOpts;
use crate::client::DeploymentApiClient;
use crate::cmd_status::fetch_model;
use crate::config::RuntimeConfig;
use crate::driver::{ResyncError, resync_checked};
use crate::source::{ResyncTrigger, TimelineSource};

/// Fetch the current status and trigger a resync if it is still unknown.
pub async fn resync<C>(client: &C, view: &ViewKey) -> Result<(), ResyncError>
where
    C: TimelineSource + ResyncTrigger,
{
    // Timeout outcomes only occur on live pipelines.
    let model = fetch_model(client, view, EnvKind::Live, Utc::now())
        .await
        .map_err(ResyncError::Fetch)?;
    resync_checked(client, view, Some(&model)).await
}

/// Entry point for `rollout resync`.
pub async fn cmd_resync(config: &RuntimeConfig, target: &TargetOpts) -> anyhow::Result<()> {
    let client = DeploymentApiClient::from_config(config)?;
    let view = target.view_key();
    resync(&client, &view).await?;
    println!("resync requested for {view}; the status updates on the next fetch");
    Ok(())
}
