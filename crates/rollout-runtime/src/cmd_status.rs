//! `rollout status`: fetch and reduce once.

use chrono::{DateTime, Utc};
use rollout_core::reduce;
use rollout_core::types::{BreakdownModel, EnvKind, ViewKey};

use crate::cli::StatusOpts;
use crate::client::DeploymentApiClient;
use crate::config::RuntimeConfig;
use crate::context::resolve_color;
use crate::render::model_output;
use crate::source::{SourceError, TimelineSource};

pub async fn fetch_model<S: TimelineSource>(
    source: &S,
    view: &ViewKey,
    env: EnvKind,
    now: DateTime<Utc>,
) -> Result<BreakdownModel, SourceError> {
    let details = source.fetch_timeline(view).await?;
    Ok(reduce(&details, env, now))
}

/// Entry point for `rollout status`.
pub async fn cmd_status(config: &RuntimeConfig, opts: &StatusOpts) -> anyhow::Result<()> {
    let client = DeploymentApiClient::from_config(config)?;
    let view = opts.target.view_key();
    let now = Utc::now();
    let model = fetch_model(&client, &view, opts.output.env_kind(), now).await?;

    let use_color = !opts.output.json && resolve_color(&opts.output.color);
    print!("{}", model_output(&model, opts.output.json, now, use_color)?);
    if opts.output.json {
        println!();
    }
    Ok(())
}
