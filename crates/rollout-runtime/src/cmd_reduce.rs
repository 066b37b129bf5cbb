//! `rollout reduce`: reduce a saved timeline response offline.

use std::io::Read;

use anyhow::Context;
use chrono::{DateTime, Utc};
use rollout_core::reduce;
use rollout_core::time::parse_timestamp;
use rollout_core::types::DeploymentStatusDetails;

use crate::cli::ReduceOpts;
use crate::context::resolve_color;
use crate::render::model_output;

/// Parse a timeline body. Accepts the bare payload or the API envelope
/// (`{"code": .., "result": {..}}`).
pub fn parse_details(raw: &str) -> anyhow::Result<DeploymentStatusDetails> {
    let mut value: serde_json::Value =
        serde_json::from_str(raw).context("response is not valid JSON")?;
    if let Some(result) = value.get_mut("result")
        && result.is_object()
    {
        value = result.take();
    }
    serde_json::from_value(value).context("response is not a deployment timeline")
}

fn resolve_now(raw: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(s) => parse_timestamp(s).with_context(|| format!("invalid --now timestamp {s:?}")),
    }
}

/// Entry point for `rollout reduce`.
pub fn cmd_reduce(opts: &ReduceOpts) -> anyhow::Result<()> {
    let raw = match opts.file.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf
        }
    };

    let details = parse_details(&raw)?;
    let now = resolve_now(opts.now.as_deref())?;
    let model = reduce(&details, opts.output.env_kind(), now);
    tracing::debug!(status = %model.deployment_status, events = details.events().len(), "reduced");

    let use_color = !opts.output.json && resolve_color(&opts.output.color);
    print!("{}", model_output(&model, opts.output.json, now, use_color)?);
    if opts.output.json {
        println!();
    }
    Ok(())
}
