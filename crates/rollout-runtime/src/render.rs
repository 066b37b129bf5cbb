//! Plain-text rendering of a reduced deployment.

use chrono::{DateTime, Utc};
use rollout_core::schedule::{DriverState, StopReason};
use rollout_core::time::format_relative;
use rollout_core::types::{BreakdownModel, DeploymentStatus, IconState, StageState};

use crate::driver::DriverSnapshot;

fn icon_glyph(icon: IconState) -> &'static str {
    match icon {
        IconState::None => " ",
        IconState::Success => "\u{2713}",
        IconState::Failed => "\u{2717}",
        IconState::InProgress => "\u{25cf}",
        IconState::Loading => "\u{25cc}",
        IconState::Unknown => "?",
        IconState::Unreachable => "\u{25cb}",
        IconState::Disconnect | IconState::TimedOut => "!",
    }
}

fn icon_color(icon: IconState) -> &'static str {
    match icon {
        IconState::Success => "32",
        IconState::Failed => "31",
        IconState::InProgress | IconState::Loading => "33",
        IconState::Disconnect | IconState::TimedOut => "1;33",
        IconState::None | IconState::Unknown | IconState::Unreachable => "2",
    }
}

fn status_color(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Succeeded => "1;32",
        DeploymentStatus::Failed => "1;31",
        DeploymentStatus::InProgress => "1;33",
        DeploymentStatus::TimedOut | DeploymentStatus::UnableToFetch => "1;35",
        DeploymentStatus::Superseded => "2",
    }
}

fn paint(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

fn format_stage(out: &mut String, stage: &StageState, now: DateTime<Utc>, use_color: bool) {
    let glyph = paint(icon_glyph(stage.icon), icon_color(stage.icon), use_color);
    let title = format!("{:<48}", stage.display_text);
    out.push_str(&format!("  {glyph} {title}"));
    if !stage.display_sub_text.is_empty() {
        out.push_str(&paint(&stage.display_sub_text, icon_color(stage.icon), use_color));
        out.push_str("  ");
    }
    let when = format_relative(stage.time, now);
    if !when.is_empty() {
        out.push_str(&paint(&when, "2", use_color));
    }
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');

    if stage.is_collapsed_hint {
        return;
    }
    for item in &stage.kube_list {
        let glyph = paint(icon_glyph(item.icon), icon_color(item.icon), use_color);
        out.push_str(&format!("      {glyph} {}\n", item.message));
    }
    for res in &stage.resource_details {
        let line = format!(
            "        {}/{} {} {}",
            res.resource_kind, res.resource_name, res.resource_status, res.status_message
        );
        out.push_str(&paint(line.trim_end(), "2", use_color));
        out.push('\n');
    }
}

/// Header, stage list and error lines for one model.
pub fn format_model(model: &BreakdownModel, now: DateTime<Utc>, use_color: bool) -> String {
    let mut out = String::new();

    let status = paint(
        &model.deployment_status_text,
        status_color(model.deployment_status),
        use_color,
    );
    out.push_str(&format!("Deployment: {status}"));
    if model.aborted {
        out.push_str(&paint(" (aborted)", "1;31", use_color));
    }
    out.push('\n');

    let mut meta = Vec::new();
    if !model.triggered_by.is_empty() {
        meta.push(format!("by {}", model.triggered_by));
    }
    let started = format_relative(model.deployment_trigger_time, now);
    if !started.is_empty() {
        meta.push(format!("started {started}"));
    }
    let ended = format_relative(model.deployment_end_time, now);
    if !ended.is_empty() {
        meta.push(format!("finished {ended}"));
    }
    meta.push(format!("{} environment", model.env_kind));
    out.push_str(&paint(&meta.join(", "), "2", use_color));
    out.push_str("\n\n");

    for stage in model.stages.values() {
        format_stage(&mut out, stage, now, use_color);
    }

    if !model.deployment_error.is_empty() {
        out.push('\n');
        out.push_str(&paint(
            &format!("error: {}", model.deployment_error),
            "31",
            use_color,
        ));
        out.push('\n');
    }
    if let Some(key) = model.non_deployment_error {
        out.push_str(&paint(
            &format!("failed without reporting: {}", key.display_text()),
            "31",
            use_color,
        ));
        out.push('\n');
    }
    if model.deployment_status.allows_manual_resync() {
        out.push_str(&paint(
            "hint: `rollout resync` asks the backend to re-check the status",
            "2",
            use_color,
        ));
        out.push('\n');
    }
    out
}

/// Text or pretty JSON for one model, as printed by `reduce` and `status`.
pub fn model_output(
    model: &BreakdownModel,
    json: bool,
    now: DateTime<Utc>,
    use_color: bool,
) -> Result<String, serde_json::Error> {
    if json {
        serde_json::to_string_pretty(model)
    } else {
        Ok(format_model(model, now, use_color))
    }
}

fn driver_state_text(state: DriverState) -> String {
    match state {
        DriverState::Active => "polling".to_string(),
        DriverState::Cancelled => "cancelled".to_string(),
        DriverState::Stopped(StopReason::Terminal(status)) => {
            format!("stopped ({})", status.display_text().to_lowercase())
        }
        DriverState::Stopped(StopReason::Aborted) => "stopped (aborted)".to_string(),
        DriverState::Stopped(StopReason::FetchFailed) => "stopped (fetch failed)".to_string(),
    }
}

/// Model plus driver status footer, used by `watch`.
pub fn format_snapshot(snapshot: &DriverSnapshot, now: DateTime<Utc>, use_color: bool) -> String {
    let mut out = String::new();
    out.push_str(&paint(&snapshot.view.to_string(), "1", use_color));
    out.push('\n');
    match &snapshot.model {
        Some(model) => out.push_str(&format_model(model, now, use_color)),
        None => out.push_str("(waiting for first response)\n"),
    }
    if let Some(err) = &snapshot.last_error {
        out.push_str(&paint(&format!("fetch error: {err}"), "1;31", use_color));
        out.push('\n');
    }
    let footer = format!(
        "{} \u{00b7} {} fetches",
        driver_state_text(snapshot.state),
        snapshot.fetches
    );
    out.push('\n');
    out.push_str(&paint(&footer, "2", use_color));
    out.push('\n');
    out
}
