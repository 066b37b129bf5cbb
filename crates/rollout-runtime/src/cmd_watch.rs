//! `rollout watch`: poll one deployment until it settles.

use std::sync::Arc;

use chrono::Utc;
use rollout_core::schedule::{DriverState, StopReason};
use rollout_core::types::DeploymentStatus;

use crate::cli::WatchOpts;
use crate::client::DeploymentApiClient;
use crate::config::RuntimeConfig;
use crate::context::{can_redraw, resolve_color};
use crate::driver::DriverSnapshot;
use crate::render::format_snapshot;
use crate::view::DeploymentView;

/// Exit code for the state a watch ended in.
///
/// - 0: succeeded or superseded
/// - 1: failed or aborted
/// - 2: timeline could not be fetched
/// - 3: interrupted (Ctrl-C)
pub fn exit_code(state: DriverState) -> i32 {
    match state {
        DriverState::Stopped(StopReason::Terminal(
            DeploymentStatus::Succeeded | DeploymentStatus::Superseded,
        )) => 0,
        DriverState::Stopped(StopReason::Terminal(_) | StopReason::Aborted) => 1,
        DriverState::Stopped(StopReason::FetchFailed) => 2,
        DriverState::Active | DriverState::Cancelled => 3,
    }
}

fn snapshot_json(snapshot: &DriverSnapshot) -> serde_json::Value {
    serde_json::json!({
        "view": snapshot.view,
        "state": snapshot.state,
        "fetches": snapshot.fetches,
        "lastError": snapshot.last_error,
        "model": snapshot.model,
    })
}

fn emit(snapshot: &DriverSnapshot, json: bool, use_color: bool, redraw: bool) {
    if json {
        println!("{}", snapshot_json(snapshot));
        return;
    }
    if redraw {
        // Clear screen + cursor home
        print!("\x1b[2J\x1b[H");
    }
    print!("{}", format_snapshot(snapshot, Utc::now(), use_color));
    if redraw {
        println!("\nrollout watch \u{2014} Ctrl-C to quit");
    }
}

/// Entry point for `rollout watch`. Returns the process exit code.
pub async fn cmd_watch(config: &RuntimeConfig, opts: &WatchOpts) -> anyhow::Result<i32> {
    let client = Arc::new(DeploymentApiClient::from_config(config)?);
    let json = opts.output.json;
    let use_color = !json && resolve_color(&opts.output.color);
    let redraw = !json && can_redraw();

    let mut view = DeploymentView::new(client, config.poll);
    let mut rx = view.open(opts.target.view_key(), opts.output.env_kind());

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.fetches > 0 {
            emit(&snapshot, json, use_color, redraw);
        }
        if !snapshot.state.is_active() {
            return Ok(exit_code(snapshot.state));
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    let state = rx.borrow().state;
                    return Ok(exit_code(state));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                view.close();
                if !json {
                    eprintln!();
                }
                return Ok(3);
            }
        }
    }
}
