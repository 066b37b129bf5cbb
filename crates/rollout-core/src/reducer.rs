//! StatusReducer: timeline events → [`BreakdownModel`].
//!
//! Reduction is two-phase. A reverse-chronological scan records, per stage,
//! the most recent event that reported on it (first writer wins), plus the
//! overall outcome signal. The model is then built from that summary in
//! pipeline order, with the status-specific overlays (pending frontier,
//! failure cascade, timeout markers) applied as slice operations over the
//! active [`Pipeline`].
//!
//! Pure: no IO, no clock. `now` only feeds the relative "last fetched" text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::kube_phase::{PhaseOutcome, ResourcePhaseAccumulator, waiting_kube_list};
use crate::pipeline::{Pipeline, mark_unreachable};
use crate::time::format_relative;
use crate::types::{
    BreakdownModel, DeploymentStatus, DeploymentStatusDetails, EnvKind, EventKind, IconState,
    LegacyStatus, StageKey, StageState, TimelineEvent,
};

pub const SUB_TEXT_IN_PROGRESS: &str = "In progress";
pub const SUB_TEXT_WAITING: &str = "Waiting";
pub const SUB_TEXT_FAILED: &str = "Failed";
pub const SUB_TEXT_UNKNOWN: &str = "Unknown";
pub const SUB_TEXT_DEGRADED: &str = "Degraded";

/// Error text for a deployment whose health could not be confirmed in time.
pub fn timeout_message(details: &DeploymentStatusDetails, now: DateTime<Utc>) -> String {
    format!(
        "Below resources did not become healthy within 10 mins. Resource status shown below was last fetched {}. {} retries failed.",
        format_relative(details.status_last_fetched_at, now),
        details.status_fetch_count,
    )
}

// ─── Scan ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Succeeded,
    Failed,
    /// `KUBECTL_APPLY_STARTED`: the stage's icon depends on the overall status.
    Started,
}

#[derive(Debug, Clone, Copy)]
struct Observation<'a> {
    verdict: Verdict,
    event: &'a TimelineEvent,
}

#[derive(Debug, Clone, Copy)]
enum Outcome<'a> {
    Healthy {
        degraded: bool,
        event: &'a TimelineEvent,
    },
    Failed(&'a TimelineEvent),
    TimedOut,
    UnableToFetch,
}

#[derive(Debug, Default)]
struct Scan<'a> {
    /// Most recent event per stage.
    observations: BTreeMap<StageKey, Observation<'a>>,
    /// Most recent overall outcome signal.
    outcome: Option<Outcome<'a>>,
    superseded: bool,
    aborted: bool,
    argocd_reported: bool,
    /// Oldest `KUBECTL_APPLY*` event; stands in for a missing argo sync.
    earliest_apply: Option<&'a TimelineEvent>,
    kube: ResourcePhaseAccumulator,
}

impl<'a> Scan<'a> {
    /// Outcome signals are first-writer-wins like stage observations.
    fn record_outcome(&mut self, outcome: Outcome<'a>) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    fn verdict(&self, key: StageKey) -> Option<Verdict> {
        self.observations.get(&key).map(|o| o.verdict)
    }

    fn has_stage_failure(&self) -> bool {
        self.observations
            .values()
            .any(|o| o.verdict == Verdict::Failed)
    }
}

fn scan(events: &[TimelineEvent], pipeline: Pipeline) -> Scan<'_> {
    let mut scan = Scan::default();
    let latest = events.len().saturating_sub(1);

    for (idx, event) in events.iter().enumerate().rev() {
        let Some(kind) = event.kind() else {
            debug!(status = %event.status, "skipping unrecognized timeline event");
            continue;
        };

        match kind {
            EventKind::Healthy | EventKind::Degraded => {
                scan.record_outcome(Outcome::Healthy {
                    degraded: kind == EventKind::Degraded,
                    event,
                });
            }
            EventKind::DeploymentFailed => {
                scan.record_outcome(Outcome::Failed(event));
            }
            EventKind::DeploymentSuperseded => scan.superseded = true,
            EventKind::FetchTimedOut | EventKind::UnableToFetchStatus => {
                if idx == latest {
                    scan.record_outcome(if kind == EventKind::FetchTimedOut {
                        Outcome::TimedOut
                    } else {
                        Outcome::UnableToFetch
                    });
                } else {
                    debug!(%kind, idx, "ignoring superseded fetch-status event");
                }
            }
            EventKind::Aborted => scan.aborted = true,
            _ => {}
        }

        let Some(stage) = kind.stage() else {
            continue;
        };
        if !pipeline.contains(stage) {
            debug!(%kind, "skipping event outside the active pipeline");
            continue;
        }
        match stage {
            StageKey::ArgocdSync => scan.argocd_reported = true,
            StageKey::KubectlApply => {
                scan.kube.observe(event.resource_details());
                scan.earliest_apply = Some(event);
            }
            _ => {}
        }

        let verdict = if kind.is_stage_failure() {
            Verdict::Failed
        } else if kind == EventKind::KubectlApplyStarted {
            Verdict::Started
        } else {
            Verdict::Succeeded
        };
        scan.observations
            .entry(stage)
            .or_insert(Observation { verdict, event });
    }

    scan
}

/// Pipeline the model is built over. The virtual push stage is optional and
/// only shown when the stream reports on it.
///
/// Without a push event the package stage is last, so a generated package
/// settles the deployment as succeeded and polling stops. A push reported
/// after that point is not observed.
fn effective_pipeline(env: EnvKind, scan: &Scan<'_>) -> Pipeline {
    match env {
        EnvKind::Live => Pipeline::LIVE,
        EnvKind::Virtual => {
            if scan
                .observations
                .contains_key(&StageKey::HelmManifestPushedToHelmRepo)
            {
                Pipeline::VIRTUAL
            } else {
                Pipeline::VIRTUAL_PACKAGE_ONLY
            }
        }
    }
}

fn overall_status(scan: &Scan<'_>, pipeline: Pipeline) -> DeploymentStatus {
    if scan.superseded {
        return DeploymentStatus::Superseded;
    }
    if scan.has_stage_failure() {
        return DeploymentStatus::Failed;
    }
    match scan.outcome {
        // DEGRADED counts as success; only the health sub-text differs.
        Some(Outcome::Healthy { .. }) => DeploymentStatus::Succeeded,
        Some(Outcome::Failed(_)) => DeploymentStatus::Failed,
        Some(Outcome::TimedOut) => DeploymentStatus::TimedOut,
        Some(Outcome::UnableToFetch) => DeploymentStatus::UnableToFetch,
        None if scan.verdict(pipeline.last()) == Some(Verdict::Succeeded) => {
            DeploymentStatus::Succeeded
        }
        None => DeploymentStatus::InProgress,
    }
}

// ─── Reduce ───────────────────────────────────────────────────────

/// Reduce one timeline response into a render-ready model.
///
/// Never fails: unrecognized event kinds and events belonging to the other
/// pipeline are skipped. An empty event list falls back to `wfrStatus`.
pub fn reduce(
    details: &DeploymentStatusDetails,
    env: EnvKind,
    now: DateTime<Utc>,
) -> BreakdownModel {
    let events = details.events();
    if events.is_empty() {
        return reduce_legacy(details, env);
    }

    let scan = scan(events, Pipeline::for_env(env));
    let pipeline = effective_pipeline(env, &scan);
    let status = overall_status(&scan, pipeline);

    let deployment_error = match (status, scan.outcome) {
        (DeploymentStatus::Failed, Some(Outcome::Failed(event))) => event.status_detail.clone(),
        (DeploymentStatus::TimedOut | DeploymentStatus::UnableToFetch, _) => {
            timeout_message(details, now)
        }
        _ => String::new(),
    };

    let mut stages = pipeline.blank_stages();
    fill_initiated(
        &mut stages,
        details,
        scan.observations.get(&StageKey::DeploymentInitiated),
    );
    apply_observations(&mut stages, &scan);
    synthesize_argocd_sync(&mut stages, &scan, pipeline);
    imply_upstream_success(&mut stages, pipeline);
    apply_health_outcome(&mut stages, &scan);
    apply_kubectl_stage(&mut stages, &scan, status, &deployment_error);

    let non_deployment_error = match status {
        DeploymentStatus::Succeeded => {
            settle_succeeded(&mut stages, pipeline);
            None
        }
        DeploymentStatus::InProgress => {
            mark_pending(&mut stages, pipeline);
            None
        }
        DeploymentStatus::Failed => cascade_failure(&mut stages, &scan, pipeline),
        DeploymentStatus::TimedOut | DeploymentStatus::UnableToFetch => {
            mark_health_unconfirmed(&mut stages, &scan, status, &deployment_error);
            None
        }
        DeploymentStatus::Superseded => None,
    };

    debug!(
        %status,
        events = events.len(),
        stages = stages.len(),
        "reduced deployment timeline"
    );

    BreakdownModel {
        deployment_status: status,
        deployment_status_text: status.display_text().to_string(),
        deployment_trigger_time: details.deployment_started_on,
        deployment_end_time: details.deployment_finished_on,
        deployment_error,
        non_deployment_error,
        triggered_by: details.triggered_by.clone(),
        env_kind: env,
        aborted: scan.aborted,
        stages,
    }
}

/// Records written before per-stage timelines existed: only the overall
/// status is known.
fn reduce_legacy(details: &DeploymentStatusDetails, env: EnvKind) -> BreakdownModel {
    let status = match details.wfr_status.as_deref() {
        Some(raw) => LegacyStatus::parse(raw).map_or_else(
            || {
                debug!(wfr_status = raw, "unrecognized legacy status");
                DeploymentStatus::InProgress
            },
            LegacyStatus::deployment_status,
        ),
        None => DeploymentStatus::InProgress,
    };

    let mut stages = Pipeline::for_env(env).blank_stages();
    fill_initiated(&mut stages, details, None);

    BreakdownModel {
        deployment_status: status,
        deployment_status_text: status.display_text().to_string(),
        deployment_trigger_time: details.deployment_started_on,
        deployment_end_time: details.deployment_finished_on,
        deployment_error: String::new(),
        non_deployment_error: None,
        triggered_by: details.triggered_by.clone(),
        env_kind: env,
        aborted: false,
        stages,
    }
}

// ─── Stage builders ───────────────────────────────────────────────

fn fill_initiated(
    stages: &mut BTreeMap<StageKey, StageState>,
    details: &DeploymentStatusDetails,
    observed: Option<&Observation<'_>>,
) {
    let Some(stage) = stages.get_mut(&StageKey::DeploymentInitiated) else {
        return;
    };
    stage.icon = IconState::Success;
    if !details.triggered_by.is_empty() {
        stage.display_text = format!(
            "{} by {}",
            StageKey::DeploymentInitiated.display_text(),
            details.triggered_by
        );
    }
    stage.time = observed
        .and_then(|o| o.event.status_time)
        .or(details.deployment_started_on);
}

fn apply_observations(stages: &mut BTreeMap<StageKey, StageState>, scan: &Scan<'_>) {
    for (key, obs) in &scan.observations {
        if *key == StageKey::DeploymentInitiated {
            continue;
        }
        let Some(stage) = stages.get_mut(key) else {
            continue;
        };
        match obs.verdict {
            Verdict::Succeeded => {
                stage.icon = IconState::Success;
                stage.time = obs.event.status_time;
                if *key == StageKey::KubectlApply {
                    stage.resource_details.clear();
                    stage.kube_list = scan.kube.kube_list(PhaseOutcome::Completed);
                }
            }
            Verdict::Failed => {
                stage.icon = IconState::Failed;
                stage.display_sub_text = SUB_TEXT_FAILED.to_string();
                stage.time = obs.event.status_time;
                stage.timeline_status = obs.event.status_detail.clone();
                stage.is_collapsed_hint = false;
            }
            // Resolved once the overall status is known.
            Verdict::Started => {}
        }
    }
}

/// Old streams never reported the argo sync step. Treat it as done when the
/// apply step was reached.
fn synthesize_argocd_sync(
    stages: &mut BTreeMap<StageKey, StageState>,
    scan: &Scan<'_>,
    pipeline: Pipeline,
) {
    if scan.argocd_reported || !pipeline.contains(StageKey::ArgocdSync) {
        return;
    }
    let (Some(apply), Some(stage)) = (scan.earliest_apply, stages.get_mut(&StageKey::ArgocdSync))
    else {
        return;
    };
    stage.icon = IconState::Success;
    stage.display_sub_text.clear();
    stage.time = apply.status_time;
}

/// A completed stage implies every blank stage before it completed too.
fn imply_upstream_success(stages: &mut BTreeMap<StageKey, StageState>, pipeline: Pipeline) {
    let order = pipeline.stages();
    let Some(furthest) = order.iter().rposition(|k| {
        stages
            .get(k)
            .is_some_and(|s| s.icon == IconState::Success)
    }) else {
        return;
    };
    for key in &order[..furthest] {
        if let Some(stage) = stages.get_mut(key)
            && stage.icon.is_none()
        {
            stage.icon = IconState::Success;
        }
    }
}

fn apply_health_outcome(stages: &mut BTreeMap<StageKey, StageState>, scan: &Scan<'_>) {
    let Some(Outcome::Healthy { degraded, event }) = scan.outcome else {
        return;
    };
    let Some(stage) = stages.get_mut(&StageKey::AppHealth) else {
        return;
    };
    stage.icon = IconState::Success;
    stage.time = event.status_time;
    stage.display_sub_text = if degraded {
        SUB_TEXT_DEGRADED.to_string()
    } else {
        String::new()
    };
}

/// `KUBECTL_APPLY_STARTED` is the most recent apply event: the card reflects
/// the overall status and the breadcrumb marks the current hook phase.
fn apply_kubectl_stage(
    stages: &mut BTreeMap<StageKey, StageState>,
    scan: &Scan<'_>,
    status: DeploymentStatus,
    deployment_error: &str,
) {
    let Some(obs) = scan.observations.get(&StageKey::KubectlApply) else {
        return;
    };
    if obs.verdict != Verdict::Started {
        return;
    }
    let Some(stage) = stages.get_mut(&StageKey::KubectlApply) else {
        return;
    };

    stage.time = obs.event.status_time;
    stage.resource_details = scan.kube.current_resources(obs.event.resource_details());

    match status {
        DeploymentStatus::InProgress | DeploymentStatus::Superseded => {
            stage.icon = IconState::InProgress;
            stage.display_sub_text = SUB_TEXT_IN_PROGRESS.to_string();
            stage.timeline_status = obs.event.status_detail.clone();
            stage.is_collapsed_hint = false;
            stage.kube_list = scan.kube.kube_list(PhaseOutcome::Active);
        }
        DeploymentStatus::TimedOut | DeploymentStatus::UnableToFetch => {
            stage.icon = if status == DeploymentStatus::TimedOut {
                IconState::Unknown
            } else {
                IconState::Disconnect
            };
            stage.display_sub_text = SUB_TEXT_UNKNOWN.to_string();
            stage.timeline_status = deployment_error.to_string();
            stage.is_collapsed_hint = false;
            stage.kube_list = scan.kube.kube_list(PhaseOutcome::Stalled);
        }
        DeploymentStatus::Failed => {
            stage.icon = IconState::Unknown;
            stage.display_sub_text = SUB_TEXT_UNKNOWN.to_string();
            stage.kube_list = scan.kube.kube_list(PhaseOutcome::Stalled);
            if let Some(health) = stages.get_mut(&StageKey::AppHealth) {
                health.icon = IconState::Unknown;
                health.display_sub_text = SUB_TEXT_UNKNOWN.to_string();
            }
        }
        DeploymentStatus::Succeeded => {
            stage.icon = IconState::Success;
            stage.resource_details.clear();
            stage.kube_list = scan.kube.kube_list(PhaseOutcome::Completed);
        }
    }
}

// ─── Status overlays ──────────────────────────────────────────────

fn settle_succeeded(stages: &mut BTreeMap<StageKey, StageState>, pipeline: Pipeline) {
    for key in pipeline.stages().iter().skip(1) {
        let Some(stage) = stages.get_mut(key) else {
            continue;
        };
        if stage.icon != IconState::Success {
            stage.icon = IconState::Success;
            stage.display_sub_text.clear();
        }
        stage.is_collapsed_hint = true;
    }
}

/// Everything after the furthest reported stage is pending. The stage right
/// after a completed one is the active step; the rest are waiting.
fn mark_pending(stages: &mut BTreeMap<StageKey, StageState>, pipeline: Pipeline) {
    let order = pipeline.stages();
    let furthest = order
        .iter()
        .rposition(|k| stages.get(k).is_some_and(|s| !s.icon.is_none()))
        .unwrap_or(0);
    let next_is_active = stages
        .get(&order[furthest])
        .is_some_and(|s| s.icon == IconState::Success);

    for (offset, key) in order[furthest + 1..].iter().enumerate() {
        let Some(stage) = stages.get_mut(key) else {
            continue;
        };
        if *key == StageKey::KubectlApply {
            // Waits on the sync agent even when it is the next step.
            stage.display_sub_text = SUB_TEXT_WAITING.to_string();
            stage.kube_list = waiting_kube_list();
            stage.is_collapsed_hint = false;
        } else if offset == 0 && next_is_active {
            stage.icon = IconState::InProgress;
            stage.display_sub_text = SUB_TEXT_IN_PROGRESS.to_string();
            stage.is_collapsed_hint = false;
        } else {
            stage.display_sub_text = SUB_TEXT_WAITING.to_string();
        }
    }
}

/// Marks the stages a failure made unreachable and returns the inferred
/// failing stage, if the failure was not reported by a stage event.
///
/// Priority for an inferred failure is the pipeline's infrastructure stages
/// in order: the first one that never reported is blamed. An apply that
/// started but never synced is blamed next.
fn cascade_failure(
    stages: &mut BTreeMap<StageKey, StageState>,
    scan: &Scan<'_>,
    pipeline: Pipeline,
) -> Option<StageKey> {
    let reported = pipeline
        .stages()
        .iter()
        .copied()
        .find(|&k| scan.verdict(k) == Some(Verdict::Failed));
    if let Some(failed) = reported {
        mark_unreachable(stages, pipeline.downstream_of(failed));
        return None;
    }

    let inferred = pipeline
        .infra_stages()
        .iter()
        .copied()
        .find(|k| stages.get(k).is_some_and(|s| s.icon.is_none()));
    if let Some(failed) = inferred {
        mark_unreachable(stages, pipeline.from_stage(failed));
        return Some(failed);
    }

    // Apply started but never synced: the apply itself is blamed.
    if scan.verdict(StageKey::KubectlApply) == Some(Verdict::Started) {
        return Some(StageKey::KubectlApply);
    }

    // Every infrastructure step reported: the failure is in app health.
    if scan.verdict(StageKey::KubectlApply) == Some(Verdict::Succeeded)
        && let Some(health) = stages.get_mut(&StageKey::AppHealth)
    {
        health.icon = IconState::Failed;
        health.display_sub_text = SUB_TEXT_FAILED.to_string();
        health.is_collapsed_hint = false;
    }
    None
}

fn mark_health_unconfirmed(
    stages: &mut BTreeMap<StageKey, StageState>,
    scan: &Scan<'_>,
    status: DeploymentStatus,
    deployment_error: &str,
) {
    if scan.verdict(StageKey::KubectlApply) != Some(Verdict::Succeeded) {
        return;
    }
    let Some(health) = stages.get_mut(&StageKey::AppHealth) else {
        return;
    };
    health.icon = if status == DeploymentStatus::TimedOut {
        IconState::TimedOut
    } else {
        IconState::Disconnect
    };
    health.display_sub_text = SUB_TEXT_UNKNOWN.to_string();
    health.timeline_status = deployment_error.to_string();
    health.is_collapsed_hint = false;
}

// ─── Tests ────────────────────────────────────────────────────────
