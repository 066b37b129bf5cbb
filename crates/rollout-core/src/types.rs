use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RolloutError;

// ─── Event Kind ───────────────────────────────────────────────────

/// Timeline event vocabulary reported by the deployment backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DeploymentInitiated,
    GitCommit,
    GitCommitFailed,
    ArgocdSync,
    ArgocdSyncFailed,
    KubectlApplyStarted,
    KubectlApplySynced,
    Healthy,
    Degraded,
    DeploymentFailed,
    DeploymentSuperseded,
    FetchTimedOut,
    UnableToFetchStatus,
    Aborted,
    HelmPackageGenerated,
    HelmManifestPushedToHelmRepo,
    HelmManifestPushedToHelmRepoFailed,
}

impl EventKind {
    pub const ALL: [Self; 17] = [
        Self::DeploymentInitiated,
        Self::GitCommit,
        Self::GitCommitFailed,
        Self::ArgocdSync,
        Self::ArgocdSyncFailed,
        Self::KubectlApplyStarted,
        Self::KubectlApplySynced,
        Self::Healthy,
        Self::Degraded,
        Self::DeploymentFailed,
        Self::DeploymentSuperseded,
        Self::FetchTimedOut,
        Self::UnableToFetchStatus,
        Self::Aborted,
        Self::HelmPackageGenerated,
        Self::HelmManifestPushedToHelmRepo,
        Self::HelmManifestPushedToHelmRepoFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeploymentInitiated => "DEPLOYMENT_INITIATED",
            Self::GitCommit => "GIT_COMMIT",
            Self::GitCommitFailed => "GIT_COMMIT_FAILED",
            Self::ArgocdSync => "ARGOCD_SYNC",
            Self::ArgocdSyncFailed => "ARGOCD_SYNC_FAILED",
            Self::KubectlApplyStarted => "KUBECTL_APPLY_STARTED",
            Self::KubectlApplySynced => "KUBECTL_APPLY_SYNCED",
            Self::Healthy => "HEALTHY",
            Self::Degraded => "DEGRADED",
            Self::DeploymentFailed => "DEPLOYMENT_FAILED",
            Self::DeploymentSuperseded => "DEPLOYMENT_SUPERSEDED",
            Self::FetchTimedOut => "FETCH_TIMED_OUT",
            Self::UnableToFetchStatus => "UNABLE_TO_FETCH_STATUS",
            Self::Aborted => "ABORTED",
            Self::HelmPackageGenerated => "HELM_PACKAGE_GENERATED",
            Self::HelmManifestPushedToHelmRepo => "HELM_MANIFEST_PUSHED_TO_HELM_REPO",
            Self::HelmManifestPushedToHelmRepoFailed => "HELM_MANIFEST_PUSHED_TO_HELM_REPO_FAILED",
        }
    }

    /// Lenient lookup. Accepts the canonical names plus the backend's wire
    /// spellings `FAILED` and `TIMED_OUT`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "FAILED" => return Some(Self::DeploymentFailed),
            "TIMED_OUT" => return Some(Self::FetchTimedOut),
            _ => {}
        }
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }

    /// The pipeline stage this event reports on, if any.
    pub fn stage(self) -> Option<StageKey> {
        match self {
            Self::DeploymentInitiated => Some(StageKey::DeploymentInitiated),
            Self::GitCommit | Self::GitCommitFailed => Some(StageKey::GitCommit),
            Self::ArgocdSync | Self::ArgocdSyncFailed => Some(StageKey::ArgocdSync),
            Self::KubectlApplyStarted | Self::KubectlApplySynced => Some(StageKey::KubectlApply),
            Self::HelmPackageGenerated => Some(StageKey::HelmPackageGenerated),
            Self::HelmManifestPushedToHelmRepo | Self::HelmManifestPushedToHelmRepoFailed => {
                Some(StageKey::HelmManifestPushedToHelmRepo)
            }
            Self::Healthy
            | Self::Degraded
            | Self::DeploymentFailed
            | Self::DeploymentSuperseded
            | Self::FetchTimedOut
            | Self::UnableToFetchStatus
            | Self::Aborted => None,
        }
    }

    /// Whether this event explicitly reports a failed stage.
    pub fn is_stage_failure(self) -> bool {
        matches!(
            self,
            Self::GitCommitFailed | Self::ArgocdSyncFailed | Self::HelmManifestPushedToHelmRepoFailed
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RolloutError::UnknownEventKind(s.to_string()))
    }
}

// ─── Stage Key ────────────────────────────────────────────────────

/// A stage of a deployment pipeline. Variant order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageKey {
    DeploymentInitiated,
    GitCommit,
    ArgocdSync,
    KubectlApply,
    AppHealth,
    HelmPackageGenerated,
    HelmManifestPushedToHelmRepo,
}

impl StageKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeploymentInitiated => "DEPLOYMENT_INITIATED",
            Self::GitCommit => "GIT_COMMIT",
            Self::ArgocdSync => "ARGOCD_SYNC",
            Self::KubectlApply => "KUBECTL_APPLY",
            Self::AppHealth => "APP_HEALTH",
            Self::HelmPackageGenerated => "HELM_PACKAGE_GENERATED",
            Self::HelmManifestPushedToHelmRepo => "HELM_MANIFEST_PUSHED_TO_HELM_REPO",
        }
    }

    /// Default card title. `DeploymentInitiated` gets the trigger user
    /// appended by the reducer.
    pub fn display_text(self) -> &'static str {
        match self {
            Self::DeploymentInitiated => "Deployment initiated",
            Self::GitCommit => "Push manifest to Git",
            Self::ArgocdSync => "Synced with Argo CD",
            Self::KubectlApply => "Apply manifest to Kubernetes",
            Self::AppHealth => "Propagate manifest to Kubernetes resources",
            Self::HelmPackageGenerated => "Generate helm package",
            Self::HelmManifestPushedToHelmRepo => "Push helm package to repository",
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Environment Kind ─────────────────────────────────────────────

/// Target environment flavour; selects which pipeline populates the model.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    /// Cluster-backed environment synced by a GitOps agent.
    #[default]
    Live,
    /// No live cluster: only a Helm package is produced.
    Virtual,
}

impl EnvKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvKind {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "virtual" => Ok(Self::Virtual),
            _ => Err(RolloutError::UnknownEnvKind(s.to_string())),
        }
    }
}

// ─── Resource Phase ───────────────────────────────────────────────

/// Sync hook phase of a resource applied during `KUBECTL_APPLY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourcePhase {
    PreSync,
    Sync,
    PostSync,
    Skip,
    SyncFail,
}

impl ResourcePhase {
    /// Hook phases in precedence order. Used for membership tests; output
    /// ordering is first-seen, never this table.
    pub const TABLE: [Self; 5] = [
        Self::PreSync,
        Self::Sync,
        Self::PostSync,
        Self::Skip,
        Self::SyncFail,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreSync => "PreSync",
            Self::Sync => "Sync",
            Self::PostSync => "PostSync",
            Self::Skip => "Skip",
            Self::SyncFail => "SyncFail",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::TABLE.into_iter().find(|p| p.as_str() == raw)
    }

    /// Position in [`Self::TABLE`].
    pub fn precedence(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourcePhase {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RolloutError::UnknownResourcePhase(s.to_string()))
    }
}

// ─── Wire: Timeline Events ────────────────────────────────────────

/// Per-resource snapshot attached to `KUBECTL_APPLY*` events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceDetail {
    pub resource_kind: String,
    pub resource_name: String,
    /// Raw phase string; unknown phases are kept and ignored downstream.
    pub resource_phase: String,
    pub resource_status: String,
    pub status_message: String,
}

impl ResourceDetail {
    pub fn phase(&self) -> Option<ResourcePhase> {
        ResourcePhase::parse(&self.resource_phase)
    }
}

/// One backend-reported transition in a deployment's lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Raw event kind; see [`TimelineEvent::kind`].
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "crate::time::deserialize_opt")]
    pub status_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_details: Option<Vec<ResourceDetail>>,
}

impl TimelineEvent {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::parse(&self.status)
    }

    pub fn resource_details(&self) -> &[ResourceDetail] {
        self.resource_details.as_deref().unwrap_or(&[])
    }
}

/// Pre-timeline single-field status (`wfrStatus`) of old deployment records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyStatus {
    Healthy,
    Succeeded,
    Failed,
    Degraded,
    Progressing,
    TimedOut,
}

impl LegacyStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Healthy" => Some(Self::Healthy),
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            "Degraded" => Some(Self::Degraded),
            "Progressing" => Some(Self::Progressing),
            "TimedOut" => Some(Self::TimedOut),
            _ => None,
        }
    }

    pub fn deployment_status(self) -> DeploymentStatus {
        match self {
            Self::Healthy | Self::Succeeded => DeploymentStatus::Succeeded,
            Self::Failed | Self::Degraded => DeploymentStatus::Failed,
            Self::Progressing => DeploymentStatus::InProgress,
            Self::TimedOut => DeploymentStatus::TimedOut,
        }
    }
}

impl FromStr for LegacyStatus {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| RolloutError::UnknownLegacyStatus(s.to_string()))
    }
}

/// Timeline endpoint payload for one deployment attempt.
///
/// `wfr_status` (legacy) and `timelines` (current) are mutually exclusive in
/// practice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatusDetails {
    #[serde(deserialize_with = "crate::time::deserialize_opt")]
    pub deployment_started_on: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "crate::time::deserialize_opt")]
    pub deployment_finished_on: Option<DateTime<Utc>>,
    pub triggered_by: String,
    pub status_fetch_count: u32,
    #[serde(deserialize_with = "crate::time::deserialize_opt")]
    pub status_last_fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wfr_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timelines: Option<Vec<TimelineEvent>>,
}

impl DeploymentStatusDetails {
    pub fn events(&self) -> &[TimelineEvent] {
        self.timelines.as_deref().unwrap_or(&[])
    }
}

// ─── Model: Status & Icons ────────────────────────────────────────

/// Overall deployment outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentStatus {
    #[default]
    #[serde(rename = "inprogress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "superseded")]
    Superseded,
    #[serde(rename = "timed_out")]
    TimedOut,
    #[serde(rename = "unable_to_fetch")]
    UnableToFetch,
}

impl DeploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "inprogress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
            Self::TimedOut => "timed_out",
            Self::UnableToFetch => "unable_to_fetch",
        }
    }

    pub fn display_text(self) -> &'static str {
        match self {
            Self::InProgress => "In progress",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Superseded => "Superseded",
            Self::TimedOut => "Timed out",
            Self::UnableToFetch => "Unable to fetch status",
        }
    }

    /// Terminal for polling purposes. Timeouts are not: the deployment may
    /// still resolve.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Superseded)
    }

    /// Whether a manual resync may be offered for this status.
    pub fn allows_manual_resync(self) -> bool {
        matches!(self, Self::TimedOut | Self::UnableToFetch)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Icon hint for a stage card or breadcrumb entry. `None` renders blank.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconState {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "inprogress")]
    InProgress,
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "unreachable")]
    Unreachable,
    #[serde(rename = "disconnect")]
    Disconnect,
    #[serde(rename = "timed_out")]
    TimedOut,
    #[serde(rename = "loading")]
    Loading,
}

impl IconState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::InProgress => "inprogress",
            Self::Unknown => "unknown",
            Self::Unreachable => "unreachable",
            Self::Disconnect => "disconnect",
            Self::TimedOut => "timed_out",
            Self::Loading => "loading",
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

// ─── Model: Stages ────────────────────────────────────────────────

/// One entry of the "apply manifest" progress breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubeListItem {
    pub icon: IconState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ResourcePhase>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    pub icon: IconState,
    pub display_text: String,
    pub display_sub_text: String,
    pub time: Option<DateTime<Utc>>,
    pub timeline_status: String,
    /// Default collapse state. Presentation may override after the user
    /// toggles; the reducer keeps no toggle history.
    pub is_collapsed_hint: bool,
    pub resource_details: Vec<ResourceDetail>,
    pub kube_list: Vec<KubeListItem>,
}

impl StageState {
    pub fn new(display_text: impl Into<String>) -> Self {
        Self {
            icon: IconState::None,
            display_text: display_text.into(),
            display_sub_text: String::new(),
            time: None,
            timeline_status: String::new(),
            is_collapsed_hint: true,
            resource_details: Vec::new(),
            kube_list: Vec::new(),
        }
    }
}

/// Reduced, render-ready view of one deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownModel {
    pub deployment_status: DeploymentStatus,
    pub deployment_status_text: String,
    pub deployment_trigger_time: Option<DateTime<Utc>>,
    pub deployment_end_time: Option<DateTime<Utc>>,
    pub deployment_error: String,
    /// First infrastructure stage inferred to have failed without reporting.
    pub non_deployment_error: Option<StageKey>,
    pub triggered_by: String,
    pub env_kind: EnvKind,
    /// Set when the stream carries an `ABORTED` event.
    pub aborted: bool,
    pub stages: BTreeMap<StageKey, StageState>,
}

impl BreakdownModel {
    pub fn stage(&self, key: StageKey) -> Option<&StageState> {
        self.stages.get(&key)
    }
}

// ─── Identity ─────────────────────────────────────────────────────

/// Identity of the deployment attempt a view observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewKey {
    pub app_id: u64,
    pub env_id: u64,
    /// Specific attempt (workflow runner / installed-app history id).
    /// `None` tracks the latest attempt.
    pub attempt_id: Option<u64>,
    /// Helm-installed app (app-store endpoints) rather than a pipeline app.
    pub helm_app: bool,
}

impl ViewKey {
    pub fn new(app_id: u64, env_id: u64) -> Self {
        Self {
            app_id,
            env_id,
            attempt_id: None,
            helm_app: false,
        }
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt_id: u64) -> Self {
        self.attempt_id = Some(attempt_id);
        self
    }

    #[must_use]
    pub fn helm(mut self) -> Self {
        self.helm_app = true;
        self
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app/{}/env/{}", self.app_id, self.env_id)?;
        if let Some(attempt) = self.attempt_id {
            write!(f, "/attempt/{attempt}")?;
        }
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_display_and_parse() {
        for k in EventKind::ALL {
            let parsed = k.to_string().parse::<EventKind>().expect("parse");
            assert_eq!(k, parsed);
        }
    }

    #[test]
    fn event_kind_wire_aliases() {
        assert_eq!(EventKind::parse("FAILED"), Some(EventKind::DeploymentFailed));
        assert_eq!(EventKind::parse("TIMED_OUT"), Some(EventKind::FetchTimedOut));
        assert_eq!(EventKind::parse("KUBECTL_APPLY"), None);
        assert!("nope".parse::<EventKind>().is_err());
    }

    #[test]
    fn event_kind_stage_mapping() {
        assert_eq!(EventKind::GitCommitFailed.stage(), Some(StageKey::GitCommit));
        assert_eq!(
            EventKind::KubectlApplySynced.stage(),
            Some(StageKey::KubectlApply)
        );
        assert_eq!(EventKind::Healthy.stage(), None);
        assert!(EventKind::ArgocdSyncFailed.is_stage_failure());
        assert!(!EventKind::DeploymentFailed.is_stage_failure());
    }

    #[test]
    fn stage_key_order_is_pipeline_order() {
        assert!(StageKey::DeploymentInitiated < StageKey::GitCommit);
        assert!(StageKey::GitCommit < StageKey::ArgocdSync);
        assert!(StageKey::ArgocdSync < StageKey::KubectlApply);
        assert!(StageKey::KubectlApply < StageKey::AppHealth);
        assert!(StageKey::HelmPackageGenerated < StageKey::HelmManifestPushedToHelmRepo);
    }

    #[test]
    fn stage_key_serializes_screaming_snake() {
        let json = serde_json::to_string(&StageKey::ArgocdSync).expect("serialize");
        assert_eq!(json, "\"ARGOCD_SYNC\"");
    }

    #[test]
    fn resource_phase_precedence_matches_table() {
        for (idx, phase) in ResourcePhase::TABLE.into_iter().enumerate() {
            assert_eq!(phase.precedence(), idx);
        }
        assert_eq!(ResourcePhase::parse("PostSync"), Some(ResourcePhase::PostSync));
        assert_eq!(ResourcePhase::parse("postsync"), None);
    }

    #[test]
    fn legacy_status_mapping() {
        assert_eq!(
            LegacyStatus::Healthy.deployment_status(),
            DeploymentStatus::Succeeded
        );
        assert_eq!(
            LegacyStatus::Degraded.deployment_status(),
            DeploymentStatus::Failed
        );
        assert_eq!(
            "Progressing".parse::<LegacyStatus>().expect("parse").deployment_status(),
            DeploymentStatus::InProgress
        );
        assert!("Running".parse::<LegacyStatus>().is_err());
    }

    #[test]
    fn deployment_status_terminality() {
        assert!(DeploymentStatus::Succeeded.is_terminal());
        assert!(DeploymentStatus::Superseded.is_terminal());
        assert!(!DeploymentStatus::TimedOut.is_terminal());
        assert!(!DeploymentStatus::UnableToFetch.is_terminal());
        assert!(DeploymentStatus::UnableToFetch.allows_manual_resync());
        assert!(!DeploymentStatus::InProgress.allows_manual_resync());
    }

    #[test]
    fn icon_state_serializes_blank_for_none() {
        let json = serde_json::to_string(&IconState::None).expect("serialize");
        assert_eq!(json, "\"\"");
        let json = serde_json::to_string(&IconState::TimedOut).expect("serialize");
        assert_eq!(json, "\"timed_out\"");
    }

    #[test]
    fn details_decode_backend_payload() {
        let raw = r#"{
            "deploymentStartedOn": "2024-05-01T10:00:00Z",
            "deploymentFinishedOn": "0001-01-01T00:00:00Z",
            "triggeredBy": "admin",
            "statusFetchCount": 3,
            "statusLastFetchedAt": "2024-05-01T10:05:00Z",
            "timelines": [
                {"status": "DEPLOYMENT_INITIATED", "statusTime": "2024-05-01T10:00:00Z", "statusDetail": "started"},
                {"status": "KUBECTL_APPLY_STARTED", "statusTime": "2024-05-01T10:01:00Z", "statusDetail": "",
                 "resourceDetails": [{"resourceKind": "Job", "resourceName": "migrate", "resourcePhase": "PreSync",
                                      "resourceStatus": "Running", "statusMessage": ""}]},
                {"status": "SOMETHING_NEW", "statusTime": "garbage"}
            ]
        }"#;
        let details: DeploymentStatusDetails = serde_json::from_str(raw).expect("decode");
        assert_eq!(details.triggered_by, "admin");
        assert!(details.deployment_finished_on.is_none());
        assert_eq!(details.events().len(), 3);
        assert_eq!(details.events()[1].resource_details()[0].phase(), Some(ResourcePhase::PreSync));
        assert_eq!(details.events()[2].kind(), None);
        assert!(details.events()[2].status_time.is_none());
    }

    #[test]
    fn view_key_display() {
        let key = ViewKey::new(12, 3).with_attempt(99);
        assert_eq!(key.to_string(), "app/12/env/3/attempt/99");
        assert!(ViewKey::new(1, 2).helm().helm_app);
    }
}
