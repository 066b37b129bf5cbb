//! Fixed stage pipelines and the ordered-slice operations over them.
//!
//! Every cascade in the reducer ("mark everything after X unreachable") is a
//! slice operation on one of these lists, so the live and virtual pipelines
//! share the same logic.

use std::collections::BTreeMap;

use crate::types::{EnvKind, IconState, StageKey, StageState};

/// Ordered stage list for one environment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
    stages: &'static [StageKey],
    /// Trailing stages that report application health rather than an
    /// infrastructure step. Never candidates for `nonDeploymentError`.
    health_tail: usize,
}

const LIVE_STAGES: &[StageKey] = &[
    StageKey::DeploymentInitiated,
    StageKey::GitCommit,
    StageKey::ArgocdSync,
    StageKey::KubectlApply,
    StageKey::AppHealth,
];

const VIRTUAL_STAGES: &[StageKey] = &[
    StageKey::DeploymentInitiated,
    StageKey::HelmPackageGenerated,
    StageKey::HelmManifestPushedToHelmRepo,
];

const VIRTUAL_STAGES_NO_PUSH: &[StageKey] =
    &[StageKey::DeploymentInitiated, StageKey::HelmPackageGenerated];

impl Pipeline {
    /// Cluster pipeline: initiated → git → argo sync → apply → health.
    pub const LIVE: Self = Self {
        stages: LIVE_STAGES,
        health_tail: 1,
    };

    /// Virtual pipeline including the optional helm-repo push stage.
    pub const VIRTUAL: Self = Self {
        stages: VIRTUAL_STAGES,
        health_tail: 0,
    };

    /// Virtual pipeline for deployments that never push to a helm repo.
    pub const VIRTUAL_PACKAGE_ONLY: Self = Self {
        stages: VIRTUAL_STAGES_NO_PUSH,
        health_tail: 0,
    };

    /// Full pipeline for an environment kind.
    pub fn for_env(env: EnvKind) -> Self {
        match env {
            EnvKind::Live => Self::LIVE,
            EnvKind::Virtual => Self::VIRTUAL,
        }
    }

    pub fn stages(&self) -> &'static [StageKey] {
        self.stages
    }

    pub fn contains(&self, key: StageKey) -> bool {
        self.stages.contains(&key)
    }

    pub fn position(&self, key: StageKey) -> Option<usize> {
        self.stages.iter().position(|&k| k == key)
    }

    /// Final stage of the pipeline.
    pub fn last(&self) -> StageKey {
        // Pipelines are non-empty constants.
        self.stages[self.stages.len() - 1]
    }

    /// Stages strictly after `key`. Empty when `key` is last or absent.
    pub fn downstream_of(&self, key: StageKey) -> &'static [StageKey] {
        let stages = self.stages;
        match self.position(key) {
            Some(idx) => &stages[idx + 1..],
            None => &[],
        }
    }

    /// `key` and every stage after it.
    pub fn from_stage(&self, key: StageKey) -> &'static [StageKey] {
        let stages = self.stages;
        match self.position(key) {
            Some(idx) => &stages[idx..],
            None => &[],
        }
    }

    /// Infrastructure stages after `DEPLOYMENT_INITIATED`, in priority order
    /// for attributing an unreported failure.
    pub fn infra_stages(&self) -> &'static [StageKey] {
        let stages = self.stages;
        &stages[1..stages.len() - self.health_tail]
    }

    /// Fresh stage map with default display texts.
    pub fn blank_stages(&self) -> BTreeMap<StageKey, StageState> {
        self.stages
            .iter()
            .map(|&key| (key, StageState::new(key.display_text())))
            .collect()
    }
}

/// Mark every listed stage `unreachable` and clear its sub-text.
pub fn mark_unreachable(stages: &mut BTreeMap<StageKey, StageState>, keys: &[StageKey]) {
    for key in keys {
        if let Some(stage) = stages.get_mut(key) {
            stage.icon = IconState::Unreachable;
            stage.display_sub_text.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_pipeline_order() {
        assert_eq!(
            Pipeline::LIVE.stages(),
            &[
                StageKey::DeploymentInitiated,
                StageKey::GitCommit,
                StageKey::ArgocdSync,
                StageKey::KubectlApply,
                StageKey::AppHealth,
            ]
        );
        assert_eq!(Pipeline::LIVE.last(), StageKey::AppHealth);
    }

    #[test]
    fn downstream_is_strictly_after() {
        assert_eq!(
            Pipeline::LIVE.downstream_of(StageKey::ArgocdSync),
            &[StageKey::KubectlApply, StageKey::AppHealth]
        );
        assert!(Pipeline::LIVE.downstream_of(StageKey::AppHealth).is_empty());
        assert!(
            Pipeline::LIVE
                .downstream_of(StageKey::HelmPackageGenerated)
                .is_empty()
        );
    }

    #[test]
    fn from_stage_is_inclusive() {
        assert_eq!(
            Pipeline::LIVE.from_stage(StageKey::KubectlApply),
            &[StageKey::KubectlApply, StageKey::AppHealth]
        );
    }

    #[test]
    fn infra_stages_exclude_initiated_and_health() {
        assert_eq!(
            Pipeline::LIVE.infra_stages(),
            &[StageKey::GitCommit, StageKey::ArgocdSync, StageKey::KubectlApply]
        );
        assert_eq!(
            Pipeline::VIRTUAL.infra_stages(),
            &[
                StageKey::HelmPackageGenerated,
                StageKey::HelmManifestPushedToHelmRepo
            ]
        );
    }

    #[test]
    fn pipelines_never_mix() {
        for key in Pipeline::VIRTUAL.stages() {
            if *key != StageKey::DeploymentInitiated {
                assert!(!Pipeline::LIVE.contains(*key));
            }
        }
        assert_eq!(Pipeline::for_env(EnvKind::Virtual), Pipeline::VIRTUAL);
    }

    #[test]
    fn mark_unreachable_clears_subtext() {
        let mut stages = Pipeline::LIVE.blank_stages();
        if let Some(s) = stages.get_mut(&StageKey::AppHealth) {
            s.display_sub_text = "Failed".into();
            s.icon = IconState::Failed;
        }
        mark_unreachable(
            &mut stages,
            Pipeline::LIVE.downstream_of(StageKey::ArgocdSync),
        );
        let health = &stages[&StageKey::AppHealth];
        assert_eq!(health.icon, IconState::Unreachable);
        assert!(health.display_sub_text.is_empty());
        assert_eq!(stages[&StageKey::ArgocdSync].icon, IconState::None);
    }
}
