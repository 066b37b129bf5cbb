//! Resource-phase accumulator for the `KUBECTL_APPLY` breadcrumb.
//!
//! Fed with the `resourceDetails` of every `KUBECTL_APPLY*` event during the
//! reducer's reverse scan. Phases are kept in first-seen order, each at most
//! once. The fixed hook-phase table only decides membership.

use crate::types::{IconState, KubeListItem, ResourceDetail, ResourcePhase};

/// Leading breadcrumb entry once the sync agent picked the manifest up.
pub const STARTED_MESSAGE: &str = "Started by Argo CD";

/// Placeholder entries shown before the apply stage starts.
pub const WAITING_MESSAGES: [&str; 2] = [
    "Waiting to be started by Argo CD",
    "Create and update resources based on manifest",
];

/// How the current phase entry should be rendered when the list is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Apply finished: every entry is `success`.
    Completed,
    /// Apply still running: current phase shows `loading`.
    Active,
    /// Apply stalled or failed: current phase shows `failed`.
    Stalled,
}

#[derive(Debug, Clone, Default)]
pub struct ResourcePhaseAccumulator {
    phases: Vec<ResourcePhase>,
    current: Option<ResourcePhase>,
}

impl ResourcePhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resource snapshot of one event.
    ///
    /// Events must be observed most-recent first. The first event carrying a
    /// known phase fixes the current phase: its most advanced hook phase.
    pub fn observe(&mut self, details: &[ResourceDetail]) {
        let mut event_max: Option<ResourcePhase> = None;
        for phase in details.iter().filter_map(ResourceDetail::phase) {
            if !self.phases.contains(&phase) {
                self.phases.push(phase);
            }
            if event_max.is_none_or(|m| phase.precedence() > m.precedence()) {
                event_max = Some(phase);
            }
        }
        if self.current.is_none() {
            self.current = event_max;
        }
    }

    /// Phase the stream is currently in, if any event reported one.
    pub fn current_phase(&self) -> Option<ResourcePhase> {
        self.current
    }

    /// Phases in first-seen order.
    pub fn phases(&self) -> &[ResourcePhase] {
        &self.phases
    }

    /// Resource details of `details` that belong to the current phase.
    pub fn current_resources(&self, details: &[ResourceDetail]) -> Vec<ResourceDetail> {
        match self.current {
            Some(current) => details
                .iter()
                .filter(|d| d.phase() == Some(current))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Build the breadcrumb list.
    pub fn kube_list(&self, outcome: PhaseOutcome) -> Vec<KubeListItem> {
        let current_icon = match outcome {
            PhaseOutcome::Completed => IconState::Success,
            PhaseOutcome::Active => IconState::Loading,
            PhaseOutcome::Stalled => IconState::Failed,
        };

        let mut items = Vec::with_capacity(self.phases.len() + 1);
        items.push(KubeListItem {
            icon: IconState::Success,
            phase: None,
            message: STARTED_MESSAGE.to_string(),
        });
        items.extend(self.phases.iter().map(|&phase| KubeListItem {
            icon: if Some(phase) == self.current {
                current_icon
            } else {
                IconState::Success
            },
            phase: Some(phase),
            message: format!("{phase}: Create and update resources based on manifest"),
        }));
        items
    }
}

/// Placeholder breadcrumb for an apply stage that has not started.
pub fn waiting_kube_list() -> Vec<KubeListItem> {
    WAITING_MESSAGES
        .iter()
        .map(|msg| KubeListItem {
            icon: IconState::None,
            phase: None,
            message: (*msg).to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(phase: &str, name: &str) -> ResourceDetail {
        ResourceDetail {
            resource_kind: "Job".into(),
            resource_name: name.into(),
            resource_phase: phase.into(),
            resource_status: "Running".into(),
            status_message: String::new(),
        }
    }

    #[test]
    fn empty_accumulator_lists_only_started_entry() {
        let acc = ResourcePhaseAccumulator::new();
        let list = acc.kube_list(PhaseOutcome::Active);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].message, STARTED_MESSAGE);
        assert_eq!(list[0].icon, IconState::Success);
        assert_eq!(acc.current_phase(), None);
    }

    #[test]
    fn phases_kept_in_first_seen_order() {
        let mut acc = ResourcePhaseAccumulator::new();
        // Most recent event first.
        acc.observe(&[detail("PostSync", "notify")]);
        acc.observe(&[detail("Sync", "web"), detail("PreSync", "migrate")]);
        assert_eq!(
            acc.phases(),
            &[
                ResourcePhase::PostSync,
                ResourcePhase::Sync,
                ResourcePhase::PreSync
            ]
        );
    }

    #[test]
    fn each_phase_appears_once() {
        let mut acc = ResourcePhaseAccumulator::new();
        acc.observe(&[detail("Sync", "a"), detail("Sync", "b")]);
        acc.observe(&[detail("Sync", "c")]);
        assert_eq!(acc.phases(), &[ResourcePhase::Sync]);
    }

    #[test]
    fn unknown_phases_are_ignored() {
        let mut acc = ResourcePhaseAccumulator::new();
        acc.observe(&[detail("Prune", "x"), detail("", "y")]);
        assert!(acc.phases().is_empty());
        assert_eq!(acc.current_phase(), None);
    }

    #[test]
    fn current_phase_comes_from_most_recent_event() {
        let mut acc = ResourcePhaseAccumulator::new();
        acc.observe(&[detail("PreSync", "migrate"), detail("Sync", "web")]);
        acc.observe(&[detail("PostSync", "notify")]);
        assert_eq!(acc.current_phase(), Some(ResourcePhase::Sync));
    }

    #[test]
    fn current_phase_icon_follows_outcome() {
        let mut acc = ResourcePhaseAccumulator::new();
        acc.observe(&[detail("Sync", "web")]);
        acc.observe(&[detail("PreSync", "migrate")]);

        let active = acc.kube_list(PhaseOutcome::Active);
        assert_eq!(active.len(), 3);
        assert_eq!(active[1].phase, Some(ResourcePhase::Sync));
        assert_eq!(active[1].icon, IconState::Loading);
        assert_eq!(active[2].icon, IconState::Success);
        assert_eq!(
            active[1].message,
            "Sync: Create and update resources based on manifest"
        );

        let stalled = acc.kube_list(PhaseOutcome::Stalled);
        assert_eq!(stalled[1].icon, IconState::Failed);

        let done = acc.kube_list(PhaseOutcome::Completed);
        assert!(done.iter().all(|i| i.icon == IconState::Success));
    }

    #[test]
    fn current_resources_filters_by_phase() {
        let mut acc = ResourcePhaseAccumulator::new();
        let details = vec![detail("PreSync", "migrate"), detail("Sync", "web")];
        acc.observe(&details);
        let current = acc.current_resources(&details);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].resource_name, "web");
    }

    #[test]
    fn waiting_placeholders() {
        let list = waiting_kube_list();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|i| i.icon == IconState::None));
        assert_eq!(list[0].message, "Waiting to be started by Argo CD");
    }
}
