//! Polling cadence, driver state machine, and the stale-response guard.
//!
//! Pure, testable state machines with no IO or async dependencies. The async
//! timer loop in the runtime crate asks these types what to do next.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RolloutError;
use crate::types::{BreakdownModel, DeploymentStatus, ViewKey};

// ─── Cadence ─────────────────────────────────────────────────────

/// Delay between fetch+reduce cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollCadence {
    /// Delay while the deployment is in progress (default 10000).
    pub in_progress_ms: u64,
    /// Delay for any other non-terminal status (default 30000).
    pub idle_ms: u64,
}

impl Default for PollCadence {
    fn default() -> Self {
        Self {
            in_progress_ms: 10_000,
            idle_ms: 30_000,
        }
    }
}

impl PollCadence {
    /// Delay before the next fetch. Only the reduced status is consulted;
    /// pod scheduling state is not part of the model.
    pub fn delay_for(&self, status: DeploymentStatus) -> Duration {
        let ms = if status == DeploymentStatus::InProgress {
            self.in_progress_ms
        } else {
            self.idle_ms
        };
        Duration::from_millis(ms)
    }
}

// ─── Driver State Machine ────────────────────────────────────────

/// Why a driver stopped scheduling fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "status")]
pub enum StopReason {
    /// Deployment reached a terminal status.
    Terminal(DeploymentStatus),
    /// The stream carried an explicit abort.
    Aborted,
    /// Fetching the timeline failed; recovery is caller-initiated.
    FetchFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// A next fetch is (or will be) scheduled.
    Active,
    Stopped(StopReason),
    /// Torn down by the owner; never resumes.
    Cancelled,
}

impl DriverState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Decision returned after each settled fetch+reduce cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    /// Fetch again after the delay.
    FetchAfter(Duration),
    /// Stop scheduling.
    Stop(StopReason),
    /// The driver was cancelled while the cycle was in flight; discard it.
    Discard,
}

/// Tracks the polling state of one observed deployment.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    cadence: PollCadence,
    state: DriverState,
}

impl PollScheduler {
    pub fn new(cadence: PollCadence) -> Self {
        Self {
            cadence,
            state: DriverState::Active,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn cadence(&self) -> PollCadence {
        self.cadence
    }

    /// Decide what follows a successful fetch that produced `model`.
    ///
    /// `TIMED_OUT` and `UNABLE_TO_FETCH` keep polling at the idle cadence:
    /// the deployment may still resolve.
    pub fn on_model(&mut self, model: &BreakdownModel) -> PollDecision {
        match self.state {
            DriverState::Cancelled => return PollDecision::Discard,
            DriverState::Stopped(reason) => return PollDecision::Stop(reason),
            DriverState::Active => {}
        }

        let status = model.deployment_status;
        let stop = if model.aborted {
            Some(StopReason::Aborted)
        } else if status.is_terminal() {
            Some(StopReason::Terminal(status))
        } else {
            None
        };

        match stop {
            Some(reason) => {
                self.state = DriverState::Stopped(reason);
                PollDecision::Stop(reason)
            }
            None => PollDecision::FetchAfter(self.cadence.delay_for(status)),
        }
    }

    /// A fetch failed. No automatic retry.
    pub fn on_fetch_failure(&mut self) -> PollDecision {
        match self.state {
            DriverState::Cancelled => PollDecision::Discard,
            DriverState::Stopped(reason) => PollDecision::Stop(reason),
            DriverState::Active => {
                self.state = DriverState::Stopped(StopReason::FetchFailed);
                PollDecision::Stop(StopReason::FetchFailed)
            }
        }
    }

    /// View teardown or identity change. Absorbing.
    pub fn cancel(&mut self) {
        self.state = DriverState::Cancelled;
    }
}

// ─── Stale-Response Guard ────────────────────────────────────────

/// Identifies the view a fetch was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTicket {
    pub view: ViewKey,
    pub generation: u64,
}

/// Rejects responses issued for a view that is no longer current.
///
/// Every switch bumps the generation, so a response for the same deployment
/// issued before a teardown and re-open is still rejected.
#[derive(Debug, Clone, Default)]
pub struct StaleGuard {
    current: Option<ViewKey>,
    generation: u64,
}

impl StaleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `view` the current view and return the ticket for its fetches.
    pub fn switch_to(&mut self, view: ViewKey) -> ResponseTicket {
        self.generation += 1;
        self.current = Some(view.clone());
        ResponseTicket {
            view,
            generation: self.generation,
        }
    }

    /// No view is current; every outstanding ticket goes stale.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    pub fn current(&self) -> Option<&ViewKey> {
        self.current.as_ref()
    }

    pub fn accepts(&self, ticket: &ResponseTicket) -> bool {
        ticket.generation == self.generation && self.current.as_ref() == Some(&ticket.view)
    }
}

// ─── Manual Resync ───────────────────────────────────────────────

/// Whether a manual resync may be triggered for a deployment in `status`.
pub fn check_manual_resync(status: DeploymentStatus) -> Result<(), RolloutError> {
    if status.allows_manual_resync() {
        Ok(())
    } else {
        Err(RolloutError::ResyncNotAllowed(status))
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnvKind;
    use std::collections::BTreeMap;

    fn model(status: DeploymentStatus) -> BreakdownModel {
        BreakdownModel {
            deployment_status: status,
            deployment_status_text: status.display_text().to_string(),
            deployment_trigger_time: None,
            deployment_end_time: None,
            deployment_error: String::new(),
            non_deployment_error: None,
            triggered_by: String::new(),
            env_kind: EnvKind::Live,
            aborted: false,
            stages: BTreeMap::new(),
        }
    }

    #[test]
    fn in_progress_polls_every_ten_seconds() {
        let mut s = PollScheduler::new(PollCadence::default());
        assert_eq!(
            s.on_model(&model(DeploymentStatus::InProgress)),
            PollDecision::FetchAfter(Duration::from_millis(10_000))
        );
        assert!(s.state().is_active());
    }

    #[test]
    fn succeeded_stops_polling() {
        let mut s = PollScheduler::new(PollCadence::default());
        assert_eq!(
            s.on_model(&model(DeploymentStatus::Succeeded)),
            PollDecision::Stop(StopReason::Terminal(DeploymentStatus::Succeeded))
        );
        assert_eq!(
            s.state(),
            DriverState::Stopped(StopReason::Terminal(DeploymentStatus::Succeeded))
        );
        // Stays stopped even if a later model looks active.
        assert!(matches!(
            s.on_model(&model(DeploymentStatus::InProgress)),
            PollDecision::Stop(_)
        ));
    }

    #[test]
    fn timeouts_keep_polling_at_idle_cadence() {
        let mut s = PollScheduler::new(PollCadence::default());
        for status in [DeploymentStatus::TimedOut, DeploymentStatus::UnableToFetch] {
            assert_eq!(
                s.on_model(&model(status)),
                PollDecision::FetchAfter(Duration::from_millis(30_000))
            );
        }
    }

    #[test]
    fn aborted_overrides_status() {
        let mut s = PollScheduler::new(PollCadence::default());
        let mut m = model(DeploymentStatus::InProgress);
        m.aborted = true;
        assert_eq!(s.on_model(&m), PollDecision::Stop(StopReason::Aborted));
    }

    #[test]
    fn fetch_failure_stops() {
        let mut s = PollScheduler::new(PollCadence::default());
        assert_eq!(
            s.on_fetch_failure(),
            PollDecision::Stop(StopReason::FetchFailed)
        );
        assert_eq!(s.state(), DriverState::Stopped(StopReason::FetchFailed));
    }

    #[test]
    fn cancelled_discards_in_flight_results() {
        let mut s = PollScheduler::new(PollCadence::default());
        s.cancel();
        assert_eq!(
            s.on_model(&model(DeploymentStatus::InProgress)),
            PollDecision::Discard
        );
        assert_eq!(s.on_fetch_failure(), PollDecision::Discard);
        assert_eq!(s.state(), DriverState::Cancelled);
    }

    #[test]
    fn custom_cadence() {
        let cadence = PollCadence {
            in_progress_ms: 500,
            idle_ms: 2_000,
        };
        assert_eq!(
            cadence.delay_for(DeploymentStatus::InProgress),
            Duration::from_millis(500)
        );
        assert_eq!(
            cadence.delay_for(DeploymentStatus::Failed),
            Duration::from_millis(2_000)
        );
        assert_eq!(
            cadence.delay_for(DeploymentStatus::TimedOut),
            Duration::from_millis(2_000)
        );
    }

    #[test]
    fn stale_guard_rejects_previous_view() {
        let mut guard = StaleGuard::new();
        let old = guard.switch_to(ViewKey::new(1, 1));
        assert!(guard.accepts(&old));

        let new = guard.switch_to(ViewKey::new(1, 2));
        assert!(!guard.accepts(&old));
        assert!(guard.accepts(&new));
    }

    #[test]
    fn stale_guard_rejects_same_view_after_reopen() {
        let mut guard = StaleGuard::new();
        let first = guard.switch_to(ViewKey::new(7, 3));
        guard.clear();
        assert!(!guard.accepts(&first));
        assert!(guard.current().is_none());

        let second = guard.switch_to(ViewKey::new(7, 3));
        assert!(!guard.accepts(&first));
        assert!(guard.accepts(&second));
    }

    #[test]
    fn manual_resync_only_when_status_unknown() {
        assert!(check_manual_resync(DeploymentStatus::TimedOut).is_ok());
        assert!(check_manual_resync(DeploymentStatus::UnableToFetch).is_ok());
        assert_eq!(
            check_manual_resync(DeploymentStatus::Succeeded),
            Err(RolloutError::ResyncNotAllowed(DeploymentStatus::Succeeded))
        );
    }
}
