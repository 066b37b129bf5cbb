//! Async polling driver for one observed deployment.
//!
//! Each cycle fetches the timeline, reduces it, publishes the model and asks
//! [`PollScheduler`] what to do next. The next fetch is a single-shot sleep
//! armed only after the previous cycle settled, so cycles never overlap.
//! Publication goes through the shared [`StaleGuard`]: once the owner switched
//! to another view, nothing from this driver reaches subscribers.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rollout_core::schedule::{
    DriverState, PollCadence, PollDecision, PollScheduler, ResponseTicket, StaleGuard,
    check_manual_resync,
};
use rollout_core::types::{BreakdownModel, EnvKind, ViewKey};
use rollout_core::{RolloutError, reduce};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::source::{ResyncTrigger, SourceError, TimelineSource};

pub type SharedGuard = Arc<Mutex<StaleGuard>>;

/// What subscribers see after each settled cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSnapshot {
    pub view: ViewKey,
    /// Last successfully reduced model. Kept across a later fetch failure.
    pub model: Option<BreakdownModel>,
    pub state: DriverState,
    pub last_error: Option<String>,
    pub fetches: u64,
}

impl DriverSnapshot {
    fn new(view: ViewKey) -> Self {
        Self {
            view,
            model: None,
            state: DriverState::Active,
            last_error: None,
            fetches: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("no status has been fetched yet")]
    NoModel,

    #[error(transparent)]
    NotAllowed(#[from] RolloutError),

    #[error("cannot fetch current status: {0}")]
    Fetch(SourceError),

    #[error("resync failed: {0}")]
    Trigger(#[from] SourceError),
}

/// Trigger a manual resync for `view` if `model` permits it.
///
/// Never touches the model or the driver; the effect shows up on a later
/// fetch.
pub async fn resync_checked<T: ResyncTrigger>(
    trigger: &T,
    view: &ViewKey,
    model: Option<&BreakdownModel>,
) -> Result<(), ResyncError> {
    let model = model.ok_or(ResyncError::NoModel)?;
    check_manual_resync(model.deployment_status)?;
    tracing::info!(%view, status = %model.deployment_status, "manual resync requested");
    trigger.trigger_resync(view).await.map_err(|e| {
        tracing::warn!(%view, error = %e, "manual resync failed");
        ResyncError::from(e)
    })
}

// ─── Driver Handle ───────────────────────────────────────────────

/// Handle to a running driver task. Dropping it cancels the task.
pub struct PollingDriver {
    view: ViewKey,
    cancel: CancellationToken,
    snapshot_rx: watch::Receiver<DriverSnapshot>,
}

impl PollingDriver {
    /// Start polling the view named by `ticket`. Publications are dropped as
    /// soon as `guard` no longer accepts the ticket.
    pub fn spawn<S>(
        source: Arc<S>,
        ticket: ResponseTicket,
        guard: SharedGuard,
        env: EnvKind,
        cadence: PollCadence,
    ) -> Self
    where
        S: TimelineSource + 'static,
    {
        let view = ticket.view.clone();
        let (tx, snapshot_rx) = watch::channel(DriverSnapshot::new(view.clone()));
        let cancel = CancellationToken::new();

        tracing::info!(%view, ?env, ?cadence, "driver started");
        let task = DriverTask {
            source,
            env,
            scheduler: PollScheduler::new(cadence),
            cancel: cancel.clone(),
            publisher: Publisher { tx, guard, ticket },
        };
        tokio::spawn(task.run());

        Self {
            view,
            cancel,
            snapshot_rx,
        }
    }

    pub fn view(&self) -> &ViewKey {
        &self.view
    }

    pub fn subscribe(&self) -> watch::Receiver<DriverSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> DriverSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Cancel the task. It exits at its next await point, abandoning an
    /// in-flight fetch, and never arms another sleep.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[allow(dead_code)] // `rollout resync` goes through resync_checked directly
    pub async fn resync<T: ResyncTrigger>(&self, trigger: &T) -> Result<(), ResyncError> {
        let model = self.snapshot().model;
        resync_checked(trigger, &self.view, model.as_ref()).await
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock(guard: &SharedGuard) -> std::sync::MutexGuard<'_, StaleGuard> {
    guard.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Task ────────────────────────────────────────────────────────

struct Publisher {
    tx: watch::Sender<DriverSnapshot>,
    guard: SharedGuard,
    ticket: ResponseTicket,
}

impl Publisher {
    /// Apply `update` unless the ticket went stale. The guard stays locked
    /// while sending so a concurrent switch cannot interleave.
    fn publish(&self, update: impl FnOnce(&mut DriverSnapshot)) -> bool {
        let guard = lock(&self.guard);
        if !guard.accepts(&self.ticket) {
            tracing::debug!(view = %self.ticket.view, "stale response discarded");
            return false;
        }
        self.tx.send_modify(update);
        true
    }
}

struct DriverTask<S> {
    source: Arc<S>,
    env: EnvKind,
    scheduler: PollScheduler,
    cancel: CancellationToken,
    publisher: Publisher,
}

impl<S: TimelineSource> DriverTask<S> {
    async fn run(mut self) {
        let view = self.publisher.ticket.view.clone();

        loop {
            let fetched = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                result = self.source.fetch_timeline(&view) => Some(result),
            };
            if self.cancel.is_cancelled() {
                self.scheduler.cancel();
            }

            let decision = match fetched {
                None => PollDecision::Discard,
                Some(Ok(details)) => self.settle_model(reduce(&details, self.env, Utc::now())),
                Some(Err(e)) => {
                    tracing::warn!(%view, error = %e, "timeline fetch failed");
                    self.settle_failure(e.to_string())
                }
            };

            match decision {
                PollDecision::FetchAfter(delay) => {
                    tracing::debug!(%view, delay_ms = delay.as_millis() as u64, "next fetch scheduled");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            self.scheduler.cancel();
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                PollDecision::Stop(reason) => {
                    tracing::info!(%view, ?reason, "driver stopped");
                    break;
                }
                PollDecision::Discard => {
                    self.scheduler.cancel();
                    break;
                }
            }
        }

        if self.scheduler.state() == DriverState::Cancelled {
            tracing::info!(%view, "driver cancelled");
            self.publisher.publish(|s| s.state = DriverState::Cancelled);
        }
    }

    fn settle_model(&mut self, model: BreakdownModel) -> PollDecision {
        let decision = self.scheduler.on_model(&model);
        if decision != PollDecision::Discard {
            let state = self.scheduler.state();
            self.publisher.publish(|s| {
                s.model = Some(model);
                s.state = state;
                s.last_error = None;
                s.fetches += 1;
            });
        }
        decision
    }

    fn settle_failure(&mut self, error: String) -> PollDecision {
        let decision = self.scheduler.on_fetch_failure();
        if decision != PollDecision::Discard {
            let state = self.scheduler.state();
            self.publisher.publish(|s| {
                s.state = state;
                s.last_error = Some(error);
                s.fetches += 1;
            });
        }
        decision
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rollout_core::schedule::StopReason;
    use rollout_core::types::{DeploymentStatus, DeploymentStatusDetails};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted timeline source. Repeats the last response once the script
    /// runs out.
    pub(crate) struct FakeSource {
        script: Mutex<VecDeque<Result<DeploymentStatusDetails, String>>>,
        last: Mutex<Option<Result<DeploymentStatusDetails, String>>>,
        pub calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeSource {
        pub(crate) fn new(script: Vec<Result<DeploymentStatusDetails, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TimelineSource for FakeSource {
        async fn fetch_timeline(
            &self,
            _view: &ViewKey,
        ) -> Result<DeploymentStatusDetails, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = {
                let mut script = self.script.lock().expect("script lock");
                let mut last = self.last.lock().expect("last lock");
                match script.pop_front() {
                    Some(item) => {
                        *last = Some(item.clone());
                        item
                    }
                    None => last.clone().expect("empty script"),
                }
            };
            next.map_err(|message| SourceError::Api { code: 500, message })
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeTrigger {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl ResyncTrigger for FakeTrigger {
        async fn trigger_resync(&self, _view: &ViewKey) -> Result<(), SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SourceError::Api {
                    code: 500,
                    message: "argo unreachable".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    pub(crate) fn timeline(kinds: &[&str]) -> DeploymentStatusDetails {
        let events: Vec<serde_json::Value> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                serde_json::json!({
                    "status": kind,
                    "statusDetail": "",
                    "statusTime": format!("2024-05-01T10:00:{:02}Z", i),
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({
            "deploymentStartedOn": "2024-05-01T10:00:00Z",
            "triggeredBy": "admin",
            "timelines": events,
        }))
        .expect("timeline fixture")
    }

    pub(crate) fn in_progress() -> DeploymentStatusDetails {
        timeline(&["DEPLOYMENT_INITIATED", "GIT_COMMIT"])
    }

    pub(crate) fn succeeded() -> DeploymentStatusDetails {
        timeline(&[
            "DEPLOYMENT_INITIATED",
            "GIT_COMMIT",
            "ARGOCD_SYNC",
            "KUBECTL_APPLY_SYNCED",
            "HEALTHY",
        ])
    }

    pub(crate) fn timed_out() -> DeploymentStatusDetails {
        timeline(&[
            "DEPLOYMENT_INITIATED",
            "GIT_COMMIT",
            "ARGOCD_SYNC",
            "KUBECTL_APPLY_SYNCED",
            "FETCH_TIMED_OUT",
        ])
    }

    fn spawn(source: &Arc<FakeSource>) -> PollingDriver {
        let guard: SharedGuard = Arc::new(Mutex::new(StaleGuard::new()));
        let ticket = lock(&guard).switch_to(ViewKey::new(12, 3));
        PollingDriver::spawn(
            Arc::clone(source),
            ticket,
            guard,
            EnvKind::Live,
            PollCadence::default(),
        )
    }

    /// Wait until the driver leaves `Active`, then return its last snapshot.
    async fn settled(driver: &PollingDriver) -> DriverSnapshot {
        let mut rx = driver.subscribe();
        // Err means the task is gone; the last value is still readable.
        let _ = rx.wait_for(|s| !s.state.is_active()).await;
        rx.borrow().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_every_ten_seconds_until_succeeded() {
        let source = Arc::new(FakeSource::new(vec![
            Ok(in_progress()),
            Ok(in_progress()),
            Ok(succeeded()),
        ]));
        let start = tokio::time::Instant::now();
        let driver = spawn(&source);

        let snap = settled(&driver).await;
        assert_eq!(
            snap.state,
            DriverState::Stopped(StopReason::Terminal(DeploymentStatus::Succeeded))
        );
        assert_eq!(source.calls(), 3);
        assert_eq!(snap.fetches, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(20));

        // No fetch after a terminal status.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_keeps_polling_at_idle_cadence() {
        let source = Arc::new(FakeSource::new(vec![Ok(timed_out()), Ok(succeeded())]));
        let start = tokio::time::Instant::now();
        let driver = spawn(&source);

        let snap = settled(&driver).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(
            snap.model.map(|m| m.deployment_status),
            Some(DeploymentStatus::Succeeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_stops_and_keeps_last_model() {
        let source = Arc::new(FakeSource::new(vec![
            Ok(in_progress()),
            Err("gateway timeout".into()),
        ]));
        let driver = spawn(&source);

        let snap = settled(&driver).await;
        assert_eq!(snap.state, DriverState::Stopped(StopReason::FetchFailed));
        assert_eq!(
            snap.model.map(|m| m.deployment_status),
            Some(DeploymentStatus::InProgress)
        );
        assert!(snap.last_error.unwrap_or_default().contains("gateway timeout"));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_stream_stops() {
        let source = Arc::new(FakeSource::new(vec![Ok(timeline(&[
            "DEPLOYMENT_INITIATED",
            "ABORTED",
        ]))]));
        let driver = spawn(&source);
        let snap = settled(&driver).await;
        assert_eq!(snap.state, DriverState::Stopped(StopReason::Aborted));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_further_fetches() {
        let source = Arc::new(FakeSource::new(vec![Ok(in_progress())]));
        let driver = spawn(&source);

        let mut rx = driver.subscribe();
        rx.wait_for(|s| s.fetches == 1).await.expect("first cycle");
        driver.cancel();

        let snap = settled(&driver).await;
        assert_eq!(snap.state, DriverState::Cancelled);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn response_after_view_switch_is_discarded() {
        let source = Arc::new(
            FakeSource::new(vec![Ok(succeeded())]).with_delay(Duration::from_secs(5)),
        );
        let guard: SharedGuard = Arc::new(Mutex::new(StaleGuard::new()));
        let ticket = guard.lock().expect("lock").switch_to(ViewKey::new(1, 1));
        let driver = PollingDriver::spawn(
            Arc::clone(&source),
            ticket,
            Arc::clone(&guard),
            EnvKind::Live,
            PollCadence::default(),
        );

        // Let the fetch start, then switch away before it resolves.
        tokio::time::sleep(Duration::from_secs(1)).await;
        guard.lock().expect("lock").switch_to(ViewKey::new(1, 2));
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snap = driver.snapshot();
        assert!(snap.model.is_none(), "stale model must not be published");
        assert_eq!(snap.fetches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_allowed_only_while_status_unknown() {
        let source = Arc::new(FakeSource::new(vec![Ok(timed_out())]));
        let driver = spawn(&source);
        let mut rx = driver.subscribe();
        rx.wait_for(|s| s.fetches == 1).await.expect("first cycle");

        let trigger = FakeTrigger::default();
        driver.resync(&trigger).await.expect("resync");
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 1);
        // The model is untouched.
        assert_eq!(
            driver.snapshot().model.map(|m| m.deployment_status),
            Some(DeploymentStatus::TimedOut)
        );

        let failing = FakeTrigger {
            fail: true,
            ..Default::default()
        };
        let err = driver.resync(&failing).await.expect_err("must fail");
        assert!(matches!(err, ResyncError::Trigger(_)));
        assert!(driver.snapshot().state.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn resync_rejected_for_settled_deployment() {
        let source = Arc::new(FakeSource::new(vec![Ok(succeeded())]));
        let driver = spawn(&source);
        settled(&driver).await;

        let trigger = FakeTrigger::default();
        let err = driver.resync(&trigger).await.expect_err("must reject");
        assert!(matches!(err, ResyncError::NotAllowed(_)));
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);
    }
}
