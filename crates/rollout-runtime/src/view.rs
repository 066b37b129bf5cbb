//! The observed deployment: at most one live driver at a time.

use std::sync::{Arc, Mutex, PoisonError};

use rollout_core::schedule::{PollCadence, StaleGuard};
use rollout_core::types::{EnvKind, ViewKey};
use tokio::sync::watch;

use crate::driver::{DriverSnapshot, PollingDriver, ResyncError, SharedGuard};
use crate::source::{ResyncTrigger, TimelineSource};

pub struct DeploymentView<S> {
    source: Arc<S>,
    cadence: PollCadence,
    guard: SharedGuard,
    driver: Option<PollingDriver>,
    env: EnvKind,
}

impl<S: TimelineSource + 'static> DeploymentView<S> {
    pub fn new(source: Arc<S>, cadence: PollCadence) -> Self {
        Self {
            source,
            cadence,
            guard: Arc::new(Mutex::new(StaleGuard::new())),
            driver: None,
            env: EnvKind::Live,
        }
    }

    /// Observe `view`. The previous driver is cancelled and its ticket
    /// invalidated before the new driver issues its first fetch.
    pub fn open(&mut self, view: ViewKey, env: EnvKind) -> watch::Receiver<DriverSnapshot> {
        if let Some(old) = self.driver.take() {
            tracing::debug!(from = %old.view(), to = %view, "switching view");
            old.cancel();
        }
        let ticket = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .switch_to(view);
        self.env = env;
        let driver = PollingDriver::spawn(
            Arc::clone(&self.source),
            ticket,
            Arc::clone(&self.guard),
            env,
            self.cadence,
        );
        let rx = driver.subscribe();
        self.driver = Some(driver);
        rx
    }

    /// Restart polling the current view, e.g. after a fetch failure stopped it.
    #[allow(dead_code)] // the CLI exits on fetch failure instead
    pub fn refresh(&mut self) -> Option<watch::Receiver<DriverSnapshot>> {
        let view = self.current()?.clone();
        Some(self.open(view, self.env))
    }

    pub fn close(&mut self) {
        if let Some(old) = self.driver.take() {
            old.cancel();
        }
        self.guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn current(&self) -> Option<&ViewKey> {
        self.driver.as_ref().map(PollingDriver::view)
    }

    #[allow(dead_code)]
    pub async fn resync<T: ResyncTrigger>(&self, trigger: &T) -> Result<(), ResyncError> {
        match &self.driver {
            Some(driver) => driver.resync(trigger).await,
            None => Err(ResyncError::NoModel),
        }
    }
}

impl<S> Drop for DeploymentView<S> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.cancel();
        }
    }
}
