//! Deployment-timeline reduction engine.
//!
//! Turns the backend's ordered list of pipeline events into a render-ready
//! [`BreakdownModel`] and decides when the next fetch should happen. Pure:
//! no tokio, no IO, no clock access.

pub mod error;
pub mod kube_phase;
pub mod pipeline;
pub mod reducer;
pub mod schedule;
pub mod time;
pub mod types;

pub use error::RolloutError;
pub use kube_phase::{PhaseOutcome, ResourcePhaseAccumulator};
pub use pipeline::Pipeline;
pub use reducer::reduce;
pub use schedule::{
    DriverState, PollCadence, PollDecision, PollScheduler, ResponseTicket, StaleGuard, StopReason,
    check_manual_resync,
};
pub use types::{
    BreakdownModel, DeploymentStatus, DeploymentStatusDetails, EnvKind, EventKind, IconState,
    KubeListItem, ResourceDetail, ResourcePhase, StageKey, StageState, TimelineEvent, ViewKey,
};
