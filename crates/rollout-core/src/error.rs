//! Error types for the closed vocabularies of the timeline API and for
//! actions the polling schedule refuses.
//!
//! The reducer itself never fails: parse errors only surface through the
//! explicit `FromStr` entry points used by callers that want strictness.

use thiserror::Error;

use crate::types::DeploymentStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RolloutError {
    #[error("unknown timeline event kind: {0}")]
    UnknownEventKind(String),

    #[error("unknown resource phase: {0}")]
    UnknownResourcePhase(String),

    #[error("unknown legacy workflow status: {0}")]
    UnknownLegacyStatus(String),

    #[error("unknown environment kind: {0} (expected `live` or `virtual`)")]
    UnknownEnvKind(String),

    #[error("manual resync is only available while status is unknown (current: {0})")]
    ResyncNotAllowed(DeploymentStatus),
}
