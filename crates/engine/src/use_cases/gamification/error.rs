//! Errors for the gamification use cases.

use critcast_domain::{DomainError, EventId, Instance, InstanceId, ScopeKey};

use crate::infrastructure::ports::RepoError;

/// Failures from the instance state machine.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("A live instance already occupies {scope}: {existing}")]
    AlreadyLive {
        scope: ScopeKey,
        existing: InstanceId,
    },
    #[error("Instance not found: {0}")]
    NotFound(InstanceId),
    /// The instance refused a contribution (not active, or expired)
    #[error("Instance {} is not accepting contributions: {reason}", .instance.id())]
    NotAccepting {
        instance: Box<Instance>,
        reason: DomainError,
    },
    /// Another writer transitioned the instance first
    #[error("Instance {0} was changed concurrently")]
    Conflict(InstanceId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

/// Failures surfaced by `GamificationService`.
///
/// Signal paths return outcomes with reasons instead; only contract
/// violations and storage failures end up here.
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    #[error("Event not found: {0}")]
    EventNotFound(EventId),
    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),
    #[error("Invalid transition: {0}")]
    InvalidTransition(DomainError),
    #[error("Domain error: {0}")]
    Domain(DomainError),
    #[error("Instance {0} was changed concurrently")]
    Conflict(InstanceId),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

impl From<DomainError> for GamificationError {
    fn from(e: DomainError) -> Self {
        if e.is_invalid_transition() {
            GamificationError::InvalidTransition(e)
        } else {
            GamificationError::Domain(e)
        }
    }
}

impl From<InstanceError> for GamificationError {
    fn from(e: InstanceError) -> Self {
        match e {
            InstanceError::NotFound(id) => GamificationError::InstanceNotFound(id),
            InstanceError::Conflict(id) => GamificationError::Conflict(id),
            InstanceError::Domain(e) => e.into(),
            InstanceError::NotAccepting { reason, .. } => reason.into(),
            InstanceError::AlreadyLive { scope, existing } => {
                GamificationError::Domain(DomainError::constraint(format!(
                    "a live instance already occupies {scope}: {existing}"
                )))
            }
            InstanceError::Repo(e) => GamificationError::Repo(e),
        }
    }
}
