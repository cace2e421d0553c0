use thiserror::Error;

use crate::events::EventStatus;
use crate::ids::{EventId, UserId};

/// Failures of the pure scoring function. Always recoverable by validating
/// inputs upstream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Unsupported event type: {event_type}")]
    UnsupportedEventType { event_type: String },

    #[error("Invalid prediction format for event {event_id}: {reason}")]
    InvalidPredictionFormat { event_id: EventId, reason: String },

    #[error("Invalid result format for event {event_id}: {reason}")]
    InvalidResultFormat { event_id: EventId, reason: String },

    #[error("Result for event {event_id} is not verified")]
    ResultNotVerified { event_id: EventId },

    #[error("Invalid points config: {reason}")]
    InvalidPointsConfig { reason: String },
}

/// Event lifecycle violations. Reported to the operator, never ignored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Event {event_id} is locked, predictions are closed")]
    EventLocked { event_id: EventId },

    #[error("Event {event_id} is not live yet")]
    EventNotLive { event_id: EventId },

    #[error("Result for event {event_id} must be verified before approval")]
    NotVerified { event_id: EventId },

    #[error("Event {event_id} has no outcome to verify")]
    MissingOutcome { event_id: EventId },

    #[error("Invalid transition for event {event_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        event_id: EventId,
        from: EventStatus,
        to: EventStatus,
    },
}

/// Outcomes of a campaign settlement that are not a clean success.
///
/// `AlreadyDistributed` and `DistributionBlocked` are expected, user-facing
/// conditions. `UserWriteFailed` aborts the whole settlement with nothing
/// applied. `Store` is an unmodeled storage fault: the outcome is unknown and
/// callers must re-check `AlreadyDistributed` before retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Distribution blocked: {reason}")]
    DistributionBlocked { reason: String },

    #[error("Points for this campaign have already been distributed")]
    AlreadyDistributed,

    #[error("Failed to write settlement for user {user_id}")]
    UserWriteFailed { user_id: UserId },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: EventId },

    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Storage error: {0}")]
    Store(String),
}

pub type ScoringResult<T> = std::result::Result<T, ScoringError>;
pub type LifecycleResult<T> = std::result::Result<T, LifecycleError>;
pub type DistributionResult<T> = std::result::Result<T, DistributionError>;
