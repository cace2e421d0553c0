use chrono::{DateTime, Utc};
use fanpredict_models::{
    CampaignId, DistributionRecord, Event, EventId, LifecycleError, LifecycleResult, Outcome,
    Participation, Prediction, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Campaign {campaign_id} has already been distributed")]
    AlreadyDistributed { campaign_id: CampaignId },

    #[error("Settlement blocked: {reason}")]
    SettlementBlocked { reason: String },

    #[error("Write failed for user {user_id} (transient: {transient})")]
    UserWriteFailed { user_id: UserId, transient: bool },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: EventId },

    #[error("Invalid prediction for event {event_id}: {reason}")]
    InvalidPrediction { event_id: EventId, reason: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keyset cursor over a campaign's predictions. `after` is the last
/// (user, event) key the previous page returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub after: Option<(UserId, EventId)>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { after: None, limit }
    }

    pub fn after(key: (UserId, EventId), limit: usize) -> Self {
        Self {
            after: Some(key),
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionPage {
    pub predictions: Vec<Prediction>,
    pub next: Option<PageRequest>,
}

/// Everything one settlement writes, applied as a single unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub campaign_id: CampaignId,
    pub participations: Vec<Participation>,
    pub record: DistributionRecord,
    /// The outcome each event was scored against. The commit is refused if
    /// any of them changed after scoring.
    pub scored_outcomes: BTreeMap<EventId, Outcome>,
}

/// Whether a submission created a new prediction or replaced the user's
/// earlier answer for the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Created,
    Replaced,
}

/// Read side plus the admin/user writes that happen before settlement.
///
/// Methods return `Send` futures so callers can drive them from spawned tasks.
pub trait CampaignRepository: Send + Sync {
    /// Campaign events ordered by event id.
    fn events(&self, campaign_id: &CampaignId) -> impl Future<Output = StoreResult<Vec<Event>>> + Send;

    fn event(&self, event_id: &EventId) -> impl Future<Output = StoreResult<Event>> + Send;

    fn save_event(&self, event: Event) -> impl Future<Output = StoreResult<()>> + Send;

    /// Apply a lifecycle transition under the same guard settlement uses, so
    /// an event cannot change state halfway through a commit.
    fn update_event<F>(
        &self,
        event_id: &EventId,
        update: F,
    ) -> impl Future<Output = StoreResult<Event>> + Send
    where
        F: FnOnce(&mut Event) -> LifecycleResult<()> + Send;

    /// Create or replace the user's prediction for the event. Rejected once
    /// the event no longer accepts predictions.
    fn submit_prediction(
        &self,
        prediction: Prediction,
        now: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<(Prediction, Submission)>> + Send;

    /// Stable pages of a campaign's predictions, ordered by (user, event).
    /// Each page resumes strictly after the cursor key, so predictions
    /// inserted behind the cursor never shift later pages.
    fn predictions_page(
        &self,
        campaign_id: &CampaignId,
        page: PageRequest,
    ) -> impl Future<Output = StoreResult<PredictionPage>> + Send;

    fn distribution_record(
        &self,
        campaign_id: &CampaignId,
    ) -> impl Future<Output = StoreResult<Option<DistributionRecord>>> + Send;
}

/// Settlement side. `commit_settlement` is the only path that flips a
/// campaign's `distributed` flag.
pub trait SettlementStore: CampaignRepository {
    /// Atomically: refuse if already distributed, refuse unless every event
    /// is approved, was scored, and still has the scored outcome, then write
    /// all participations, credit every balance and store the record stamped
    /// with the commit time. Either all of it is applied or none of it.
    fn commit_settlement(
        &self,
        batch: SettlementBatch,
    ) -> impl Future<Output = StoreResult<DistributionRecord>> + Send;

    fn participations(
        &self,
        campaign_id: &CampaignId,
    ) -> impl Future<Output = StoreResult<Vec<Participation>>> + Send;

    fn balance(&self, user_id: &UserId) -> impl Future<Output = StoreResult<i64>> + Send;
}
