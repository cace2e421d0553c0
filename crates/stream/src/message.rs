// Change notifications published by the persistence layer

use chrono::{DateTime, Utc};
use fanpredict_models::{CampaignId, EventId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    PredictionSubmitted { user_id: UserId, event_id: EventId },
    ResultUpdated { event_id: EventId },
    Distributed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeNotification {
    pub campaign_id: CampaignId,
    pub timestamp: DateTime<Utc>,
    pub change: ChangeKind,
}

impl ChangeNotification {
    pub fn new(campaign_id: CampaignId, change: ChangeKind) -> Self {
        Self {
            campaign_id,
            timestamp: Utc::now(),
            change,
        }
    }

    pub fn prediction_submitted(campaign_id: CampaignId, user_id: UserId, event_id: EventId) -> Self {
        Self::new(campaign_id, ChangeKind::PredictionSubmitted { user_id, event_id })
    }

    pub fn result_updated(campaign_id: CampaignId, event_id: EventId) -> Self {
        Self::new(campaign_id, ChangeKind::ResultUpdated { event_id })
    }

    pub fn distributed(campaign_id: CampaignId) -> Self {
        Self::new(campaign_id, ChangeKind::Distributed)
    }
}
