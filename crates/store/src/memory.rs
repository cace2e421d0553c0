use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use fanpredict_models::{
    CampaignId, DistributionRecord, Event, EventId, LifecycleResult, Participation, Prediction,
    UserId,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use tracing::{debug, info, warn};

use crate::repository::*;

/// Settlement-relevant state. One lock covers all of it so a commit is
/// observed either entirely or not at all.
#[derive(Default)]
struct Ledger {
    events: BTreeMap<EventId, Event>,
    participations: HashMap<(CampaignId, UserId), Participation>,
    balances: HashMap<UserId, i64>,
    records: HashMap<CampaignId, DistributionRecord>,
}

/// In-process store honoring the settlement atomicity contract.
///
/// Predictions live outside the ledger lock in a concurrent map keyed by
/// (user, event), which is what enforces one live prediction per pair. A
/// sorted per-campaign key index next to it serves cursor pages.
#[derive(Default)]
pub struct InMemoryStore {
    ledger: RwLock<Ledger>,
    predictions: DashMap<(UserId, EventId), Prediction>,
    prediction_index: RwLock<HashMap<CampaignId, BTreeSet<(UserId, EventId)>>>,
    write_faults: DashMap<UserId, u32>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance, e.g. points carried over from earlier campaigns.
    pub fn set_balance(&self, user_id: UserId, balance: i64) {
        self.ledger.write().balances.insert(user_id, balance);
    }

    /// Make the next `count` settlement writes for `user_id` fail transiently.
    pub fn inject_write_faults(&self, user_id: UserId, count: u32) {
        if count == 0 {
            self.write_faults.remove(&user_id);
        } else {
            self.write_faults.insert(user_id, count);
        }
    }

    /// Bulk import used when loading a snapshot: bypasses the submission gate.
    pub fn import_prediction(&self, prediction: Prediction) {
        let key = (prediction.user_id.clone(), prediction.event_id.clone());
        let campaign_id = prediction.campaign_id.clone();
        let previous = self.predictions.insert(key.clone(), prediction);

        let mut index = self.prediction_index.write();
        if let Some(previous) = previous.filter(|p| p.campaign_id != campaign_id) {
            if let Some(keys) = index.get_mut(&previous.campaign_id) {
                keys.remove(&key);
            }
        }
        index.entry(campaign_id).or_default().insert(key);
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.len()
    }

    fn take_write_fault(&self, user_id: &UserId) -> bool {
        let exhausted = match self.write_faults.get_mut(user_id) {
            Some(mut remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => return false,
        };
        if exhausted {
            self.write_faults.remove(user_id);
        }
        true
    }

    fn check_settleable(ledger: &Ledger, batch: &SettlementBatch) -> StoreResult<()> {
        let mut any_event = false;
        for event in ledger.events.values().filter(|e| e.campaign_id == batch.campaign_id) {
            any_event = true;
            if !event.is_settleable() {
                return Err(StoreError::SettlementBlocked {
                    reason: format!("event {} has no approved result", event.id),
                });
            }
            if !batch.scored_outcomes.contains_key(&event.id) {
                return Err(StoreError::SettlementBlocked {
                    reason: format!("event {} was added after scoring", event.id),
                });
            }
        }
        if !any_event {
            return Err(StoreError::SettlementBlocked {
                reason: format!("campaign {} has no events", batch.campaign_id),
            });
        }

        for (event_id, scored) in &batch.scored_outcomes {
            let current = ledger
                .events
                .get(event_id)
                .and_then(|e| e.result.as_ref())
                .map(|r| &r.outcome);
            if current != Some(scored) {
                return Err(StoreError::SettlementBlocked {
                    reason: format!("result for event {} changed during settlement", event_id),
                });
            }
        }
        Ok(())
    }
}

impl CampaignRepository for InMemoryStore {
    async fn events(&self, campaign_id: &CampaignId) -> StoreResult<Vec<Event>> {
        let ledger = self.ledger.read();
        Ok(ledger
            .events
            .values()
            .filter(|e| &e.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn event(&self, event_id: &EventId) -> StoreResult<Event> {
        self.ledger
            .read()
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoreError::EventNotFound {
                event_id: event_id.clone(),
            })
    }

    async fn save_event(&self, event: Event) -> StoreResult<()> {
        self.ledger.write().events.insert(event.id.clone(), event);
        Ok(())
    }

    async fn update_event<F>(&self, event_id: &EventId, update: F) -> StoreResult<Event>
    where
        F: FnOnce(&mut Event) -> LifecycleResult<()> + Send,
    {
        let mut ledger = self.ledger.write();
        let event = ledger
            .events
            .get_mut(event_id)
            .ok_or_else(|| StoreError::EventNotFound {
                event_id: event_id.clone(),
            })?;

        // Apply to a copy so a rejected transition leaves the stored event untouched.
        let mut updated = event.clone();
        update(&mut updated)?;
        *event = updated.clone();
        Ok(updated)
    }

    async fn submit_prediction(
        &self,
        mut prediction: Prediction,
        now: DateTime<Utc>,
    ) -> StoreResult<(Prediction, Submission)> {
        // Held across the upsert so a concurrent lock cannot slip in between.
        let ledger = self.ledger.read();
        let event = ledger
            .events
            .get(&prediction.event_id)
            .ok_or_else(|| StoreError::EventNotFound {
                event_id: prediction.event_id.clone(),
            })?;

        event.ensure_accepting_predictions(now)?;
        if !prediction.prediction_data.matches(&event.event_type) {
            return Err(StoreError::InvalidPrediction {
                event_id: event.id.clone(),
                reason: format!(
                    "{} answer for a {} event",
                    prediction.prediction_data.kind(),
                    event.event_type
                ),
            });
        }

        prediction.campaign_id = event.campaign_id.clone();
        if prediction.movie_id.is_none() {
            prediction.movie_id = event.movie_id.clone();
        }

        let key = (prediction.user_id.clone(), prediction.event_id.clone());
        let campaign_id = prediction.campaign_id.clone();
        let outcome = match self.predictions.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.replace_data(prediction.prediction_data, now);
                debug!("✏️ Replaced prediction {} for user {}", existing.id, existing.user_id);
                (existing.clone(), Submission::Replaced)
            }
            Entry::Vacant(slot) => {
                slot.insert(prediction.clone());
                (prediction, Submission::Created)
            }
        };
        // Indexed only after the map entry is released.
        if outcome.1 == Submission::Created {
            self.prediction_index
                .write()
                .entry(campaign_id)
                .or_default()
                .insert(key);
        }
        Ok(outcome)
    }

    async fn predictions_page(
        &self,
        campaign_id: &CampaignId,
        page: PageRequest,
    ) -> StoreResult<PredictionPage> {
        if page.limit == 0 {
            return Ok(PredictionPage {
                predictions: Vec::new(),
                next: None,
            });
        }

        // Copy out the page's keys and release the index before touching the map.
        let mut keys: Vec<(UserId, EventId)> = {
            let index = self.prediction_index.read();
            let Some(campaign_keys) = index.get(campaign_id) else {
                return Ok(PredictionPage {
                    predictions: Vec::new(),
                    next: None,
                });
            };
            let lower = match &page.after {
                Some(after) => Bound::Excluded(after),
                None => Bound::Unbounded,
            };
            campaign_keys
                .range::<(UserId, EventId), _>((lower, Bound::Unbounded))
                .take(page.limit.saturating_add(1))
                .cloned()
                .collect()
        };

        let has_more = keys.len() > page.limit;
        keys.truncate(page.limit);
        let next = match keys.last() {
            Some(last) if has_more => Some(PageRequest::after(last.clone(), page.limit)),
            _ => None,
        };

        let predictions = keys
            .iter()
            .filter_map(|key| self.predictions.get(key).map(|p| p.value().clone()))
            .collect();

        Ok(PredictionPage { predictions, next })
    }

    async fn distribution_record(
        &self,
        campaign_id: &CampaignId,
    ) -> StoreResult<Option<DistributionRecord>> {
        Ok(self.ledger.read().records.get(campaign_id).cloned())
    }
}

impl SettlementStore for InMemoryStore {
    async fn commit_settlement(&self, batch: SettlementBatch) -> StoreResult<DistributionRecord> {
        let mut ledger = self.ledger.write();

        if ledger
            .records
            .get(&batch.campaign_id)
            .is_some_and(|r| r.distributed)
        {
            return Err(StoreError::AlreadyDistributed {
                campaign_id: batch.campaign_id,
            });
        }

        Self::check_settleable(&ledger, &batch)?;

        // Stage every user write before touching anything.
        for participation in &batch.participations {
            if self.take_write_fault(&participation.user_id) {
                warn!("⚠️ Staged write failed for user {}", participation.user_id);
                return Err(StoreError::UserWriteFailed {
                    user_id: participation.user_id.clone(),
                    transient: true,
                });
            }
        }

        let campaign_id = batch.campaign_id;
        for participation in batch.participations {
            let balance = ledger
                .balances
                .entry(participation.user_id.clone())
                .or_insert(0);
            *balance = balance.saturating_add(participation.total_points);
            ledger
                .participations
                .insert((campaign_id.clone(), participation.user_id.clone()), participation);
        }

        let mut record = batch.record;
        record.distributed_at = Utc::now();
        ledger.records.insert(campaign_id.clone(), record.clone());

        info!(
            "🔒 Committed settlement for {}: {} points to {} users",
            campaign_id, record.total_points_distributed, record.users_updated
        );
        Ok(record)
    }

    async fn participations(&self, campaign_id: &CampaignId) -> StoreResult<Vec<Participation>> {
        let ledger = self.ledger.read();
        let mut participations: Vec<Participation> = ledger
            .participations
            .iter()
            .filter(|((campaign, _), _)| campaign == campaign_id)
            .map(|(_, p)| p.clone())
            .collect();
        participations.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(participations)
    }

    async fn balance(&self, user_id: &UserId) -> StoreResult<i64> {
        Ok(self.ledger.read().balances.get(user_id).copied().unwrap_or(0))
    }
}
