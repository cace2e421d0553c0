use fanpredict_models::{
    CampaignId, DistributionError, DistributionRecord, DistributionResult, Event, EventId,
    EventResult, Outcome, Participation, Prediction, UserId,
};
use fanpredict_store::{PageRequest, SettlementBatch, SettlementStore, StoreError};
use fanpredict_stream::{ChangeNotification, EventBus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::lifecycle::settlement_gate;
use crate::metrics::{Counter, MetricsCollector};
use crate::scoring;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Predictions pulled from the store per page.
    pub batch_size: usize,
    /// Extra commit attempts after a transient user write failure.
    pub max_commit_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_commit_retries: 3,
            retry_backoff_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionReport {
    pub success: bool,
    pub users_updated: u32,
    pub total_points_distributed: i64,
    /// Per-prediction scoring problems (those predictions earned nothing) and,
    /// on failure, the user write that aborted the commit.
    pub errors: Vec<DistributionError>,
    pub record: Option<DistributionRecord>,
}

/// A fully scored settlement that has not been committed.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub campaign_id: CampaignId,
    pub participations: Vec<Participation>,
    pub total_points: i64,
    pub users_updated: u32,
    pub scored_outcomes: BTreeMap<EventId, Outcome>,
    pub errors: Vec<DistributionError>,
    pub predictions_scored: u64,
}

/// Which results a prediction may be scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultGate {
    /// Verified and approved. Predictions on anything else are an error.
    Approved,
    /// Verified is enough; predictions on unresolved events are skipped.
    Verified,
}

/// Per-user fold over scored predictions, fed one page at a time so memory is
/// bounded by the number of users rather than the number of predictions.
pub struct ParticipationBuilder<'a> {
    campaign_id: CampaignId,
    events: HashMap<&'a EventId, &'a Event>,
    gate: ResultGate,
    only_events: Option<&'a HashSet<EventId>>,
    users: BTreeMap<UserId, Participation>,
    errors: Vec<DistributionError>,
    scored: u64,
}

pub struct BuiltParticipations {
    pub participations: Vec<Participation>,
    pub errors: Vec<DistributionError>,
    pub scored: u64,
}

impl<'a> ParticipationBuilder<'a> {
    fn new(campaign_id: CampaignId, events: &'a [Event], gate: ResultGate) -> Self {
        Self {
            campaign_id,
            events: events.iter().map(|e| (&e.id, e)).collect(),
            gate,
            only_events: None,
            users: BTreeMap::new(),
            errors: Vec::new(),
            scored: 0,
        }
    }

    /// Settlement mode: every prediction must target an approved event.
    pub fn for_settlement(campaign_id: CampaignId, events: &'a [Event]) -> Self {
        Self::new(campaign_id, events, ResultGate::Approved)
    }

    /// Live estimate mode: score whatever has a verified result, skip the rest.
    pub fn for_estimate(campaign_id: CampaignId, events: &'a [Event]) -> Self {
        Self::new(campaign_id, events, ResultGate::Verified)
    }

    /// Only count predictions on these events.
    pub fn restricted_to(mut self, event_ids: &'a HashSet<EventId>) -> Self {
        self.only_events = Some(event_ids);
        self
    }

    fn result_for(&self, event: &'a Event) -> Option<&'a EventResult> {
        match self.gate {
            ResultGate::Approved => event.result.as_ref().filter(|_| event.is_settleable()),
            ResultGate::Verified => event.verified_result(),
        }
    }

    pub fn add(&mut self, prediction: &Prediction) {
        if let Some(only) = self.only_events {
            if !only.contains(&prediction.event_id) {
                return;
            }
        }

        let Some(event) = self.events.get(&prediction.event_id).copied() else {
            self.errors.push(DistributionError::EventNotFound {
                event_id: prediction.event_id.clone(),
            });
            return;
        };

        let Some(result) = self.result_for(event) else {
            if self.gate == ResultGate::Approved {
                self.errors.push(DistributionError::DistributionBlocked {
                    reason: format!("event {} has no approved result", event.id),
                });
            }
            return;
        };

        match scoring::score(event, prediction, result) {
            Ok(outcome) => {
                self.scored += 1;
                let campaign_id = &self.campaign_id;
                self.users
                    .entry(prediction.user_id.clone())
                    .or_insert_with(|| Participation::new(prediction.user_id.clone(), campaign_id.clone()))
                    .record(outcome.points, outcome.correct, prediction.movie_id.as_ref());
            }
            Err(e) => {
                warn!(
                    "⚠️ Skipping prediction {} from {} on {}: {}",
                    prediction.id, prediction.user_id, prediction.event_id, e
                );
                self.errors.push(e.into());
            }
        }
    }

    pub fn finish(self) -> BuiltParticipations {
        BuiltParticipations {
            participations: self.users.into_values().collect(),
            errors: self.errors,
            scored: self.scored,
        }
    }
}

fn store_error(e: StoreError) -> DistributionError {
    match e {
        StoreError::AlreadyDistributed { .. } => DistributionError::AlreadyDistributed,
        StoreError::SettlementBlocked { reason } => DistributionError::DistributionBlocked { reason },
        StoreError::UserWriteFailed { user_id, .. } => DistributionError::UserWriteFailed { user_id },
        StoreError::EventNotFound { event_id } => DistributionError::EventNotFound { event_id },
        other => DistributionError::Store(other.to_string()),
    }
}

/// Campaign-wide settlement: score everything once, commit once.
pub struct DistributionCoordinator<S> {
    store: Arc<S>,
    config: DistributionConfig,
    metrics: MetricsCollector,
    bus: Option<EventBus>,
}

impl<S: SettlementStore> DistributionCoordinator<S> {
    pub fn new(store: Arc<S>, config: DistributionConfig) -> Self {
        Self {
            store,
            config,
            metrics: MetricsCollector::new(),
            bus: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Dry run: the settlement `distribute` would commit right now.
    pub async fn preview(&self, campaign_id: &CampaignId) -> DistributionResult<SettlementPlan> {
        self.plan(campaign_id).await
    }

    pub async fn distribute(
        &self,
        campaign_id: &CampaignId,
        operator_id: &UserId,
    ) -> DistributionResult<DistributionReport> {
        info!("💰 Distribution requested for campaign {} by {}", campaign_id, operator_id);
        self.metrics.increment(Counter::DistributionAttempted).await;
        let tracker = self.metrics.start_latency_tracking("distribution");

        let outcome = self.run(campaign_id, operator_id).await;
        tracker.finish(&self.metrics).await;

        match &outcome {
            Ok(report) if report.success => {
                self.metrics.increment(Counter::DistributionSucceeded).await;
            }
            Ok(_) => {}
            Err(DistributionError::AlreadyDistributed) => {
                info!("🔁 Campaign {} was already distributed", campaign_id);
                self.metrics.increment(Counter::DuplicateAttempt).await;
            }
            Err(DistributionError::DistributionBlocked { reason }) => {
                warn!("⛔ Distribution for {} blocked: {}", campaign_id, reason);
                self.metrics.increment(Counter::DistributionBlocked).await;
            }
            Err(e) => {
                // Outcome unknown: re-check the record before any retry.
                error!("❌ Distribution for {} failed: {}", campaign_id, e);
            }
        }
        outcome
    }

    async fn run(
        &self,
        campaign_id: &CampaignId,
        operator_id: &UserId,
    ) -> DistributionResult<DistributionReport> {
        // Advisory only. The authoritative check happens inside the commit.
        let existing = self
            .store
            .distribution_record(campaign_id)
            .await
            .map_err(store_error)?;
        if existing.is_some_and(|r| r.distributed) {
            return Err(DistributionError::AlreadyDistributed);
        }

        let plan = self.plan(campaign_id).await?;
        self.commit(plan, operator_id).await
    }

    async fn plan(&self, campaign_id: &CampaignId) -> DistributionResult<SettlementPlan> {
        let events = self.store.events(campaign_id).await.map_err(store_error)?;
        settlement_gate(&events)?;

        let mut builder = ParticipationBuilder::for_settlement(campaign_id.clone(), &events);
        let mut next = Some(PageRequest::first(self.config.batch_size.max(1)));
        let mut pages = 0usize;
        while let Some(request) = next {
            let page = self
                .store
                .predictions_page(campaign_id, request)
                .await
                .map_err(store_error)?;
            pages += 1;
            debug!("📄 Scoring page {} ({} predictions) for {}", pages, page.predictions.len(), campaign_id);
            for prediction in &page.predictions {
                builder.add(prediction);
            }
            next = page.next;
        }

        let built = builder.finish();
        self.metrics.add(Counter::PredictionScored, built.scored).await;
        self.metrics
            .add(Counter::ScoringError, built.errors.len() as u64)
            .await;

        let total_points = built
            .participations
            .iter()
            .fold(0i64, |total, p| total.saturating_add(p.total_points));
        let users_updated = built
            .participations
            .iter()
            .filter(|p| p.predictions_count > 0)
            .count() as u32;
        let scored_outcomes = events
            .iter()
            .filter_map(|e| e.result.as_ref().map(|r| (e.id.clone(), r.outcome.clone())))
            .collect();

        info!(
            "🧮 Scored {} predictions over {} pages for {}: {} points across {} users",
            built.scored, pages, campaign_id, total_points, users_updated
        );

        Ok(SettlementPlan {
            campaign_id: campaign_id.clone(),
            participations: built.participations,
            total_points,
            users_updated,
            scored_outcomes,
            errors: built.errors,
            predictions_scored: built.scored,
        })
    }

    async fn commit(
        &self,
        plan: SettlementPlan,
        operator_id: &UserId,
    ) -> DistributionResult<DistributionReport> {
        let batch = SettlementBatch {
            campaign_id: plan.campaign_id.clone(),
            record: DistributionRecord::new(
                plan.campaign_id.clone(),
                operator_id.clone(),
                plan.total_points,
                plan.users_updated,
            ),
            participations: plan.participations,
            scored_outcomes: plan.scored_outcomes,
        };
        let mut errors = plan.errors;
        let mut attempt = 0u32;

        loop {
            match self.store.commit_settlement(batch.clone()).await {
                Ok(record) => {
                    info!(
                        "✅ Distributed {} points to {} users for campaign {}",
                        record.total_points_distributed, record.users_updated, record.campaign_id
                    );
                    if let Some(bus) = &self.bus {
                        bus.publish(ChangeNotification::distributed(record.campaign_id.clone()));
                    }
                    return Ok(DistributionReport {
                        success: true,
                        users_updated: record.users_updated,
                        total_points_distributed: record.total_points_distributed,
                        errors,
                        record: Some(record),
                    });
                }
                Err(StoreError::UserWriteFailed { user_id, transient: true })
                    if attempt < self.config.max_commit_retries =>
                {
                    attempt += 1;
                    self.metrics.increment(Counter::CommitRetry).await;
                    warn!(
                        "🔄 Write for user {} failed, retrying commit ({}/{})",
                        user_id, attempt, self.config.max_commit_retries
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
                }
                Err(StoreError::UserWriteFailed { user_id, .. }) => {
                    self.metrics.increment(Counter::WriteFailure).await;
                    error!(
                        "❌ Settlement for {} aborted, nothing applied: write for user {} kept failing",
                        batch.campaign_id, user_id
                    );
                    errors.push(DistributionError::UserWriteFailed { user_id });
                    return Ok(DistributionReport {
                        success: false,
                        users_updated: 0,
                        total_points_distributed: 0,
                        errors,
                        record: None,
                    });
                }
                Err(other) => return Err(store_error(other)),
            }
        }
    }
}
