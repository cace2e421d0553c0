// Event lifecycle: admin transitions, submission gate and the settlement gate

use chrono::{DateTime, Utc};
use fanpredict_models::{
    DistributionError, DistributionResult, Event, EventId, EventStatus, LifecycleResult, Outcome,
    Prediction,
};
use fanpredict_store::{CampaignRepository, StoreResult, Submission};
use fanpredict_stream::{ChangeNotification, EventBus};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    GoLive,
    Lock,
    Complete {
        outcome: Outcome,
        notes: Option<String>,
    },
    Verify,
    Approve,
    /// Force a status, including backwards. Resets verification when leaving `Completed`.
    Override(EventStatus),
}

impl AdminAction {
    fn touches_result(&self) -> bool {
        !matches!(self, AdminAction::GoLive | AdminAction::Lock)
    }
}

pub fn apply_action(event: &mut Event, action: AdminAction, now: DateTime<Utc>) -> LifecycleResult<()> {
    match action {
        AdminAction::GoLive => event.go_live(),
        AdminAction::Lock => event.lock(),
        AdminAction::Complete { outcome, notes } => event.complete(outcome, notes),
        AdminAction::Verify => event.verify(now),
        AdminAction::Approve => event.approve(now),
        AdminAction::Override(status) => {
            warn!("🛠️ Admin override on event {}: {:?} -> {:?}", event.id, event.status, status);
            event.admin_override(status);
            Ok(())
        }
    }
}

/// The single gate settlement consults: every event must carry an approved
/// result. Names the first event (in id order) that does not.
pub fn settlement_gate(events: &[Event]) -> DistributionResult<()> {
    if events.is_empty() {
        return Err(DistributionError::DistributionBlocked {
            reason: "campaign has no events".to_string(),
        });
    }
    match events.iter().find(|e| !e.is_settleable()) {
        Some(event) => Err(DistributionError::DistributionBlocked {
            reason: blocked_reason(event),
        }),
        None => Ok(()),
    }
}

fn blocked_reason(event: &Event) -> String {
    let state = match (&event.status, &event.result) {
        (EventStatus::Completed, Some(result)) if result.verified => "awaiting approval",
        (EventStatus::Completed, Some(_)) => "awaiting verification",
        (EventStatus::Completed, None) => "completed without a result",
        _ => "not completed",
    };
    format!("event {} ({}) is {}", event.id, event.title, state)
}

/// Drives admin actions and user submissions through the store and announces
/// every change on the bus.
pub struct EventLifecycle<S> {
    store: Arc<S>,
    bus: EventBus,
}

impl<S: CampaignRepository> EventLifecycle<S> {
    pub fn new(store: Arc<S>, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub async fn act(
        &self,
        event_id: &EventId,
        action: AdminAction,
        now: DateTime<Utc>,
    ) -> StoreResult<Event> {
        let announce = action.touches_result();
        let label = format!("{:?}", action);
        let event = self
            .store
            .update_event(event_id, move |event| apply_action(event, action, now))
            .await?;

        info!("📋 Event {} -> {:?} after {}", event.id, event.status, label);
        if announce {
            self.bus.publish(ChangeNotification::result_updated(
                event.campaign_id.clone(),
                event.id.clone(),
            ));
        }
        Ok(event)
    }

    pub async fn submit(
        &self,
        prediction: Prediction,
        now: DateTime<Utc>,
    ) -> StoreResult<(Prediction, Submission)> {
        let (stored, submission) = self.store.submit_prediction(prediction, now).await?;
        self.bus.publish(ChangeNotification::prediction_submitted(
            stored.campaign_id.clone(),
            stored.user_id.clone(),
            stored.event_id.clone(),
        ));
        Ok((stored, submission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanpredict_models::{EventType, LifecycleError, PointsConfig, PredictionData};
    use fanpredict_store::{InMemoryStore, StoreError};
    use fanpredict_stream::ChangeKind;

    fn event(id: &str) -> Event {
        Event::new(id, "c1", "Box office", EventType::ChoiceSelection, PointsConfig::new(50))
    }

    fn settle(event: &mut Event, outcome: &str) {
        let now = Utc::now();
        for action in [
            AdminAction::GoLive,
            AdminAction::Lock,
            AdminAction::Complete { outcome: Outcome::from(outcome), notes: None },
            AdminAction::Verify,
            AdminAction::Approve,
        ] {
            apply_action(event, action, now).unwrap();
        }
    }

    #[test]
    fn test_gate_names_first_unresolved_event() {
        let mut first = event("e1");
        settle(&mut first, "A");

        let mut second = event("e2");
        apply_action(&mut second, AdminAction::GoLive, Utc::now()).unwrap();
        apply_action(&mut second, AdminAction::Lock, Utc::now()).unwrap();
        apply_action(
            &mut second,
            AdminAction::Complete { outcome: Outcome::from("B"), notes: None },
            Utc::now(),
        )
        .unwrap();
        apply_action(&mut second, AdminAction::Verify, Utc::now()).unwrap();

        let third = event("e3");

        let err = settlement_gate(&[first.clone(), second, third]).unwrap_err();
        assert_eq!(
            err,
            DistributionError::DistributionBlocked {
                reason: "event e2 (Box office) is awaiting approval".to_string()
            }
        );
        assert!(settlement_gate(&[first]).is_ok());
        assert!(settlement_gate(&[]).is_err());
    }

    #[test]
    fn test_approve_before_verify_is_rejected() {
        let mut e = event("e1");
        let now = Utc::now();
        apply_action(&mut e, AdminAction::GoLive, now).unwrap();
        apply_action(&mut e, AdminAction::Lock, now).unwrap();
        apply_action(&mut e, AdminAction::Complete { outcome: Outcome::from("A"), notes: None }, now)
            .unwrap();

        let err = apply_action(&mut e, AdminAction::Approve, now).unwrap_err();
        assert!(matches!(err, LifecycleError::NotVerified { .. }));
    }

    #[tokio::test]
    async fn test_lifecycle_service_announces_changes() {
        let store = Arc::new(InMemoryStore::new());
        store.save_event(event("e1")).await.unwrap();
        let bus = EventBus::new();
        let mut changes = bus.subscribe();
        let lifecycle = EventLifecycle::new(store.clone(), bus);
        let now = Utc::now();

        lifecycle.act(&"e1".into(), AdminAction::GoLive, now).await.unwrap();
        let (_, submission) = lifecycle
            .submit(Prediction::new("u1", "e1", "c1", PredictionData::choice("A")), now)
            .await
            .unwrap();
        assert_eq!(submission, Submission::Created);

        let note = changes.recv().await.unwrap();
        assert!(matches!(note.change, ChangeKind::PredictionSubmitted { .. }));

        lifecycle.act(&"e1".into(), AdminAction::Lock, now).await.unwrap();
        let err = lifecycle
            .submit(Prediction::new("u2", "e1", "c1", PredictionData::choice("B")), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Lifecycle(LifecycleError::EventLocked { .. })));

        lifecycle
            .act(
                &"e1".into(),
                AdminAction::Complete { outcome: Outcome::from("A"), notes: Some("official".into()) },
                now,
            )
            .await
            .unwrap();
        let note = changes.recv().await.unwrap();
        assert!(matches!(note.change, ChangeKind::ResultUpdated { .. }));
    }
}
