// Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::Utc;
use fanpredict_models::{Event, EventType, Outcome, PointsConfig, RankedParticipation};
use fanpredict_services::{apply_action, AdminAction};

pub const CAMPAIGN: &str = "summer-blockbusters";
pub const OPERATOR: &str = "ops-admin";

/// An event walked all the way to an approved result.
pub fn approved_event(id: &str, event_type: EventType, config: PointsConfig, outcome: Outcome) -> Event {
    let mut event = Event::new(id, CAMPAIGN, id, event_type, config);
    let now = Utc::now();
    for action in [
        AdminAction::GoLive,
        AdminAction::Lock,
        AdminAction::Complete { outcome, notes: None },
        AdminAction::Verify,
        AdminAction::Approve,
    ] {
        apply_action(&mut event, action, now).unwrap();
    }
    event
}

pub fn live_event(id: &str, event_type: EventType, config: PointsConfig) -> Event {
    let mut event = Event::new(id, CAMPAIGN, id, event_type, config);
    event.go_live().unwrap();
    event
}

pub fn user_order(board: &[RankedParticipation]) -> Vec<&str> {
    board.iter().map(|r| r.participation.user_id.as_str()).collect()
}
