use fanpredict_models::{Event, EventType, PredictionData};
use serde_json::Value;

fn demo() -> Value {
    let raw = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/campaign.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_demo_events_are_settleable() {
    let events: Vec<Event> = serde_json::from_value(demo()["events"].clone()).unwrap();

    assert_eq!(events.len(), 5);
    assert!(events.iter().all(Event::is_settleable));
    assert!(events.iter().all(|e| e.points_config.validate().is_ok()));
    assert!(events.iter().any(|e| e.event_type == EventType::DraftSelection));
}

#[test]
fn test_demo_predictions_parse() {
    let snapshot = demo();
    let rows = snapshot["predictions"].as_array().unwrap();

    for row in rows {
        let data: PredictionData = serde_json::from_value(row["prediction_data"].clone()).unwrap();
        assert!(!data.kind().is_empty());
    }
    assert!(snapshot["profiles"]["asha"]["city"].is_string());
}
