mod common;

use fanpredict_models::{EventType, Outcome, PointsConfig, Prediction, PredictionData};
use fanpredict_services::{score_prediction, DistributionConfig, DistributionCoordinator};
use fanpredict_store::{CampaignRepository, InMemoryStore, SettlementStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{approved_event, CAMPAIGN, OPERATOR};

#[test]
fn test_scoring_throughput() {
    let event = approved_event(
        "gross",
        EventType::NumericPrediction,
        PointsConfig::new(100).with_accuracy_based(true).with_perfect_bonus(20),
        Outcome::Number(250_000_000.0),
    );
    let predictions: Vec<Prediction> = (0..10_000)
        .map(|i| {
            Prediction::new(
                format!("u{i}"),
                "gross",
                CAMPAIGN,
                PredictionData::numeric(200_000_000.0 + i as f64 * 10_000.0),
            )
        })
        .collect();

    let start = Instant::now();
    let total: i64 = predictions
        .iter()
        .map(|p| score_prediction(&event, p).unwrap().points)
        .sum();
    let elapsed = start.elapsed();

    println!("🎯 Scored {} predictions in {:?}", predictions.len(), elapsed);
    assert!(total > 0);
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_large_campaign_distributes_in_pages() {
    let store = Arc::new(InMemoryStore::new());
    let events: Vec<_> = (0..5)
        .map(|i| {
            approved_event(
                &format!("q{i}"),
                EventType::ChoiceSelection,
                PointsConfig::new(10).with_perfect_bonus(5),
                Outcome::from("yes"),
            )
        })
        .collect();
    for event in &events {
        store.save_event(event.clone()).await.unwrap();
    }

    let users = 2_000;
    for user in 0..users {
        for event in &events {
            let answer = if user % 2 == 0 { "yes" } else { "no" };
            store.import_prediction(Prediction::new(
                format!("u{user}"),
                event.id.clone(),
                CAMPAIGN,
                PredictionData::choice(answer),
            ));
        }
    }

    let coordinator = DistributionCoordinator::new(
        store.clone(),
        DistributionConfig { batch_size: 256, ..DistributionConfig::default() },
    );

    let start = Instant::now();
    let report = coordinator.distribute(&CAMPAIGN.into(), &OPERATOR.into()).await.unwrap();
    let elapsed = start.elapsed();
    println!("💰 Distributed {} predictions in {:?}", users * events.len(), elapsed);

    assert!(report.success);
    assert_eq!(report.users_updated, users as u32);
    assert_eq!(report.total_points_distributed, (users / 2) as i64 * 5 * 15);
    assert_eq!(store.balance(&"u0".into()).await.unwrap(), 75);
    assert_eq!(store.balance(&"u1".into()).await.unwrap(), 0);
    assert!(elapsed < Duration::from_secs(10));
}
