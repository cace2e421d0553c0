mod common;

use fanpredict_models::{EventType, Outcome, Participation, PointsConfig, Prediction, PredictionData};
use fanpredict_services::{
    rank, score_prediction, DistributionConfig, DistributionCoordinator, ScoreOutcome,
};
use fanpredict_store::{CampaignRepository, InMemoryStore, SettlementStore};
use proptest::prelude::*;
use std::sync::Arc;

use common::{approved_event, CAMPAIGN, OPERATOR};

#[test]
fn test_scenario_exact_choice_with_bonus() {
    let event = approved_event(
        "opening",
        EventType::ChoiceSelection,
        PointsConfig::new(50).with_perfect_bonus(10),
        Outcome::from("20-30M"),
    );
    let prediction = Prediction::new("u1", "opening", CAMPAIGN, PredictionData::choice("20-30M"));

    let outcome = score_prediction(&event, &prediction).unwrap();
    assert_eq!(outcome, ScoreOutcome { points: 60, correct: true, accuracy: 100.0 });
}

#[test]
fn test_scenario_accuracy_based_numeric() {
    let event = approved_event(
        "gross",
        EventType::NumericPrediction,
        PointsConfig::new(100).with_accuracy_based(true),
        Outcome::Number(1_100_000.0),
    );
    let prediction = Prediction::new("u1", "gross", CAMPAIGN, PredictionData::numeric(1_000_000.0));

    let outcome = score_prediction(&event, &prediction).unwrap();
    assert_eq!(outcome.points, 82);
    assert!(!outcome.correct);
    assert!((outcome.accuracy - 81.8).abs() < 0.1);
}

#[test]
fn test_scenario_ties_keep_sequential_ranks() {
    let participations: Vec<Participation> = [500, 450, 450, 400, 100]
        .iter()
        .enumerate()
        .map(|(i, points)| {
            let mut p = Participation::new(format!("u{}", i + 1).into(), CAMPAIGN.into());
            p.total_points = *points;
            p
        })
        .collect();

    let ranks: Vec<u32> = rank(&participations).iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
}

fn choice_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    // (user index, choice index) pairs; duplicates per user collapse onto one event each
    proptest::collection::vec((0u8..20, 0u8..4), 1..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_distributed_total_matches_recomputed_scores(answers in choice_strategy()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let events = vec![
                approved_event("q0", EventType::ChoiceSelection,
                    PointsConfig::new(30).with_perfect_bonus(5), Outcome::from("c1")),
                approved_event("q1", EventType::ChoiceSelection,
                    PointsConfig::new(40).with_negative_marking(10), Outcome::from("c2")),
            ];
            for event in &events {
                store.save_event(event.clone()).await.unwrap();
            }

            for (i, (user, choice)) in answers.iter().enumerate() {
                let event = &events[i % events.len()];
                store.import_prediction(Prediction::new(
                    format!("u{user}"),
                    event.id.clone(),
                    CAMPAIGN,
                    PredictionData::choice(format!("c{choice}")),
                ));
            }

            let page = store
                .predictions_page(&CAMPAIGN.into(), fanpredict_store::PageRequest::first(1_000))
                .await
                .unwrap();
            let expected: i64 = page
                .predictions
                .iter()
                .map(|p| {
                    let event = events.iter().find(|e| e.id == p.event_id).unwrap();
                    score_prediction(event, p).unwrap().points
                })
                .sum();

            let coordinator = DistributionCoordinator::new(
                store.clone(),
                DistributionConfig { batch_size: 7, ..DistributionConfig::default() },
            );
            let report = coordinator.distribute(&CAMPAIGN.into(), &OPERATOR.into()).await.unwrap();
            assert_eq!(report.total_points_distributed, expected);

            let participations = store.participations(&CAMPAIGN.into()).await.unwrap();
            let recomputed: i64 = participations.iter().map(|p| p.total_points).sum();
            assert_eq!(recomputed, expected);

            let mut balances = 0;
            for participation in &participations {
                balances += store.balance(&participation.user_id).await.unwrap();
            }
            assert_eq!(balances, expected);

            // A second run never adds anything.
            assert!(coordinator.distribute(&CAMPAIGN.into(), &OPERATOR.into()).await.is_err());
            let mut after = 0;
            for participation in &participations {
                after += store.balance(&participation.user_id).await.unwrap();
            }
            assert_eq!(after, expected);
        });
    }
}
