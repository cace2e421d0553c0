// Leaderboard aggregation: overall, per movie, per tournament group, per
// geography and per event subset. Everything here is read-only over the
// caller's snapshot.

use fanpredict_models::{
    CampaignId, Event, EventId, GroupId, Participation, Prediction, RankedParticipation, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::distribution::{BuiltParticipations, ParticipationBuilder};

/// Bucket for users whose profile has no value at the requested level.
pub const UNKNOWN_REGION: &str = "Unknown";

/// One ranked board per partition key.
pub type GroupedBoards = BTreeMap<String, Vec<RankedParticipation>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    City,
    State,
}

/// Lookup of user profiles, owned by whatever system manages accounts.
pub trait ProfileDirectory {
    fn profile(&self, user_id: &UserId) -> Option<UserProfile>;
}

impl ProfileDirectory for HashMap<UserId, UserProfile> {
    fn profile(&self, user_id: &UserId) -> Option<UserProfile> {
        self.get(user_id).cloned()
    }
}

/// Rank by total points, highest first.
pub fn rank(participations: &[Participation]) -> Vec<RankedParticipation> {
    rank_by(participations, |p| p.total_points)
}

/// Stable descending sort on `key`, then sequential 1-based ranks. Equal keys
/// keep their input order and still get distinct ranks.
pub fn rank_by<F>(participations: &[Participation], key: F) -> Vec<RankedParticipation>
where
    F: Fn(&Participation) -> i64,
{
    let mut rows: Vec<(i64, &Participation)> = participations.iter().map(|p| (key(p), p)).collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    rows.into_iter()
        .enumerate()
        .map(|(position, (points, participation))| {
            let rank = position as u32 + 1;
            let mut participation = participation.clone();
            participation.rank = Some(rank);
            RankedParticipation {
                rank,
                points,
                participation,
            }
        })
        .collect()
}

/// A participant appears on every movie board they scored on, ranked by that
/// movie's points only.
pub fn by_movie(participations: &[Participation]) -> GroupedBoards {
    let movies: BTreeSet<_> = participations
        .iter()
        .flat_map(|p| p.movie_wise_points.keys())
        .collect();

    movies
        .into_iter()
        .map(|movie_id| {
            let members: Vec<Participation> = participations
                .iter()
                .filter(|p| p.movie_wise_points.contains_key(movie_id))
                .cloned()
                .collect();
            let board = rank_by(&members, |p| p.movie_points(movie_id));
            (movie_id.to_string(), board)
        })
        .collect()
}

/// A participant belongs to group G when they predicted on at least one event
/// of G. Ranked by campaign total.
pub fn by_group(
    participations: &[Participation],
    predictions: &[Prediction],
    events: &[Event],
) -> GroupedBoards {
    let event_groups: HashMap<&EventId, &GroupId> = events
        .iter()
        .filter_map(|e| e.group_id.as_ref().map(|g| (&e.id, g)))
        .collect();

    let mut members: BTreeMap<&GroupId, HashSet<&UserId>> = BTreeMap::new();
    for prediction in predictions {
        if let Some(group_id) = event_groups.get(&prediction.event_id) {
            members.entry(group_id).or_default().insert(&prediction.user_id);
        }
    }

    members
        .into_iter()
        .map(|(group_id, users)| {
            let in_group: Vec<Participation> = participations
                .iter()
                .filter(|p| users.contains(&p.user_id))
                .cloned()
                .collect();
            (group_id.to_string(), rank(&in_group))
        })
        .collect()
}

pub fn by_geography<D: ProfileDirectory + ?Sized>(
    participations: &[Participation],
    directory: &D,
    level: GeoLevel,
) -> GroupedBoards {
    let mut buckets: BTreeMap<String, Vec<Participation>> = BTreeMap::new();
    for participation in participations {
        let region = directory
            .profile(&participation.user_id)
            .and_then(|profile| match level {
                GeoLevel::City => profile.city,
                GeoLevel::State => profile.state,
            })
            .filter(|region| !region.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());
        buckets.entry(region).or_default().push(participation.clone());
    }

    buckets
        .into_iter()
        .map(|(region, members)| (region, rank(&members)))
        .collect()
}

/// Totals recomputed from predictions on `event_ids` only. These are not the
/// campaign totals and are never written back.
pub fn by_event_subset(
    campaign_id: &CampaignId,
    events: &[Event],
    predictions: &[Prediction],
    event_ids: &HashSet<EventId>,
) -> Vec<RankedParticipation> {
    let mut builder =
        ParticipationBuilder::for_estimate(campaign_id.clone(), events).restricted_to(event_ids);
    for prediction in predictions {
        builder.add(prediction);
    }
    rank(&builder.finish().participations)
}

/// Pre-settlement standings from every verified result, approved or not.
pub fn estimate_participations(
    campaign_id: &CampaignId,
    events: &[Event],
    predictions: &[Prediction],
) -> BuiltParticipations {
    let mut builder = ParticipationBuilder::for_estimate(campaign_id.clone(), events);
    for prediction in predictions {
        builder.add(prediction);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fanpredict_models::{EventType, Outcome, PointsConfig, PredictionData};
    use proptest::prelude::*;

    fn participation(user: &str, points: i64) -> Participation {
        let mut p = Participation::new(user.into(), "c1".into());
        p.total_points = points;
        p
    }

    fn verified_event(id: &str, outcome: &str) -> Event {
        let now = Utc::now();
        let mut event = Event::new(id, "c1", id, EventType::ChoiceSelection, PointsConfig::new(10));
        event.go_live().unwrap();
        event.lock().unwrap();
        event.complete(Outcome::from(outcome), None).unwrap();
        event.verify(now).unwrap();
        event
    }

    #[test]
    fn test_ties_get_sequential_ranks() {
        let participations = vec![
            participation("u1", 500),
            participation("u2", 450),
            participation("u3", 450),
            participation("u4", 400),
            participation("u5", 100),
        ];
        let board = rank(&participations);

        let ranks: Vec<u32> = board.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(board[1].participation.user_id.as_str(), "u2");
        assert_eq!(board[2].participation.user_id.as_str(), "u3");
        assert_eq!(board[2].participation.rank, Some(3));
    }

    #[test]
    fn test_movie_boards_rank_by_movie_points() {
        let mut a = participation("a", 100);
        a.record(30, true, Some(&"m1".into()));
        a.record(70, true, Some(&"m2".into()));
        let mut b = participation("b", 90);
        b.record(90, true, Some(&"m1".into()));

        let boards = by_movie(&[a, b]);
        assert_eq!(boards.len(), 2);

        let m1 = &boards["m1"];
        assert_eq!(m1[0].participation.user_id.as_str(), "b");
        assert_eq!(m1[0].points, 90);
        assert_eq!(m1[1].points, 30);

        let m2 = &boards["m2"];
        assert_eq!(m2.len(), 1);
        assert_eq!(m2[0].points, 70);
    }

    #[test]
    fn test_group_membership_follows_predictions() {
        let events = vec![
            Event::new("e1", "c1", "Group A opener", EventType::ChoiceSelection, PointsConfig::new(10))
                .with_group("A"),
            Event::new("e2", "c1", "Group B opener", EventType::ChoiceSelection, PointsConfig::new(10))
                .with_group("B"),
            Event::new("e3", "c1", "Final", EventType::ChoiceSelection, PointsConfig::new(10)),
        ];
        let predictions = vec![
            Prediction::new("u1", "e1", "c1", PredictionData::choice("x")),
            Prediction::new("u2", "e2", "c1", PredictionData::choice("x")),
            Prediction::new("u2", "e1", "c1", PredictionData::choice("y")),
            Prediction::new("u3", "e3", "c1", PredictionData::choice("x")),
        ];
        let participations = vec![participation("u1", 10), participation("u2", 20), participation("u3", 30)];

        let boards = by_group(&participations, &predictions, &events);
        let group_a: Vec<&str> = boards["A"].iter().map(|r| r.participation.user_id.as_str()).collect();
        let group_b: Vec<&str> = boards["B"].iter().map(|r| r.participation.user_id.as_str()).collect();

        assert_eq!(group_a, vec!["u2", "u1"]);
        assert_eq!(group_b, vec!["u2"]);
        assert_eq!(boards.len(), 2);
    }

    #[test]
    fn test_geography_defaults_to_unknown() {
        let mut profiles = HashMap::new();
        profiles.insert(
            UserId::from("u1"),
            UserProfile { city: Some("Mumbai".into()), state: Some("Maharashtra".into()) },
        );
        profiles.insert(UserId::from("u2"), UserProfile { city: None, state: Some("Karnataka".into()) });

        let participations = vec![participation("u1", 10), participation("u2", 20), participation("u3", 5)];

        let cities = by_geography(&participations, &profiles, GeoLevel::City);
        assert_eq!(cities["Mumbai"].len(), 1);
        let unknown: Vec<&str> = cities[UNKNOWN_REGION]
            .iter()
            .map(|r| r.participation.user_id.as_str())
            .collect();
        assert_eq!(unknown, vec!["u2", "u3"]);

        let states = by_geography(&participations, &profiles, GeoLevel::State);
        assert_eq!(states.len(), 3);
        assert_eq!(states["Karnataka"][0].rank, 1);
    }

    #[test]
    fn test_event_subset_recomputes_totals() {
        let events = vec![verified_event("player", "Kohli"), verified_event("winner", "MI")];
        let predictions = vec![
            Prediction::new("u1", "player", "c1", PredictionData::choice("Kohli")),
            Prediction::new("u1", "winner", "c1", PredictionData::choice("MI")),
            Prediction::new("u2", "winner", "c1", PredictionData::choice("MI")),
        ];
        let only_player: HashSet<EventId> = [EventId::from("player")].into_iter().collect();

        let board = by_event_subset(&"c1".into(), &events, &predictions, &only_player);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].participation.user_id.as_str(), "u1");
        assert_eq!(board[0].points, 10);
        assert_eq!(board[0].participation.predictions_count, 1);
    }

    #[test]
    fn test_estimates_skip_unresolved_events() {
        let mut open = Event::new("open", "c1", "Open", EventType::ChoiceSelection, PointsConfig::new(10));
        open.go_live().unwrap();
        let events = vec![verified_event("done", "A"), open];
        let predictions = vec![
            Prediction::new("u1", "done", "c1", PredictionData::choice("A")),
            Prediction::new("u1", "open", "c1", PredictionData::choice("A")),
        ];

        let built = estimate_participations(&"c1".into(), &events, &predictions);
        assert!(built.errors.is_empty());
        assert_eq!(built.scored, 1);
        assert_eq!(built.participations[0].total_points, 10);
    }

    proptest! {
        #[test]
        fn prop_ranked_boards_are_ordered(points in proptest::collection::vec(-1_000i64..10_000, 0..60)) {
            let participations: Vec<Participation> = points
                .iter()
                .enumerate()
                .map(|(i, p)| participation(&format!("u{i}"), *p))
                .collect();
            let board = rank(&participations);

            prop_assert_eq!(board.len(), participations.len());
            for (i, row) in board.iter().enumerate() {
                prop_assert_eq!(row.rank, i as u32 + 1);
            }
            for pair in board.windows(2) {
                prop_assert!(pair[0].participation.total_points >= pair[1].participation.total_points);
            }
        }
    }
}
