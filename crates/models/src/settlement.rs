use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ids::{CampaignId, MovieId, UserId};

/// A user's rolled-up standing within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participation {
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    pub total_points: i64,
    pub predictions_count: u32,
    pub correct_predictions: u32,
    #[serde(default)]
    pub movie_wise_points: BTreeMap<MovieId, i64>,
    /// Derived at read time by the leaderboard, never authoritative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

impl Participation {
    pub fn new(user_id: UserId, campaign_id: CampaignId) -> Self {
        Self {
            user_id,
            campaign_id,
            total_points: 0,
            predictions_count: 0,
            correct_predictions: 0,
            movie_wise_points: BTreeMap::new(),
            rank: None,
        }
    }

    /// Fold one scored prediction into the rollup.
    pub fn record(&mut self, points: i64, correct: bool, movie_id: Option<&MovieId>) {
        self.total_points = self.total_points.saturating_add(points);
        self.predictions_count += 1;
        if correct {
            self.correct_predictions += 1;
        }
        if let Some(movie_id) = movie_id {
            let movie_points = self.movie_wise_points.entry(movie_id.clone()).or_insert(0);
            *movie_points = movie_points.saturating_add(points);
        }
    }

    pub fn movie_points(&self, movie_id: &MovieId) -> i64 {
        self.movie_wise_points.get(movie_id).copied().unwrap_or(0)
    }

    pub fn accuracy_rate(&self) -> f64 {
        if self.predictions_count == 0 {
            return 0.0;
        }
        self.correct_predictions as f64 / self.predictions_count as f64
    }
}

/// Settlement receipt. Immutable once `distributed` is true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionRecord {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    pub distributed_at: DateTime<Utc>,
    pub distributed_by: UserId,
    pub total_points_distributed: i64,
    pub users_updated: u32,
    pub distributed: bool,
}

impl DistributionRecord {
    pub fn new(
        campaign_id: CampaignId,
        distributed_by: UserId,
        total_points_distributed: i64,
        users_updated: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            distributed_at: Utc::now(),
            distributed_by,
            total_points_distributed,
            users_updated,
            distributed: true,
        }
    }
}

/// One row of a leaderboard: the participation plus the value it was ranked by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedParticipation {
    pub rank: u32,
    pub points: i64,
    pub participation: Participation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_movie_points() {
        let mut participation = Participation::new("u1".into(), "c1".into());
        let movie_a = MovieId::from("movie_a");
        let movie_b = MovieId::from("movie_b");

        participation.record(60, true, Some(&movie_a));
        participation.record(-10, false, Some(&movie_a));
        participation.record(82, false, Some(&movie_b));
        participation.record(5, true, None);

        assert_eq!(participation.total_points, 137);
        assert_eq!(participation.predictions_count, 4);
        assert_eq!(participation.correct_predictions, 2);
        assert_eq!(participation.movie_points(&movie_a), 50);
        assert_eq!(participation.movie_points(&movie_b), 82);
        assert_eq!(participation.movie_points(&"movie_c".into()), 0);
        assert!((participation.accuracy_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_saturates_instead_of_overflowing() {
        let mut participation = Participation::new("u1".into(), "c1".into());
        let movie = MovieId::from("movie_a");

        participation.record(i64::MAX, true, Some(&movie));
        participation.record(1, true, Some(&movie));

        assert_eq!(participation.total_points, i64::MAX);
        assert_eq!(participation.movie_points(&movie), i64::MAX);
        assert_eq!(participation.predictions_count, 2);
    }
}
