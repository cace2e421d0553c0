use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::events::EventType;
use crate::ids::{CampaignId, EventId, MovieId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub id: Uuid,
    pub user_id: UserId,
    pub event_id: EventId,
    pub campaign_id: CampaignId,
    #[serde(default)]
    pub movie_id: Option<MovieId>,
    pub prediction_data: PredictionData,
    /// Last computed points. Cache only, settlement always rescores.
    #[serde(default)]
    pub score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user's answer, tagged by the kind of question it answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredictionData {
    ChoiceSelection { selected_choice: String },
    NumericPrediction { predicted_value: NumericInput },
    DraftSelection(DraftTeam),
}

/// Numeric answers arrive either as JSON numbers or as the raw text of a form
/// field, so coercion happens at scoring time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumericInput::Number(n) => Some(*n).filter(|n| n.is_finite()),
            NumericInput::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        NumericInput::Number(n)
    }
}

/// A drafted multi-role team: role name -> picked players, plus an optional captain.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftTeam {
    #[serde(default)]
    pub picks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub captain: Option<String>,
}

impl PredictionData {
    pub fn choice(selected: impl Into<String>) -> Self {
        PredictionData::ChoiceSelection {
            selected_choice: selected.into(),
        }
    }

    pub fn numeric(value: impl Into<NumericInput>) -> Self {
        PredictionData::NumericPrediction {
            predicted_value: value.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PredictionData::ChoiceSelection { .. } => "choice_selection",
            PredictionData::NumericPrediction { .. } => "numeric_prediction",
            PredictionData::DraftSelection(_) => "draft_selection",
        }
    }

    pub fn matches(&self, event_type: &EventType) -> bool {
        matches!(
            (self, event_type),
            (PredictionData::ChoiceSelection { .. }, EventType::ChoiceSelection)
                | (PredictionData::NumericPrediction { .. }, EventType::NumericPrediction)
                | (PredictionData::DraftSelection(_), EventType::DraftSelection)
        )
    }
}

impl Prediction {
    pub fn new(
        user_id: impl Into<UserId>,
        event_id: impl Into<EventId>,
        campaign_id: impl Into<CampaignId>,
        prediction_data: PredictionData,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            event_id: event_id.into(),
            campaign_id: campaign_id.into(),
            movie_id: None,
            prediction_data,
            score: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_movie(mut self, movie_id: impl Into<MovieId>) -> Self {
        self.movie_id = Some(movie_id.into());
        self
    }

    /// Resubmission before lock: same record, new answer, stale score dropped.
    pub fn replace_data(&mut self, prediction_data: PredictionData, now: DateTime<Utc>) {
        self.prediction_data = prediction_data;
        self.score = None;
        self.updated_at = now;
    }
}
