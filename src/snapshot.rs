use anyhow::{Context, Result};
use fanpredict_models::{CampaignId, Event, EventId, MovieId, Prediction, PredictionData, UserId};
use fanpredict_services::UserProfile;
use fanpredict_store::{CampaignRepository, InMemoryStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Campaign export as handed over by the persistence layer.
#[derive(Debug, Deserialize)]
pub struct CampaignSnapshot {
    pub events: Vec<Event>,
    pub predictions: Vec<PredictionRow>,
    #[serde(default)]
    pub profiles: HashMap<UserId, UserProfile>,
}

#[derive(Debug, Deserialize)]
pub struct PredictionRow {
    pub user_id: UserId,
    pub event_id: EventId,
    #[serde(default)]
    pub movie_id: Option<MovieId>,
    pub prediction_data: PredictionData,
}

impl CampaignSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading campaign snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing campaign snapshot {}", path.display()))
    }

    /// Seed the store. Predictions are imported as already accepted, taking the
    /// event's movie when the row has none.
    pub async fn import(&self, campaign_id: &CampaignId, store: &InMemoryStore) -> Result<()> {
        let event_movies: HashMap<&EventId, &MovieId> = self
            .events
            .iter()
            .filter_map(|e| e.movie_id.as_ref().map(|m| (&e.id, m)))
            .collect();

        for event in &self.events {
            store.save_event(event.clone()).await?;
        }
        for row in &self.predictions {
            let mut prediction = Prediction::new(
                row.user_id.clone(),
                row.event_id.clone(),
                campaign_id.clone(),
                row.prediction_data.clone(),
            );
            prediction.movie_id = row
                .movie_id
                .clone()
                .or_else(|| event_movies.get(&row.event_id).map(|m| (*m).clone()));
            store.import_prediction(prediction);
        }

        info!(
            "📥 Imported {} events and {} predictions for {}",
            self.events.len(),
            store.prediction_count(),
            campaign_id
        );
        Ok(())
    }
}
