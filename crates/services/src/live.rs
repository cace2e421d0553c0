use chrono::{DateTime, Utc};
use fanpredict_models::{CampaignId, Participation, RankedParticipation};
use fanpredict_store::{PageRequest, SettlementStore, StoreResult};
use fanpredict_stream::EventBus;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::distribution::ParticipationBuilder;
use crate::leaderboard::rank;
use crate::metrics::{Counter, MetricsCollector};

/// A complete board. Consumers replace whatever they held with it.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardSnapshot {
    pub campaign_id: CampaignId,
    pub generated_at: DateTime<Utc>,
    /// Ranked from committed participations rather than live estimates.
    pub settled: bool,
    pub version: u64,
    pub rows: Vec<RankedParticipation>,
}

impl LeaderboardSnapshot {
    fn empty(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id,
            generated_at: Utc::now(),
            settled: false,
            version: 0,
            rows: Vec::new(),
        }
    }
}

/// Recomputes the whole campaign board on every change notification.
pub struct LiveLeaderboard<S> {
    store: Arc<S>,
    campaign_id: CampaignId,
    batch_size: usize,
    metrics: MetricsCollector,
    sender: watch::Sender<LeaderboardSnapshot>,
}

impl<S: SettlementStore + 'static> LiveLeaderboard<S> {
    pub fn new(store: Arc<S>, campaign_id: CampaignId, batch_size: usize, metrics: MetricsCollector) -> Self {
        let (sender, _) = watch::channel(LeaderboardSnapshot::empty(campaign_id.clone()));
        Self {
            store,
            campaign_id,
            batch_size: batch_size.max(1),
            metrics,
            sender,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LeaderboardSnapshot> {
        self.sender.subscribe()
    }

    async fn participations(&self) -> StoreResult<(Vec<Participation>, bool)> {
        let settled = self
            .store
            .distribution_record(&self.campaign_id)
            .await?
            .is_some_and(|r| r.distributed);
        if settled {
            return Ok((self.store.participations(&self.campaign_id).await?, true));
        }

        let events = self.store.events(&self.campaign_id).await?;
        let mut builder = ParticipationBuilder::for_estimate(self.campaign_id.clone(), &events);
        let mut next = Some(PageRequest::first(self.batch_size));
        while let Some(request) = next {
            let page = self.store.predictions_page(&self.campaign_id, request).await?;
            for prediction in &page.predictions {
                builder.add(prediction);
            }
            next = page.next;
        }
        Ok((builder.finish().participations, false))
    }

    /// Rebuild the board now and publish it to every subscriber.
    pub async fn refresh(&self) -> StoreResult<LeaderboardSnapshot> {
        let tracker = self.metrics.start_latency_tracking("leaderboard");
        let (participations, settled) = self.participations().await?;
        let version = self.sender.borrow().version + 1;

        let snapshot = LeaderboardSnapshot {
            campaign_id: self.campaign_id.clone(),
            generated_at: Utc::now(),
            settled,
            version,
            rows: rank(&participations),
        };
        self.sender.send_replace(snapshot.clone());

        tracker.finish(&self.metrics).await;
        self.metrics.increment(Counter::LeaderboardRefresh).await;
        debug!(
            "🏆 Leaderboard v{} for {}: {} rows (settled: {})",
            snapshot.version,
            self.campaign_id,
            snapshot.rows.len(),
            settled
        );
        Ok(snapshot)
    }

    /// Publish an initial board, then follow the bus until it closes.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let mut changes = bus.subscribe();
        tokio::spawn(async move {
            info!("📡 Live leaderboard started for campaign {}", self.campaign_id);
            if let Err(e) = self.refresh().await {
                warn!("⚠️ Initial leaderboard build failed: {}", e);
            }

            loop {
                match changes.recv().await {
                    Ok(note) if note.campaign_id != self.campaign_id => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed notifications only mean the board is stale.
                        debug!("Leaderboard feed lagged by {} notifications", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if let Err(e) = self.refresh().await {
                    warn!("⚠️ Leaderboard refresh failed for {}: {}", self.campaign_id, e);
                }
            }
            info!("📴 Live leaderboard stopped for campaign {}", self.campaign_id);
        })
    }
}
