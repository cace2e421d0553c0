mod config;
mod snapshot;

use anyhow::Result;
use crate::config::AppConfig;
use fanpredict_models::{CampaignId, Prediction, RankedParticipation, UserId};
use fanpredict_services::{
    by_geography, by_group, by_movie, rank, DistributionCoordinator, GeoLevel, LiveLeaderboard,
    MetricsCollector,
};
use fanpredict_store::{CampaignRepository, InMemoryStore, PageRequest, SettlementStore};
use fanpredict_stream::EventBus;
use crate::snapshot::CampaignSnapshot;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn log_board(title: &str, rows: &[RankedParticipation], top_n: usize) {
    info!("🏆 {}", title);
    for row in rows.iter().take(top_n) {
        info!(
            "   #{:<3} {:<16} {:>6} pts  ({}/{} correct)",
            row.rank,
            row.participation.user_id,
            row.points,
            row.participation.correct_predictions,
            row.participation.predictions_count
        );
    }
}

async fn all_predictions(
    store: &InMemoryStore,
    campaign_id: &CampaignId,
    batch_size: usize,
) -> Result<Vec<Prediction>> {
    let mut predictions = Vec::new();
    let mut next = Some(PageRequest::first(batch_size.max(1)));
    while let Some(request) = next {
        let page = store.predictions_page(campaign_id, request).await?;
        predictions.extend(page.predictions);
        next = page.next;
    }
    Ok(predictions)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fanpredict=debug,fanpredict_services=info,fanpredict_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting FanPredict settlement run");

    let config = AppConfig::new()?;
    info!("✅ Configuration loaded successfully");
    info!("📂 Snapshot: {}", config.snapshot.path);

    let campaign_id = CampaignId::new(config.snapshot.campaign_id.clone());
    let operator_id = UserId::new(config.snapshot.operator_id.clone());

    let snapshot = CampaignSnapshot::load(&config.snapshot.path)?;
    let store = Arc::new(InMemoryStore::new());
    snapshot.import(&campaign_id, &store).await?;

    let bus = EventBus::new();
    let metrics = MetricsCollector::new();

    let live = LiveLeaderboard::new(
        store.clone(),
        campaign_id.clone(),
        config.settlement.batch_size,
        metrics.clone(),
    );
    let mut board_updates = live.subscribe();
    let live_handle = live.spawn(&bus);

    let coordinator = DistributionCoordinator::new(store.clone(), config.distribution())
        .with_metrics(metrics.clone())
        .with_bus(bus.clone());

    match coordinator.preview(&campaign_id).await {
        Ok(plan) => info!(
            "🔍 Preview: {} points to {} users ({} predictions, {} skipped)",
            plan.total_points,
            plan.users_updated,
            plan.predictions_scored,
            plan.errors.len()
        ),
        Err(e) => warn!("🔍 Preview unavailable: {}", e),
    }

    match coordinator.distribute(&campaign_id, &operator_id).await {
        Ok(report) if report.success => {
            info!(
                "🎉 Settlement complete: {} points to {} users",
                report.total_points_distributed, report.users_updated
            );
            for skipped in &report.errors {
                warn!("   skipped: {}", skipped);
            }
        }
        Ok(report) => {
            for e in &report.errors {
                error!("   {}", e);
            }
            error!("❌ Settlement aborted, no balances changed");
        }
        Err(e) => warn!("⚠️ Settlement not performed: {}", e),
    }

    let top_n = config.leaderboard.top_n;
    let participations = store.participations(&campaign_id).await?;
    if participations.is_empty() {
        // Not settled: show whatever the live feed last produced.
        let board = board_updates.borrow_and_update().clone();
        log_board("Live estimate", &board.rows, top_n);
    } else {
        log_board("Overall", &rank(&participations), top_n);

        for (movie, board) in by_movie(&participations) {
            log_board(&format!("Movie {}", movie), &board, top_n);
        }

        let events = store.events(&campaign_id).await?;
        let predictions = all_predictions(&store, &campaign_id, config.settlement.batch_size).await?;
        for (group, board) in by_group(&participations, &predictions, &events) {
            log_board(&format!("Group {}", group), &board, top_n);
        }

        for (city, board) in by_geography(&participations, &snapshot.profiles, GeoLevel::City) {
            log_board(&format!("City {}", city), &board, top_n);
        }
    }

    metrics.log_performance_summary().await;

    drop(coordinator);
    drop(bus);
    if let Err(e) = live_handle.await {
        error!("❌ Live leaderboard task failed: {}", e);
    }
    info!("👋 Done");

    Ok(())
}
