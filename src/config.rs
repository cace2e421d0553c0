use config::{Config, ConfigError, Environment, File};
use fanpredict_services::DistributionConfig;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub settlement: SettlementConfig,
    pub leaderboard: LeaderboardConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub batch_size: usize,
    pub max_commit_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub path: String,
    pub campaign_id: String,
    pub operator_id: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .set_default("settlement.batch_size", 500)?
            .set_default("settlement.max_commit_retries", 3)?
            .set_default("settlement.retry_backoff_ms", 50)?
            .set_default("leaderboard.top_n", 10)?
            .set_default("snapshot.path", "demos/campaign.json")?
            .set_default("snapshot.campaign_id", "box-office-2024")?
            .set_default("snapshot.operator_id", "ops-admin")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::new().separator("_"))
            .build()?;

        config.try_deserialize()
    }

    pub fn distribution(&self) -> DistributionConfig {
        DistributionConfig {
            batch_size: self.settlement.batch_size,
            max_commit_retries: self.settlement.max_commit_retries,
            retry_backoff_ms: self.settlement.retry_backoff_ms,
        }
    }
}
