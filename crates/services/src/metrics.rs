use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementMetrics {
    pub timestamp: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub distributions_attempted: u64,
    pub distributions_succeeded: u64,
    pub distributions_blocked: u64,
    pub duplicate_attempts: u64,
    pub commit_retries: u64,
    pub write_failures: u64,
    pub predictions_scored: u64,
    pub scoring_errors: u64,
    pub leaderboard_refreshes: u64,
    pub last_distribution_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub avg_distribution_time_ms: f64,
    pub avg_leaderboard_time_ms: f64,
    pub success_rate_percent: f64,
    pub scoring_error_rate_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    DistributionAttempted,
    DistributionSucceeded,
    DistributionBlocked,
    DuplicateAttempt,
    CommitRetry,
    WriteFailure,
    PredictionScored,
    ScoringError,
    LeaderboardRefresh,
}

#[derive(Debug)]
pub struct LatencyTracker {
    start_time: Instant,
    operation: &'static str,
}

impl LatencyTracker {
    pub fn new(operation: &'static str) -> Self {
        Self {
            start_time: Instant::now(),
            operation,
        }
    }

    pub async fn finish(self, metrics: &MetricsCollector) {
        metrics
            .record_operation_latency(self.operation, self.start_time.elapsed())
            .await;
    }
}

const MAX_SAMPLES_PER_OPERATION: usize = 1000;

#[derive(Clone)]
pub struct MetricsCollector {
    start_time: Instant,
    metrics: Arc<RwLock<SettlementMetrics>>,
    operation_times: Arc<RwLock<HashMap<&'static str, Vec<Duration>>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            metrics: Arc::new(RwLock::new(SettlementMetrics::default())),
            operation_times: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn increment(&self, counter: Counter) {
        self.add(counter, 1).await;
    }

    pub async fn add(&self, counter: Counter, amount: u64) {
        let mut metrics = self.metrics.write().await;
        let slot = match counter {
            Counter::DistributionAttempted => &mut metrics.distributions_attempted,
            Counter::DistributionSucceeded => &mut metrics.distributions_succeeded,
            Counter::DistributionBlocked => &mut metrics.distributions_blocked,
            Counter::DuplicateAttempt => &mut metrics.duplicate_attempts,
            Counter::CommitRetry => &mut metrics.commit_retries,
            Counter::WriteFailure => &mut metrics.write_failures,
            Counter::PredictionScored => &mut metrics.predictions_scored,
            Counter::ScoringError => &mut metrics.scoring_errors,
            Counter::LeaderboardRefresh => &mut metrics.leaderboard_refreshes,
        };
        *slot += amount;
    }

    pub async fn record_operation_latency(&self, operation: &'static str, duration: Duration) {
        {
            let mut times = self.operation_times.write().await;
            let samples = times.entry(operation).or_default();
            samples.push(duration);
            if samples.len() > MAX_SAMPLES_PER_OPERATION {
                samples.remove(0);
            }
        }

        if operation == "distribution" {
            let mut metrics = self.metrics.write().await;
            metrics.last_distribution_latency_ms = duration.as_secs_f64() * 1000.0;
        }
    }

    pub fn start_latency_tracking(&self, operation: &'static str) -> LatencyTracker {
        LatencyTracker::new(operation)
    }

    pub async fn get_current_metrics(&self) -> SettlementMetrics {
        let mut metrics = self.metrics.read().await.clone();
        metrics.uptime_seconds = self.start_time.elapsed().as_secs();
        metrics.timestamp = Some(Utc::now());
        metrics
    }

    async fn average_ms(&self, operation: &str) -> f64 {
        let times = self.operation_times.read().await;
        times
            .get(operation)
            .filter(|samples| !samples.is_empty())
            .map(|samples| {
                let sum: Duration = samples.iter().sum();
                sum.as_secs_f64() * 1000.0 / samples.len() as f64
            })
            .unwrap_or(0.0)
    }

    pub async fn get_performance_stats(&self) -> PerformanceStats {
        let metrics = self.get_current_metrics().await;

        let success_rate = if metrics.distributions_attempted > 0 {
            metrics.distributions_succeeded as f64 / metrics.distributions_attempted as f64 * 100.0
        } else {
            0.0
        };
        let scored = metrics.predictions_scored + metrics.scoring_errors;
        let scoring_error_rate = if scored > 0 {
            metrics.scoring_errors as f64 / scored as f64 * 100.0
        } else {
            0.0
        };

        PerformanceStats {
            avg_distribution_time_ms: self.average_ms("distribution").await,
            avg_leaderboard_time_ms: self.average_ms("leaderboard").await,
            success_rate_percent: success_rate,
            scoring_error_rate_percent: scoring_error_rate,
        }
    }

    pub async fn log_performance_summary(&self) {
        let stats = self.get_performance_stats().await;
        let metrics = self.get_current_metrics().await;

        info!("📈 Settlement Summary:");
        info!("   Distributions attempted: {}", metrics.distributions_attempted);
        info!("   Distributions succeeded: {}", metrics.distributions_succeeded);
        info!("   Blocked: {}, duplicates refused: {}", metrics.distributions_blocked, metrics.duplicate_attempts);
        info!("   Commit retries: {}, write failures: {}", metrics.commit_retries, metrics.write_failures);
        info!("   Predictions scored: {} ({:.2}% errors)", metrics.predictions_scored, stats.scoring_error_rate_percent);
        info!("   Leaderboard refreshes: {}", metrics.leaderboard_refreshes);
        info!("   Average distribution time: {:.2}ms", stats.avg_distribution_time_ms);
        info!("   Average leaderboard time: {:.2}ms", stats.avg_leaderboard_time_ms);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_counters() {
        let collector = MetricsCollector::new();

        collector.increment(Counter::DistributionAttempted).await;
        collector.increment(Counter::DistributionAttempted).await;
        collector.increment(Counter::DistributionSucceeded).await;
        collector.add(Counter::PredictionScored, 3).await;
        collector.increment(Counter::ScoringError).await;

        let metrics = collector.get_current_metrics().await;
        assert_eq!(metrics.distributions_attempted, 2);
        assert_eq!(metrics.distributions_succeeded, 1);
        assert_eq!(metrics.predictions_scored, 3);

        let stats = collector.get_performance_stats().await;
        assert!((stats.success_rate_percent - 50.0).abs() < 1e-9);
        assert!((stats.scoring_error_rate_percent - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_latency_tracking() {
        let collector = MetricsCollector::new();

        let tracker = collector.start_latency_tracking("distribution");
        sleep(Duration::from_millis(5)).await;
        tracker.finish(&collector).await;

        let metrics = collector.get_current_metrics().await;
        assert!(metrics.last_distribution_latency_ms >= 5.0);
        assert!(collector.get_performance_stats().await.avg_distribution_time_ms >= 5.0);
    }
}
