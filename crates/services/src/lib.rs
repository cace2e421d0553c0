pub mod scoring;
pub mod lifecycle;
pub mod distribution;
pub mod leaderboard;
pub mod live;
pub mod metrics;

pub use scoring::*;
pub use lifecycle::*;
pub use distribution::*;
pub use leaderboard::*;
pub use live::*;
pub use metrics::*;
