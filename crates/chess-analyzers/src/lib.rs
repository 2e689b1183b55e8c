//! Weakness analytics over evaluated moves.
//!
//! Six motif detectors scan the per-move records for recurring error
//! patterns, the aggregator rolls the records up by phase, time control and
//! game, and the time-usage analyzer relates think time to blunders. The main
//! entry point is [`compute_summary`], which runs all of them;
//! [`compute_single_game_stats`] does the same for one game against an
//! earlier run's baseline.

pub mod aggregate;
pub mod analyzer_trait;
pub mod analyzers;
pub mod single_game;
pub mod summary;
pub mod time_usage;
pub mod unified;

pub use aggregate::{compute_summary, DEFAULT_SWING_MOVES};
pub use analyzer_trait::{MotifDetector, ProbeError};
pub use single_game::{compute_single_game_stats, HistoricalContext, SingleGameSummary};
pub use summary::{
    GameSummary, MotifBucket, MotifExample, PhaseStats, Summary, SwingMove, TimeControlStats,
    TimeStats,
};
pub use time_usage::compute_time_stats;
pub use unified::detect_motifs;
