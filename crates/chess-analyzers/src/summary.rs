//! Report types produced by the detectors and the aggregator.

use std::collections::BTreeMap;

use chess_core::{Evaluation, GameResult, Phase, Side, TimeControl};
use serde::{Deserialize, Serialize};

/// One ranked example inside a motif bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifExample {
    pub game_id: String,
    pub ply: u32,
    pub fen: String,
    pub move_san: String,
    pub best_move_san: String,
    /// Ranking metric, usually the centipawn loss
    pub severity: i32,
    pub cpl: i32,
    pub pv: Vec<String>,
    #[serde(default)]
    pub game_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifBucket {
    pub name: String,
    pub description: String,
    /// Every candidate, not just the examples
    pub count: usize,
    pub subtype_counts: BTreeMap<String, usize>,
    pub examples: Vec<MotifExample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub phase: Phase,
    pub total_moves: usize,
    pub acpl: f64,
    pub blunders: usize,
    pub mistakes: usize,
    pub inaccuracies: usize,
    pub blunders_per_100: f64,
    pub mistakes_per_100: f64,
    pub inaccuracies_per_100: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeControlStats {
    pub time_control: TimeControl,
    pub games: usize,
    pub total_moves: usize,
    pub acpl: f64,
    pub blunders: usize,
    pub mistakes: usize,
    pub inaccuracies: usize,
    pub blunders_per_100: f64,
    pub mistakes_per_100: f64,
    pub inaccuracies_per_100: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingMove {
    pub game_id: String,
    pub ply: u32,
    pub move_san: String,
    pub fen_before: String,
    pub best_move_san: String,
    pub cpl: i32,
    pub eval_before: Evaluation,
    pub eval_after: Evaluation,
    pub pv: Vec<String>,
    pub phase: Phase,
    pub game_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: String,
    pub player_color: Side,
    pub result: GameResult,
    pub time_control: TimeControl,
    pub opponent: String,
    pub total_moves: usize,
    pub acpl: f64,
    pub blunders: usize,
    pub mistakes: usize,
    pub inaccuracies: usize,
    pub url: String,
    pub date: String,
}

/// Think-time statistics. Rates are fractions in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStats {
    pub clock_coverage: f64,
    pub timed_moves: usize,
    pub avg_dt_s: f64,
    pub median_dt_s: f64,
    pub p90_dt_s: f64,
    pub time_trouble_rate: f64,
    pub blunder_rate_fast: f64,
    pub blunder_rate_normal: f64,
    pub autopilot_blunders: usize,
    pub calculation_failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub username: String,
    pub total_games: usize,
    pub total_moves: usize,
    pub acpl: f64,
    pub phase_stats: Vec<PhaseStats>,
    pub time_control_stats: Vec<TimeControlStats>,
    pub swing_moves: Vec<SwingMove>,
    pub motifs: Vec<MotifBucket>,
    pub game_summaries: Vec<GameSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stats: Option<TimeStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_acpl_white: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_acpl_black: Option<f64>,
}
