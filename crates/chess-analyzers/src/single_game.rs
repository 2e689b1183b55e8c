//! One game measured against the player's latest full run.

use std::collections::HashMap;

use chess_core::{MoveAnalysis, ParsedGame, Phase};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{compute_phase_stats, detect_motifs_with_urls, select_swing_moves, summarize_game};
use crate::summary::{GameSummary, MotifBucket, PhaseStats, SwingMove};

pub const SINGLE_GAME_SWING_MOVES: usize = 5;

/// A phase counts as weaker when its ACPL exceeds the baseline by more than this.
pub const WEAK_PHASE_MARGIN: f64 = 30.0;

/// Baseline figures read back from an earlier run's `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContext {
    /// Directory name of the run the figures come from
    #[serde(default)]
    pub run_id: String,
    pub username: String,
    pub total_games: usize,
    pub total_moves: usize,
    pub acpl: f64,
    #[serde(default)]
    pub phase_stats: Vec<PhaseStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    MuchBetter,
    SlightlyBetter,
    Average,
    Worse,
}

impl Verdict {
    /// Bands of 20 cp around the baseline ACPL.
    pub fn from_delta(delta: f64) -> Self {
        if delta < -20.0 {
            Verdict::MuchBetter
        } else if delta < 0.0 {
            Verdict::SlightlyBetter
        } else if delta < 20.0 {
            Verdict::Average
        } else {
            Verdict::Worse
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    /// Game ACPL minus baseline ACPL
    pub acpl_delta: f64,
    pub verdict: Verdict,
    pub weaker_phases: Vec<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleGameSummary {
    pub game: GameSummary,
    pub phase_stats: Vec<PhaseStats>,
    pub swing_moves: Vec<SwingMove>,
    pub motifs: Vec<MotifBucket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_context: Option<HistoricalContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<BaselineComparison>,
}

/// Compare phases both sides actually played.
fn weaker_phases(game: &[PhaseStats], baseline: &[PhaseStats]) -> Vec<Phase> {
    let base: HashMap<Phase, &PhaseStats> = baseline
        .iter()
        .filter(|p| p.total_moves > 0)
        .map(|p| (p.phase, p))
        .collect();
    game.iter()
        .filter(|p| p.total_moves > 0)
        .filter(|p| {
            base.get(&p.phase)
                .is_some_and(|b| p.acpl > b.acpl + WEAK_PHASE_MARGIN)
        })
        .map(|p| p.phase)
        .collect()
}

pub fn compare_to_baseline(
    game: &GameSummary,
    phase_stats: &[PhaseStats],
    baseline: &HistoricalContext,
) -> BaselineComparison {
    let acpl_delta = game.acpl - baseline.acpl;
    BaselineComparison {
        acpl_delta,
        verdict: Verdict::from_delta(acpl_delta),
        weaker_phases: weaker_phases(phase_stats, &baseline.phase_stats),
    }
}

/// Stats for one phase-labeled game, optionally against a baseline.
pub fn compute_single_game_stats(
    analyses: &[MoveAnalysis],
    game: &ParsedGame,
    historical_context: Option<HistoricalContext>,
) -> SingleGameSummary {
    let games = std::slice::from_ref(game);
    let row = summarize_game(analyses, game);
    let phase_stats = compute_phase_stats(analyses);
    let comparison = historical_context
        .as_ref()
        .map(|baseline| compare_to_baseline(&row, &phase_stats, baseline));

    info!(
        game_id = %game.game_id,
        moves = row.total_moves,
        acpl = %format!("{:.1}", row.acpl),
        baseline = historical_context.is_some(),
        "Single-game stats computed"
    );

    SingleGameSummary {
        swing_moves: select_swing_moves(analyses, games, SINGLE_GAME_SWING_MOVES),
        motifs: detect_motifs_with_urls(analyses, games),
        game: row,
        phase_stats,
        historical_context,
        comparison,
    }
}
