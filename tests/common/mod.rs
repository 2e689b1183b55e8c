#![allow(dead_code)]

use analysis_worker::config::{
    AnalysisConfig, ClassificationThresholds, EngineSettings, SearchBudget,
};
use analysis_worker::{EngineOutput, PositionEvaluator, WorkerError};
use chess_core::board::{move_to_uci, parse_fen, piece_value};
use chess_core::{
    Evaluation, GameResult, MoveAnalysis, MoveFlag, ParsedGame, Phase, Side, TimeControl,
};
use shakmaty::{Color, Position, Role};
use std::path::Path;

/// One-ply material evaluator: scores the material balance plus the best
/// capture available to the side to move, and plays that capture.
pub struct Greedy;

fn material(pos: &shakmaty::Chess, color: Color) -> i32 {
    let board = pos.board();
    Role::ALL
        .iter()
        .map(|&role| (board.by_color(color) & board.by_role(role)).count() as i32 * piece_value(role))
        .sum()
}

impl PositionEvaluator for Greedy {
    async fn evaluate(&mut self, fen: &str, _budget: SearchBudget) -> Result<EngineOutput, WorkerError> {
        let pos = parse_fen(fen)?;
        let moves = pos.legal_moves();
        let best = moves
            .iter()
            .max_by_key(|m| m.capture().map(piece_value).unwrap_or(0));
        let gain = best.and_then(|m| m.capture()).map(piece_value).unwrap_or(0);

        let sign = if pos.turn() == Color::White { 1 } else { -1 };
        let balance = material(&pos, Color::White) - material(&pos, Color::Black);
        let best_move = best.map(move_to_uci);
        Ok(EngineOutput {
            eval: Evaluation::Cp((balance + sign * gain) * 100),
            pv: best_move.iter().cloned().collect(),
            best_move,
        })
    }

    async fn recover(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    async fn quit(&mut self) {}
}

pub fn config(root: &Path, workers: usize) -> AnalysisConfig {
    AnalysisConfig {
        username: "hero".into(),
        games_path: root.join("games.jsonl"),
        output_dir: root.join("out"),
        cache_dir: root.join("cache"),
        engine: EngineSettings {
            path: "stockfish".into(),
            budget: SearchBudget::Depth(1),
            threads: 1,
            hash_mb: 16,
        },
        both_sides: false,
        workers,
        thresholds: ClassificationThresholds::default(),
        position_cache: true,
        game_cache: true,
        swing_moves: 10,
        single_game: None,
    }
}

pub fn game(id: &str, player_color: Side, moves: &[&str], clocks: &[f64]) -> ParsedGame {
    let (white, black) = match player_color {
        Side::White => ("hero", "rival"),
        Side::Black => ("rival", "hero"),
    };
    ParsedGame {
        game_id: id.into(),
        white: white.into(),
        black: black.into(),
        result: GameResult::Loss,
        date: "2024.05.01".into(),
        time_control_raw: "180+2".into(),
        time_control: TimeControl::Blitz,
        rated: true,
        player_color,
        moves_san: moves.iter().map(|m| m.to_string()).collect(),
        fens: vec![],
        clock_times: clocks.iter().map(|&c| Some(c)).collect(),
        url: format!("https://example.org/{id}"),
        eco: String::new(),
    }
}

/// Synthetic player move, flagged with the default thresholds.
pub fn record(game_id: &str, ply: u32, cpl: i32, phase: Phase) -> MoveAnalysis {
    let flag = match cpl {
        0 => MoveFlag::Best,
        1..=49 => MoveFlag::Good,
        50..=99 => MoveFlag::Inaccuracy,
        100..=199 => MoveFlag::Mistake,
        _ => MoveFlag::Blunder,
    };
    MoveAnalysis {
        game_id: game_id.into(),
        ply,
        move_san: "Kf1".into(),
        move_uci: "e1f1".into(),
        fen_before: "4k3/8/8/8/8/8/8/R3K3 w Q - 0 40".into(),
        side_to_move: if ply % 2 == 1 { Side::White } else { Side::Black },
        eval_before: Evaluation::Cp(0),
        best_move_uci: "a1a8".into(),
        best_move_san: "Ra8+".into(),
        eval_best: Evaluation::Cp(0),
        eval_after: Evaluation::Cp(-cpl),
        cpl,
        flag,
        pv: vec!["a1a8".into()],
        refutation: vec![],
        phase,
        is_player_move: true,
        clock_remaining: None,
    }
}
