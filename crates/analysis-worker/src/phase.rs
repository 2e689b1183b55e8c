//! Game phase labeling: opening / middlegame / endgame.

use std::collections::HashMap;

use chess_core::board::{developed_minors, non_pawn_material, parse_fen};
use chess_core::{BoardError, MoveAnalysis, Phase};
use shakmaty::{Color, Position};

/// Combined non-pawn material at or below which a position is an endgame.
const ENDGAME_MATERIAL: i32 = 13;

/// Plies after which a position can no longer be an opening.
const OPENING_MAX_PLY: u32 = 20;

/// Phase of a single position, without regard to earlier positions.
pub fn detect_phase(fen: &str, ply: u32) -> Result<Phase, BoardError> {
    let pos = parse_fen(fen)?;
    let board = pos.board();

    if non_pawn_material(board) <= ENDGAME_MATERIAL {
        return Ok(Phase::Endgame);
    }

    let developed =
        developed_minors(board, Color::White) >= 2 && developed_minors(board, Color::Black) >= 2;
    if ply <= OPENING_MAX_PLY && !developed {
        return Ok(Phase::Opening);
    }

    Ok(Phase::Middlegame)
}

/// Label every record in place. Within a game the phase never moves backwards;
/// a record whose FEN cannot be parsed inherits the running phase.
pub fn label_phases(analyses: &mut [MoveAnalysis]) {
    let mut by_game: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, a) in analyses.iter().enumerate() {
        by_game.entry(a.game_id.clone()).or_default().push(idx);
    }

    for indices in by_game.values_mut() {
        indices.sort_by_key(|&i| analyses[i].ply);
        let mut current = Phase::Opening;
        for &i in indices.iter() {
            let record = &mut analyses[i];
            if let Ok(detected) = detect_phase(&record.fen_before, record.ply) {
                current = current.max(detected);
            }
            record.phase = current;
        }
    }
}
