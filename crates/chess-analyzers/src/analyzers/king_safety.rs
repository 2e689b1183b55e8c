use chess_core::board::{parse_fen, relative_rank, shield_pawn_files};
use chess_core::{MoveAnalysis, Phase};
use shakmaty::{Color, Position};

use crate::analyzer_trait::{probe_each, Candidate, MotifDetector, ProbeError};

const MIN_CPL: i32 = 200;
const MIN_SHIELD_PAWNS: u32 = 2;

/// Middlegame errors made with a thin pawn cover in front of the king.
pub struct KingSafetyDetector;

impl KingSafetyDetector {
    fn probe<'a>(&self, a: &'a MoveAnalysis) -> Result<Option<Candidate<'a>>, ProbeError> {
        if !a.is_player_move || a.phase != Phase::Middlegame || a.cpl < MIN_CPL {
            return Ok(None);
        }

        let pos = parse_fen(&a.fen_before)?;
        let color = Color::from(a.side_to_move);
        let king = pos
            .board()
            .king_of(color)
            .ok_or(ProbeError::MissingKing(a.side_to_move.as_str()))?;

        if relative_rank(king, color) > 1 {
            return Ok(None);
        }
        let shield = shield_pawn_files(pos.board(), king, color);
        if shield >= MIN_SHIELD_PAWNS {
            return Ok(None);
        }

        Ok(Some(
            Candidate::plain(a)
                .with_meta("king_square", king.to_string())
                .with_meta("shield_pawns", shield),
        ))
    }
}

impl MotifDetector for KingSafetyDetector {
    fn name(&self) -> &'static str {
        "King Safety"
    }

    fn description(&self) -> &'static str {
        "Middlegame errors with a weakened pawn shield."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        probe_each(self.name(), analyses, |a| self.probe(a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer_trait::test_support::position;
    use chess_core::board::START_FEN;

    const THIN_SHIELD: &str = "r1bq1rk1/pppp1ppp/2n2n2/4p3/4P3/2N2N2/PPPP2P1/R1BQ1RK1 w - - 0 8";
    const KING_UP: &str = "r1bq1rk1/pppp1ppp/2n2n2/4p3/4P3/2N2NK1/PPPP2P1/R1BQ1R2 w - - 0 8";

    #[test]
    fn test_thin_shield_is_flagged() {
        let r = position(THIN_SHIELD, "d2d3", "d2d4", &[], 250);
        let bucket = KingSafetyDetector.detect(&[r]);
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.examples[0].meta["king_square"], "g1");
        assert_eq!(bucket.examples[0].meta["shield_pawns"], 1);
    }

    #[test]
    fn test_intact_shield_or_advanced_king_ignored() {
        let intact = position(START_FEN, "e2e4", "d2d4", &[], 250);
        let advanced = position(KING_UP, "d2d3", "d2d4", &[], 250);
        assert_eq!(KingSafetyDetector.detect(&[intact, advanced]).count, 0);
    }

    #[test]
    fn test_only_middlegame_blunders() {
        let mut opening = position(THIN_SHIELD, "d2d3", "d2d4", &[], 250);
        opening.phase = Phase::Opening;
        let small = position(THIN_SHIELD, "d2d3", "d2d4", &[], 150);
        assert_eq!(KingSafetyDetector.detect(&[opening, small]).count, 0);
    }
}
