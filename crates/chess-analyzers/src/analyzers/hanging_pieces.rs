use chess_core::board::{parse_fen, parse_uci_move, piece_value, play, role_name};
use chess_core::MoveAnalysis;

use crate::analyzer_trait::{probe_each, Candidate, MotifDetector, ProbeError};

const MIN_CPL: i32 = 200;
const HEAVY_LOSS_CPL: i32 = 300;

/// Player moves after which the opponent's best reply simply takes material.
pub struct HangingPiecesDetector;

impl HangingPiecesDetector {
    fn probe<'a>(&self, a: &'a MoveAnalysis) -> Result<Option<Candidate<'a>>, ProbeError> {
        if !a.is_player_move || a.cpl < MIN_CPL {
            return Ok(None);
        }
        let Some(reply_uci) = a.refutation.first() else {
            return Ok(None);
        };

        let pos = parse_fen(&a.fen_before)?;
        let played = parse_uci_move(&pos, &a.move_uci)?;
        let after = play(&pos, &played);
        let reply = parse_uci_move(&after, reply_uci)?;
        let Some(captured) = reply.capture() else {
            return Ok(None);
        };

        let value = piece_value(captured);
        let candidate = Candidate::plain(a);
        if value >= 3 || (a.cpl >= HEAVY_LOSS_CPL && value >= 1) {
            Ok(Some(
                candidate
                    .with_subtype("hang_en_prise", 0.9)
                    .with_meta("lost_piece_type", role_name(captured))
                    .with_meta("lost_square", reply.to().to_string())
                    .with_meta("captured_by_piece_type", role_name(reply.role())),
            ))
        } else {
            Ok(Some(candidate))
        }
    }
}

impl MotifDetector for HangingPiecesDetector {
    fn name(&self) -> &'static str {
        "Hanging Pieces"
    }

    fn description(&self) -> &'static str {
        "Moves that leave material where the opponent can take it."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        probe_each(self.name(), analyses, |a| self.probe(a))
    }
}
