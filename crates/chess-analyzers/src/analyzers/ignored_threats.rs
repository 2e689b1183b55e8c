use chess_core::board::{gives_check, move_to_san, parse_fen, parse_uci_move, piece_value, play, role_name};
use chess_core::MoveAnalysis;

use crate::analyzer_trait::{probe_each, Candidate, MotifDetector, ProbeError};

const MIN_CPL: i32 = 250;

/// Player moves that let the opponent's forcing reply through.
pub struct IgnoredThreatsDetector;

impl IgnoredThreatsDetector {
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
        let candidate = Candidate::plain(a);

        if gives_check(&after, &reply) {
            let mated = a.eval_after.is_losing_mate();
            let mut c = candidate
                .with_subtype("allowed_forcing_check", if mated { 0.85 } else { 0.7 })
                .with_meta("first_check_move", move_to_san(&after, &reply));
            if let Some(m) = a.eval_after.mate() {
                c = c.with_meta("mate_in_plies", m.abs() * 2);
            }
            return Ok(Some(c));
        }

        match reply.capture() {
            Some(captured) => {
                let value = piece_value(captured);
                Ok(Some(
                    candidate
                        .with_subtype("allowed_forcing_capture", if value >= 3 { 0.85 } else { 0.7 })
                        .with_meta("captured_square", reply.to().to_string())
                        .with_meta("captured_piece_type", role_name(captured)),
                ))
            }
            None => Ok(None),
        }
    }
}

impl MotifDetector for IgnoredThreatsDetector {
    fn name(&self) -> &'static str {
        "Ignored Threats"
    }

    fn description(&self) -> &'static str {
        "Moves that overlooked the opponent's check or capture."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        probe_each(self.name(), analyses, |a| self.probe(a))
    }
}
