use chess_core::board::{gives_check, knight_fork_targets, parse_fen, parse_uci_move, piece_value, role_name};
use chess_core::MoveAnalysis;
use shakmaty::{Position, Role};

use crate::analyzer_trait::{probe_each, Candidate, MotifDetector, ProbeError};

const MIN_CPL: i32 = 150;
const CHECK_MIN_CPL: i32 = 200;
/// Positions already this bad are excluded; there is nothing left to miss.
const MIN_EVAL_BEFORE: i32 = -100;

/// Player moves that passed over a forcing best move.
pub struct MissedTacticsDetector;

impl MissedTacticsDetector {
    fn probe<'a>(&self, a: &'a MoveAnalysis) -> Result<Option<Candidate<'a>>, ProbeError> {
        if !a.is_player_move || a.cpl < MIN_CPL || a.eval_before.clamped_cp() < MIN_EVAL_BEFORE {
            return Ok(None);
        }

        let candidate = Candidate::plain(a);
        if a.best_move_uci.is_empty() {
            return Ok(Some(candidate));
        }

        let pos = parse_fen(&a.fen_before)?;
        let best = parse_uci_move(&pos, &a.best_move_uci)?;
        let mover = pos.turn();

        if best.role() == Role::Knight {
            let targets = knight_fork_targets(pos.board(), best.to(), mover);
            if targets.count() >= 2 {
                let squares: Vec<String> = targets.into_iter().map(|sq| sq.to_string()).collect();
                return Ok(Some(
                    candidate
                        .with_subtype("motif_knight_fork", 0.85)
                        .with_meta("knight_to", best.to().to_string())
                        .with_meta("targets", squares),
                ));
            }
        }

        let mating = a.eval_best.is_winning_mate();
        if gives_check(&pos, &best) && (a.cpl >= CHECK_MIN_CPL || mating) {
            let mut c = candidate
                .with_subtype("missed_forcing_check", if mating { 0.85 } else { 0.7 })
                .with_meta("check_move", a.best_move_san.clone());
            if let Some(m) = a.eval_best.mate() {
                c = c.with_meta("mate_in_plies", m.abs() * 2);
            }
            return Ok(Some(c));
        }

        if let Some(captured) = best.capture() {
            let value = piece_value(captured);
            if value >= 1 {
                return Ok(Some(
                    candidate
                        .with_subtype("missed_forcing_capture", if value >= 3 { 0.8 } else { 0.65 })
                        .with_meta("capture_square", best.to().to_string())
                        .with_meta("captured_piece_type", role_name(captured)),
                ));
            }
        }

        Ok(Some(candidate))
    }
}

impl MotifDetector for MissedTacticsDetector {
    fn name(&self) -> &'static str {
        "Missed Tactics"
    }

    fn description(&self) -> &'static str {
        "Positions where a fork, forcing check or winning capture was available."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        probe_each(self.name(), analyses, |a| self.probe(a))
    }
}
