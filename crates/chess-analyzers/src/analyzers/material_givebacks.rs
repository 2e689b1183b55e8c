use std::collections::HashMap;

use chess_core::MoveAnalysis;

use crate::analyzer_trait::{Candidate, MotifDetector};

const MIN_SPIKE: i32 = 200;
const MIN_DROP: i32 = 250;
/// Player moves after the spike in which the advantage may be returned.
const LOOKAHEAD: usize = 3;

/// Winning material and handing it straight back.
pub struct MaterialGivebacksDetector;

impl MotifDetector for MaterialGivebacksDetector {
    fn name(&self) -> &'static str {
        "Material Givebacks"
    }

    fn description(&self) -> &'static str {
        "Winning material then immediately giving it back."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        let mut order: Vec<&str> = Vec::new();
        let mut by_game: HashMap<&str, Vec<&'a MoveAnalysis>> = HashMap::new();
        for a in analyses.iter().filter(|a| a.is_player_move) {
            by_game
                .entry(a.game_id.as_str())
                .or_insert_with(|| {
                    order.push(a.game_id.as_str());
                    Vec::new()
                })
                .push(a);
        }

        let mut out: Vec<Candidate<'a>> = Vec::new();
        let mut seen: HashMap<(&str, u32), usize> = HashMap::new();
        for game_id in order {
            let Some(moves) = by_game.get_mut(game_id) else {
                continue;
            };
            moves.sort_by_key(|m| m.ply);

            for (i, current) in moves.iter().enumerate() {
                let peak = current.eval_after.clamped_cp();
                if peak - current.eval_before.clamped_cp() < MIN_SPIKE {
                    continue;
                }
                let giveback = moves
                    .iter()
                    .skip(i + 1)
                    .take(LOOKAHEAD)
                    .map(|&next| (next, peak - next.eval_after.clamped_cp()))
                    .find(|&(_, drop)| drop >= MIN_DROP);
                let Some((next, drop)) = giveback else {
                    continue;
                };

                match seen.get(&(game_id, next.ply)) {
                    Some(&idx) => {
                        if drop > out[idx].severity {
                            out[idx].severity = drop;
                            out[idx].meta.insert("peak_ply".into(), current.ply.into());
                            out[idx].meta.insert("peak_eval".into(), peak.into());
                        }
                    }
                    None => {
                        seen.insert((game_id, next.ply), out.len());
                        out.push(
                            Candidate::plain(next)
                                .with_severity(drop)
                                .with_meta("peak_ply", current.ply)
                                .with_meta("peak_eval", peak),
                        );
                    }
                }
            }
        }
        out
    }
}
