use chess_core::{MoveAnalysis, MoveFlag, Phase};

use crate::analyzer_trait::{Candidate, MotifDetector};

/// Endgame ACPL above which technique is considered loose.
const ACPL_FLOOR: f64 = 30.0;
/// Endgame blunder rate below which the losses are imprecision, not blunders.
const BLUNDER_RATE_CEILING: f64 = 0.1;
const MIN_CPL: i32 = 20;

/// Steady small losses in endgames that are otherwise blunder-free.
pub struct EndgameTechniqueDetector;

impl MotifDetector for EndgameTechniqueDetector {
    fn name(&self) -> &'static str {
        "Endgame Technique"
    }

    fn description(&self) -> &'static str {
        "Imprecise endgame play without outright blunders."
    }

    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>> {
        let endgame: Vec<&'a MoveAnalysis> = analyses
            .iter()
            .filter(|a| a.is_player_move && a.phase == Phase::Endgame)
            .collect();
        if endgame.is_empty() {
            return Vec::new();
        }

        let n = endgame.len() as f64;
        let acpl = endgame.iter().map(|a| a.cpl as f64).sum::<f64>() / n;
        let blunders = endgame.iter().filter(|a| a.flag == MoveFlag::Blunder).count();
        if acpl <= ACPL_FLOOR || blunders as f64 / n >= BLUNDER_RATE_CEILING {
            return Vec::new();
        }

        endgame
            .into_iter()
            .filter(|a| a.cpl > MIN_CPL && a.flag != MoveFlag::Blunder)
            .map(Candidate::plain)
            .collect()
    }
}
