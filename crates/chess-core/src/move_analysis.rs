//! Per-move analysis record and the evaluation / severity types it carries.

use serde::{Deserialize, Serialize};

use crate::game_data::Side;

/// Mates are projected to this many centipawns for arithmetic.
pub const MATE_CLAMP_CP: i32 = 1500;

/// Engine evaluation: either centipawns or a mate distance, never both.
///
/// Serialized as `{"cp": 35}` or `{"mate": -3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Evaluation {
    Cp(i32),
    Mate(i32),
}

impl Default for Evaluation {
    fn default() -> Self {
        Evaluation::Cp(0)
    }
}

impl Evaluation {
    pub fn is_mate(&self) -> bool {
        matches!(self, Evaluation::Mate(_))
    }

    pub fn mate(&self) -> Option<i32> {
        match self {
            Evaluation::Mate(m) => Some(*m),
            Evaluation::Cp(_) => None,
        }
    }

    /// Centipawn projection with mates at ±1500.
    pub fn clamped_cp(&self) -> i32 {
        match *self {
            Evaluation::Mate(m) if m > 0 => MATE_CLAMP_CP,
            Evaluation::Mate(_) => -MATE_CLAMP_CP,
            Evaluation::Cp(cp) => cp.clamp(-MATE_CLAMP_CP, MATE_CLAMP_CP),
        }
    }

    pub fn negate(self) -> Evaluation {
        match self {
            Evaluation::Cp(cp) => Evaluation::Cp(-cp),
            Evaluation::Mate(m) => Evaluation::Mate(-m),
        }
    }

    /// Re-express a white-perspective evaluation from `side`'s point of view.
    pub fn from_white_for(self, side: Side) -> Evaluation {
        match side {
            Side::White => self,
            Side::Black => self.negate(),
        }
    }

    /// True when this is a mate in favour of the perspective holder.
    pub fn is_winning_mate(&self) -> bool {
        matches!(self, Evaluation::Mate(m) if *m > 0)
    }

    /// True when this is a mate against the perspective holder.
    pub fn is_losing_mate(&self) -> bool {
        matches!(self, Evaluation::Mate(m) if *m < 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveFlag {
    Best,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

/// Game phase. Ordering matters: phases only ever advance within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Opening,
    #[default]
    Middlegame,
    Endgame,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Opening, Phase::Middlegame, Phase::Endgame];

    pub fn ordinal(self) -> u8 {
        match self {
            Phase::Opening => 0,
            Phase::Middlegame => 1,
            Phase::Endgame => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Middlegame => "middlegame",
            Phase::Endgame => "endgame",
        }
    }
}

/// One evaluated ply.
///
/// Evaluations are from the analyzed player's perspective; `cpl` is from the
/// mover's perspective and never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    pub game_id: String,
    /// 1-indexed half-move number
    pub ply: u32,
    pub move_san: String,
    pub move_uci: String,
    pub fen_before: String,
    pub side_to_move: Side,
    pub eval_before: Evaluation,
    pub best_move_uci: String,
    pub best_move_san: String,
    pub eval_best: Evaluation,
    pub eval_after: Evaluation,
    pub cpl: i32,
    pub flag: MoveFlag,
    /// Best line from the position before the move
    pub pv: Vec<String>,
    /// Best line for the opponent after the move actually played
    #[serde(default)]
    pub refutation: Vec<String>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default = "default_true")]
    pub is_player_move: bool,
    /// Remaining clock (seconds) after this move
    #[serde(default)]
    pub clock_remaining: Option<f64>,
}

fn default_true() -> bool {
    true
}

impl MoveAnalysis {
    /// The side whose perspective the evaluations are expressed in.
    pub fn perspective(&self) -> Side {
        if self.is_player_move {
            self.side_to_move
        } else {
            self.side_to_move.opposite()
        }
    }

    /// 1-based full-move number, as written in a score sheet.
    pub fn move_number(&self) -> u32 {
        self.ply.div_ceil(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_cp() {
        assert_eq!(Evaluation::Cp(35).clamped_cp(), 35);
        assert_eq!(Evaluation::Cp(4000).clamped_cp(), 1500);
        assert_eq!(Evaluation::Cp(-4000).clamped_cp(), -1500);
        assert_eq!(Evaluation::Mate(3).clamped_cp(), 1500);
        assert_eq!(Evaluation::Mate(-2).clamped_cp(), -1500);
    }

    #[test]
    fn test_perspective_flip() {
        assert_eq!(Evaluation::Cp(50).from_white_for(Side::Black), Evaluation::Cp(-50));
        assert_eq!(Evaluation::Mate(2).from_white_for(Side::Black), Evaluation::Mate(-2));
        assert_eq!(Evaluation::Mate(2).from_white_for(Side::White), Evaluation::Mate(2));
    }

    #[test]
    fn test_evaluation_json_shape() {
        assert_eq!(serde_json::to_string(&Evaluation::Cp(20)).unwrap(), r#"{"cp":20}"#);
        assert_eq!(serde_json::to_string(&Evaluation::Mate(-3)).unwrap(), r#"{"mate":-3}"#);
        let parsed: Evaluation = serde_json::from_str(r#"{"mate":4}"#).unwrap();
        assert_eq!(parsed, Evaluation::Mate(4));
    }

    #[test]
    fn test_phase_order() {
        assert!(Phase::Opening < Phase::Middlegame);
        assert!(Phase::Middlegame < Phase::Endgame);
        assert_eq!(Phase::Endgame.ordinal(), 2);
    }

    #[test]
    fn test_move_number() {
        let mut record = sample();
        record.ply = 1;
        assert_eq!(record.move_number(), 1);
        record.ply = 2;
        assert_eq!(record.move_number(), 1);
        record.ply = 3;
        assert_eq!(record.move_number(), 2);
    }

    #[test]
    fn test_perspective_of_opponent_move() {
        let mut record = sample();
        record.side_to_move = Side::Black;
        record.is_player_move = false;
        assert_eq!(record.perspective(), Side::White);
    }

    fn sample() -> MoveAnalysis {
        MoveAnalysis {
            game_id: "g".into(),
            ply: 1,
            move_san: "e4".into(),
            move_uci: "e2e4".into(),
            fen_before: crate::board::START_FEN.into(),
            side_to_move: Side::White,
            eval_before: Evaluation::Cp(20),
            best_move_uci: "e2e4".into(),
            best_move_san: "e4".into(),
            eval_best: Evaluation::Cp(20),
            eval_after: Evaluation::Cp(20),
            cpl: 0,
            flag: MoveFlag::Best,
            pv: vec!["e2e4".into()],
            refutation: vec![],
            phase: Phase::Opening,
            is_player_move: true,
            clock_remaining: None,
        }
    }
}
