/// Move classification: pure functions only
/// (No Board/Cache/Engine/Game dependencies)
use chess_core::{Evaluation, MoveFlag, Side};

use crate::config::ClassificationThresholds;

/// Map a centipawn loss onto a flag.
pub fn classify(cpl: i32, thresholds: &ClassificationThresholds) -> MoveFlag {
    if cpl <= thresholds.best {
        MoveFlag::Best
    } else if cpl < thresholds.inaccuracy {
        MoveFlag::Good
    } else if cpl < thresholds.mistake {
        MoveFlag::Inaccuracy
    } else if cpl < thresholds.blunder {
        MoveFlag::Mistake
    } else {
        MoveFlag::Blunder
    }
}

/// Centipawn loss of a move, both evaluations from the mover's perspective.
pub fn centipawn_loss(eval_best: Evaluation, eval_after: Evaluation) -> i32 {
    (eval_best.clamped_cp() - eval_after.clamped_cp()).max(0)
}

/// Loss for a move whose evaluations are stored from `perspective`'s side.
pub fn centipawn_loss_for_mover(
    eval_best: Evaluation,
    eval_after: Evaluation,
    perspective: Side,
    mover: Side,
) -> i32 {
    if perspective == mover {
        centipawn_loss(eval_best, eval_after)
    } else {
        centipawn_loss(eval_best.negate(), eval_after.negate())
    }
}
