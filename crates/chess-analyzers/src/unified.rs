//! Runs every motif detector over one record set.

use chess_core::MoveAnalysis;
use tracing::debug;

use crate::analyzer_trait::MotifDetector;
use crate::analyzers;
use crate::summary::MotifBucket;

/// All detectors, in report order.
pub fn create_all_detectors() -> Vec<Box<dyn MotifDetector>> {
    vec![
        Box::new(analyzers::hanging_pieces::HangingPiecesDetector),
        Box::new(analyzers::missed_tactics::MissedTacticsDetector),
        Box::new(analyzers::ignored_threats::IgnoredThreatsDetector),
        Box::new(analyzers::king_safety::KingSafetyDetector),
        Box::new(analyzers::endgame_technique::EndgameTechniqueDetector),
        Box::new(analyzers::material_givebacks::MaterialGivebacksDetector),
    ]
}

/// Buckets with at least one candidate, in report order.
pub fn detect_motifs(analyses: &[MoveAnalysis]) -> Vec<MotifBucket> {
    create_all_detectors()
        .iter()
        .map(|detector| detector.detect(analyses))
        .filter(|bucket| {
            debug!(motif = %bucket.name, count = bucket.count, "Motif scan");
            bucket.count > 0
        })
        .collect()
}
