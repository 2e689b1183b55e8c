//! Base trait and types for motif detectors.

use std::collections::BTreeMap;

use chess_core::{BoardError, MoveAnalysis};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::summary::{MotifBucket, MotifExample};

/// Examples kept per bucket.
pub const MAX_EXAMPLES: usize = 3;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("no king for {0} on the board")]
    MissingKing(&'static str),
}

/// A record that matched a detector, with its ranking and optional subtype.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub record: &'a MoveAnalysis,
    pub severity: i32,
    pub subtype: Option<&'static str>,
    pub confidence: f64,
    pub meta: Map<String, Value>,
}

impl<'a> Candidate<'a> {
    /// Candidate ranked by its own centipawn loss, no subtype.
    pub fn plain(record: &'a MoveAnalysis) -> Self {
        Self {
            record,
            severity: record.cpl,
            subtype: None,
            confidence: 0.0,
            meta: Map::new(),
        }
    }

    pub fn with_severity(mut self, severity: i32) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_subtype(mut self, subtype: &'static str, confidence: f64) -> Self {
        self.subtype = Some(subtype);
        self.confidence = confidence;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    fn into_example(self) -> MotifExample {
        let r = self.record;
        MotifExample {
            game_id: r.game_id.clone(),
            ply: r.ply,
            fen: r.fen_before.clone(),
            move_san: r.move_san.clone(),
            best_move_san: r.best_move_san.clone(),
            severity: self.severity,
            cpl: r.cpl,
            pv: r.pv.clone(),
            game_url: String::new(),
            subtype: self.subtype.map(str::to_string),
            confidence: self.confidence,
            meta: self.meta,
        }
    }
}

/// Trait that all motif detectors implement.
pub trait MotifDetector {
    /// Display name of the bucket.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Every matching record, in discovery order.
    fn candidates<'a>(&self, analyses: &'a [MoveAnalysis]) -> Vec<Candidate<'a>>;

    fn detect(&self, analyses: &[MoveAnalysis]) -> MotifBucket {
        build_bucket(self.name(), self.description(), self.candidates(analyses))
    }
}

/// Run a fallible per-record probe over every record. Probe errors drop that
/// record only.
pub fn probe_each<'a, F>(name: &str, analyses: &'a [MoveAnalysis], mut probe: F) -> Vec<Candidate<'a>>
where
    F: FnMut(&'a MoveAnalysis) -> Result<Option<Candidate<'a>>, ProbeError>,
{
    let mut out = Vec::new();
    for record in analyses {
        match probe(record) {
            Ok(Some(candidate)) => out.push(candidate),
            Ok(None) => {}
            Err(e) => {
                debug!(
                    detector = name,
                    game_id = %record.game_id,
                    ply = record.ply,
                    error = %e,
                    "Dropping candidate"
                );
            }
        }
    }
    out
}

/// Rank candidates by severity (ties keep discovery order) and keep the top examples.
pub fn build_bucket(name: &str, description: &str, mut candidates: Vec<Candidate<'_>>) -> MotifBucket {
    candidates.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut subtype_counts = BTreeMap::new();
    for c in &candidates {
        if let Some(subtype) = c.subtype {
            *subtype_counts.entry(subtype.to_string()).or_insert(0) += 1;
        }
    }

    let count = candidates.len();
    let examples = candidates
        .into_iter()
        .take(MAX_EXAMPLES)
        .map(Candidate::into_example)
        .collect();

    MotifBucket {
        name: name.to_string(),
        description: description.to_string(),
        count,
        subtype_counts,
        examples,
    }
}
