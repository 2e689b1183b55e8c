//! Engine-driven move analysis for one player's games.
//!
//! A pool of workers, each owning one engine process and one private position
//! cache, evaluates every ply and classifies it by centipawn loss. Results are
//! phase-labeled here and handed to `chess_analyzers` for aggregation. The
//! `single` module runs one selected game against the latest full run.

pub mod analysis;
pub mod analyzer;
pub mod cache;
pub mod config;
pub mod error;
pub mod output;
pub mod phase;
pub mod pool;
pub mod single;
pub mod stockfish;

pub use config::AnalysisConfig;
pub use error::WorkerError;
pub use stockfish::{EngineOutput, PositionEvaluator, StockfishEngine};
