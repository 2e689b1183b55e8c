//! Worker error types

use chess_core::BoardError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine process died or its pipes broke. Fatal for the current game.
    #[error("Stockfish error: {0}")]
    Engine(String),

    /// A single ply could not be analyzed. The ply is skipped.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A worker task stopped without reporting its game.
    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    /// Whether this error invalidates the rest of the game.
    pub fn is_fatal_for_game(&self) -> bool {
        matches!(self, WorkerError::Engine(_) | WorkerError::Io(_))
    }
}
