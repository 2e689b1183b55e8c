pub mod board;
pub mod game_data;
pub mod move_analysis;

pub use board::BoardError;
pub use game_data::{GameResult, ParsedGame, Side, TimeControl};
pub use move_analysis::{Evaluation, MoveAnalysis, MoveFlag, Phase};
