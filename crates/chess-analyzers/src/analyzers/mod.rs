pub mod endgame_technique;
pub mod hanging_pieces;
pub mod ignored_threats;
pub mod king_safety;
pub mod material_givebacks;
pub mod missed_tactics;
