//! Thin helpers over shakmaty used by the worker and the motif detectors.

use std::str::FromStr;

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{
    attacks, Bitboard, Board, CastlingMode, Chess, Color, EnPassantMode, File, Move, Position,
    Rank, Role, Square,
};
use thiserror::Error;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid FEN {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("invalid SAN {san:?}: {reason}")]
    InvalidSan { san: String, reason: String },

    #[error("invalid UCI move {uci:?}: {reason}")]
    InvalidUci { uci: String, reason: String },
}

pub fn parse_fen(fen: &str) -> Result<Chess, BoardError> {
    let invalid = |reason: String| BoardError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Resolve a SAN token (annotations like `!?` tolerated) against `pos`.
pub fn parse_san_move(pos: &Chess, san: &str) -> Result<Move, BoardError> {
    let invalid = |reason: String| BoardError::InvalidSan {
        san: san.to_string(),
        reason,
    };
    let cleaned = san.trim().trim_end_matches(['!', '?']);
    let parsed = SanPlus::from_str(cleaned).map_err(|e| invalid(format!("{e}")))?;
    parsed.san.to_move(pos).map_err(|e| invalid(format!("{e}")))
}

pub fn parse_uci_move(pos: &Chess, uci: &str) -> Result<Move, BoardError> {
    let invalid = |reason: String| BoardError::InvalidUci {
        uci: uci.to_string(),
        reason,
    };
    let parsed = UciMove::from_str(uci.trim()).map_err(|e| invalid(format!("{e}")))?;
    parsed.to_move(pos).map_err(|e| invalid(format!("{e}")))
}

pub fn move_to_uci(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

pub fn move_to_san(pos: &Chess, mv: &Move) -> String {
    San::from_move(pos, *mv).to_string()
}

/// Convert a UCI move string to SAN in the given position.
pub fn uci_to_san(pos: &Chess, uci: &str) -> Result<String, BoardError> {
    let mv = parse_uci_move(pos, uci)?;
    Ok(move_to_san(pos, &mv))
}

/// Conventional piece value; the king counts as 0.
pub fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

/// The position after `mv`.
pub fn play(pos: &Chess, mv: &Move) -> Chess {
    let mut next = pos.clone();
    next.play_unchecked(*mv);
    next
}

pub fn gives_check(pos: &Chess, mv: &Move) -> bool {
    play(pos, mv).is_check()
}

/// Role removed by `mv`, including en passant.
pub fn captured_role(mv: &Move) -> Option<Role> {
    mv.capture()
}

/// Combined knight, bishop, rook and queen value for both sides.
pub fn non_pawn_material(board: &Board) -> i32 {
    [Role::Knight, Role::Bishop, Role::Rook, Role::Queen]
        .into_iter()
        .map(|role| board.by_role(role).count() as i32 * piece_value(role))
        .sum()
}

const WHITE_MINOR_HOMES: [Square; 4] = [Square::B1, Square::C1, Square::F1, Square::G1];
const BLACK_MINOR_HOMES: [Square; 4] = [Square::B8, Square::C8, Square::F8, Square::G8];

/// Number of minor-piece home squares no longer holding one of `color`'s minors.
pub fn developed_minors(board: &Board, color: Color) -> u32 {
    let homes = match color {
        Color::White => WHITE_MINOR_HOMES,
        Color::Black => BLACK_MINOR_HOMES,
    };
    let at_home = homes
        .iter()
        .filter(|&&sq| {
            board.piece_at(sq).is_some_and(|p| {
                p.color == color && matches!(p.role, Role::Knight | Role::Bishop)
            })
        })
        .count() as u32;
    4 - at_home
}

/// Enemy queens, rooks and king a knight on `sq` would attack.
pub fn knight_fork_targets(board: &Board, sq: Square, attacker: Color) -> Bitboard {
    let targets = board.by_color(!attacker)
        & (board.by_role(Role::Queen) | board.by_role(Role::Rook) | board.by_role(Role::King));
    attacks::knight_attacks(sq) & targets
}

/// Distance of `sq` from `color`'s back rank, 0 = back rank.
pub fn relative_rank(sq: Square, color: Color) -> u32 {
    let rank = sq.rank() as u32;
    match color {
        Color::White => rank,
        Color::Black => 7 - rank,
    }
}

/// Squares directly in front of the king on files king-1..=king+1.
pub fn king_shield_squares(king: Square, color: Color) -> Bitboard {
    let forward: i32 = match color {
        Color::White => 1,
        Color::Black => -1,
    };
    let rank = sq_rank(king) + forward;
    let mut shield = Bitboard::EMPTY;
    if !(0..8).contains(&rank) {
        return shield;
    }
    for df in -1..=1 {
        let file = sq_file(king) + df;
        if (0..8).contains(&file) {
            shield.add(Square::from_coords(File::new(file as u32), Rank::new(rank as u32)));
        }
    }
    shield
}

/// Own pawns standing on the king's shield squares. The shield spans one
/// rank, so each pawn sits on a distinct file.
pub fn shield_pawn_files(board: &Board, king: Square, color: Color) -> u32 {
    let pawns = board.by_color(color) & board.by_role(Role::Pawn);
    (king_shield_squares(king, color) & pawns).count() as u32
}

fn sq_file(sq: Square) -> i32 {
    sq.file() as i32
}

fn sq_rank(sq: Square) -> i32 {
    sq.rank() as i32
}

pub fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}
