use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Side of the board, serialized as `"white"` / `"black"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Bullet,
    Blitz,
    Rapid,
    Daily,
    Unknown,
}

impl TimeControl {
    pub const ALL: [TimeControl; 5] = [
        TimeControl::Bullet,
        TimeControl::Blitz,
        TimeControl::Rapid,
        TimeControl::Daily,
        TimeControl::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeControl::Bullet => "bullet",
            TimeControl::Blitz => "blitz",
            TimeControl::Rapid => "rapid",
            TimeControl::Daily => "daily",
            TimeControl::Unknown => "unknown",
        }
    }
}

/// Game result from the analyzed player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

/// A game as handed over by the parsing layer. Read-only inside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedGame {
    pub game_id: String,
    pub white: String,
    pub black: String,
    pub result: GameResult,
    #[serde(default)]
    pub date: String,
    /// Raw time control tag, e.g. "180+2" or "600"
    #[serde(default)]
    pub time_control_raw: String,
    pub time_control: TimeControl,
    #[serde(default = "default_rated")]
    pub rated: bool,
    pub player_color: Side,
    pub moves_san: Vec<String>,
    /// FEN after each ply (index 0 = after white's first move)
    #[serde(default)]
    pub fens: Vec<String>,
    /// Remaining clock in seconds after each ply, when the source recorded it
    #[serde(default)]
    pub clock_times: Vec<Option<f64>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub eco: String,
}

fn default_rated() -> bool {
    true
}

impl ParsedGame {
    pub fn player_name(&self) -> &str {
        match self.player_color {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn opponent_name(&self) -> &str {
        match self.player_color {
            Side::White => &self.black,
            Side::Black => &self.white,
        }
    }

    /// Remaining clock after the given 0-based ply index, if recorded.
    pub fn clock_after(&self, ply_index: usize) -> Option<f64> {
        self.clock_times.get(ply_index).copied().flatten()
    }

    /// Increment in seconds parsed from `time_control_raw` ("base+inc").
    /// Unparseable or missing increments count as 0.
    pub fn increment_seconds(&self) -> f64 {
        parse_time_control(&self.time_control_raw)
            .map(|(_, inc)| inc)
            .unwrap_or(0.0)
    }
}

/// Parse "300", "180+2" or "600+0" into (base, increment) seconds.
pub fn parse_time_control(raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    match raw.split_once('+') {
        Some((base, inc)) => Some((base.parse().ok()?, inc.parse().ok()?)),
        None => Some((raw.parse().ok()?, 0.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_control() {
        assert_eq!(parse_time_control("180+2"), Some((180.0, 2.0)));
        assert_eq!(parse_time_control("600"), Some((600.0, 0.0)));
        assert_eq!(parse_time_control("1/259200"), None);
        assert_eq!(parse_time_control(""), None);
    }

    #[test]
    fn test_parsed_game_from_json_defaults() {
        let json = r#"{
            "game_id": "g1",
            "white": "alice",
            "black": "bob",
            "result": "win",
            "time_control": "blitz",
            "player_color": "black",
            "moves_san": ["e4", "e5"]
        }"#;
        let game: ParsedGame = serde_json::from_str(json).unwrap();
        assert_eq!(game.player_name(), "bob");
        assert_eq!(game.opponent_name(), "alice");
        assert!(game.rated);
        assert_eq!(game.clock_after(0), None);
        assert_eq!(game.increment_seconds(), 0.0);
    }
}
