//! Run configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::WorkerError;

/// Search limit handed to the evaluator for every position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBudget {
    Depth(u32),
    MoveTime(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub path: String,
    pub budget: SearchBudget,
    pub threads: u32,
    pub hash_mb: u32,
}

impl EngineSettings {
    /// Short hash identifying settings that change engine output.
    /// The binary path does not take part.
    pub fn fingerprint(&self) -> String {
        let (time_ms, depth) = match self.budget {
            SearchBudget::Depth(d) => ("none".to_string(), d.to_string()),
            SearchBudget::MoveTime(ms) => (ms.to_string(), "none".to_string()),
        };
        let raw = format!(
            "time_ms={time_ms}|depth={depth}|threads={}|hash_mb={}",
            self.threads, self.hash_mb
        );
        short_sha256(&raw)
    }
}

/// First 16 hex chars of SHA-256 over `raw`.
pub fn short_sha256(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(16);
    encoded
}

/// Centipawn-loss boundaries between move flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationThresholds {
    pub best: i32,
    pub inaccuracy: i32,
    pub mistake: i32,
    pub blunder: i32,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            best: 0,
            inaccuracy: 50,
            mistake: 100,
            blunder: 200,
        }
    }
}

impl ClassificationThresholds {
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.best < self.inaccuracy && self.inaccuracy < self.mistake && self.mistake < self.blunder
        {
            Ok(())
        } else {
            Err(WorkerError::Config(format!(
                "thresholds must be strictly increasing, got best={} inaccuracy={} mistake={} blunder={}",
                self.best, self.inaccuracy, self.mistake, self.blunder
            )))
        }
    }

    fn cache_tag(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.best, self.inaccuracy, self.mistake, self.blunder
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Account whose games are analyzed
    pub username: String,

    /// Input games, JSON lines or a JSON array
    pub games_path: PathBuf,

    pub output_dir: PathBuf,

    /// Persistent position cache and per-game cache live here
    pub cache_dir: PathBuf,

    pub engine: EngineSettings,

    /// Evaluate the opponent's moves as well
    pub both_sides: bool,

    pub workers: usize,

    pub thresholds: ClassificationThresholds,

    pub position_cache: bool,

    pub game_cache: bool,

    /// Number of swing moves kept in the summary
    pub swing_moves: usize,

    /// Analyze only this game (`latest`, `-N`, a game id or a game URL)
    #[serde(default)]
    pub single_game: Option<String>,
}

impl AnalysisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WorkerError> {
        let username = env::var("PLAYER_USERNAME")
            .map_err(|_| WorkerError::Config("PLAYER_USERNAME not set".into()))?;

        let games_path: PathBuf = env::var("GAMES_PATH")
            .map_err(|_| WorkerError::Config("GAMES_PATH not set".into()))?
            .into();

        let output_dir: PathBuf = env::var("OUTPUT_DIR").unwrap_or_else(|_| "out".into()).into();

        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| output_dir.join("cache"));

        let path = env::var("STOCKFISH_PATH")
            .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string());

        let depth: Option<u32> = parse_opt("ENGINE_DEPTH")?;
        let time_ms: Option<u32> = parse_opt("ENGINE_TIME_MS")?;
        let budget = match (depth, time_ms) {
            (Some(_), Some(_)) => {
                return Err(WorkerError::Config(
                    "ENGINE_DEPTH and ENGINE_TIME_MS are mutually exclusive".into(),
                ))
            }
            (Some(d), None) => SearchBudget::Depth(d),
            (None, Some(ms)) => SearchBudget::MoveTime(ms),
            (None, None) => SearchBudget::MoveTime(100),
        };

        let engine = EngineSettings {
            path,
            budget,
            threads: parse_or("ENGINE_THREADS", 1)?,
            hash_mb: parse_or("ENGINE_HASH_MB", 64)?,
        };

        let thresholds = ClassificationThresholds {
            best: 0,
            inaccuracy: parse_or("INACCURACY_THRESHOLD", 50)?,
            mistake: parse_or("MISTAKE_THRESHOLD", 100)?,
            blunder: parse_or("BLUNDER_THRESHOLD", 200)?,
        };

        let config = Self {
            username,
            games_path,
            output_dir,
            cache_dir,
            engine,
            both_sides: parse_flag("BOTH_SIDES", false)?,
            workers: parse_or("WORKERS", num_cpus::get())?,
            thresholds,
            position_cache: parse_flag("POSITION_CACHE", true)?,
            game_cache: parse_flag("GAME_CACHE", true)?,
            swing_moves: parse_or("SWING_MOVES", 10)?,
            single_game: env::var("SINGLE_GAME")
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty()),
        };
        config.validate()?;

        info!(
            username = %config.username,
            workers = config.workers,
            fingerprint = %config.engine.fingerprint(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Cross-field checks that a plain parse cannot express.
    pub fn validate(&self) -> Result<(), WorkerError> {
        self.thresholds.validate()?;
        match self.engine.budget {
            SearchBudget::Depth(0) | SearchBudget::MoveTime(0) => {
                return Err(WorkerError::Config("search budget must be non-zero".into()))
            }
            _ => {}
        }
        if self.username.trim().is_empty() {
            return Err(WorkerError::Config("PLAYER_USERNAME is empty".into()));
        }
        Ok(())
    }

    pub fn position_cache_path(&self) -> PathBuf {
        self.cache_dir.join("positions.jsonl")
    }

    pub fn game_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("games")
    }

    /// Everything besides the game id that decides a per-game cache entry.
    pub fn game_cache_tag(&self) -> String {
        format!(
            "{}|{}|{}",
            self.engine.fingerprint(),
            self.thresholds.cache_tag(),
            self.both_sides
        )
    }
}

fn parse_opt<T: FromStr>(name: &str) -> Result<Option<T>, WorkerError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WorkerError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(None),
    }
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T, WorkerError> {
    Ok(parse_opt(name)?.unwrap_or(default))
}

fn parse_flag(name: &str, default: bool) -> Result<bool, WorkerError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            "" => Ok(default),
            _ => Err(WorkerError::Config(format!("{name} has an invalid value: {raw}"))),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config(cache_dir: PathBuf) -> AnalysisConfig {
    AnalysisConfig {
        username: "tester".into(),
        games_path: PathBuf::from("games.jsonl"),
        output_dir: cache_dir.join("out"),
        cache_dir,
        engine: EngineSettings {
            path: "stockfish".into(),
            budget: SearchBudget::MoveTime(100),
            threads: 1,
            hash_mb: 64,
        },
        both_sides: false,
        workers: 1,
        thresholds: ClassificationThresholds::default(),
        position_cache: true,
        game_cache: true,
        swing_moves: 10,
        single_game: None,
    }
}
