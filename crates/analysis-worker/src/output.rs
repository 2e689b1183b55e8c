//! Input loading and run output files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chess_analyzers::{HistoricalContext, SingleGameSummary, Summary};
use chess_core::{MoveAnalysis, ParsedGame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, EngineSettings};
use crate::error::WorkerError;
use crate::pool::{GameFailure, PoolReport};

/// Read games from a JSON array or a JSON-lines file. Malformed lines are
/// skipped with a warning.
pub fn load_games(path: &Path) -> Result<Vec<ParsedGame>, WorkerError> {
    let raw = fs::read_to_string(path)?;
    let games = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw)?
    } else {
        let mut games = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ParsedGame>(line) {
                Ok(game) => games.push(game),
                Err(e) => warn!(line = idx + 1, error = %e, "Skipping malformed game"),
            }
        }
        games
    };
    info!(path = %path.display(), games = games.len(), "Games loaded");
    Ok(games)
}

/// Run identifier, `YYYYMMDD_HHMMSS`.
pub fn run_id(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Metadata written next to the reports as `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub username: String,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub games_supplied: usize,
    pub games_analyzed: usize,
    pub games_from_cache: usize,
    pub games_failed: usize,
    pub positions_analyzed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub duration_seconds: f64,
    pub engine: EngineSettings,
    pub fingerprint: String,
    pub failures: Vec<GameFailure>,
}

impl RunMeta {
    pub fn new(
        config: &AnalysisConfig,
        started: DateTime<Utc>,
        games_supplied: usize,
        report: &PoolReport,
        duration_seconds: f64,
    ) -> Self {
        Self {
            username: config.username.clone(),
            run_id: run_id(started),
            timestamp: started,
            games_supplied,
            games_analyzed: report.games_analyzed,
            games_from_cache: report.games_from_cache,
            games_failed: report.failures.len(),
            positions_analyzed: report.analyses.len(),
            cache_hits: report.cache_hits,
            cache_misses: report.cache_misses,
            duration_seconds,
            engine: config.engine.clone(),
            fingerprint: config.engine.fingerprint(),
            failures: report.failures.clone(),
        }
    }
}

/// `<output_dir>/<username>/<run_id>/`
pub fn run_dir(config: &AnalysisConfig, run_id: &str) -> PathBuf {
    config.output_dir.join(&config.username).join(run_id)
}

fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<(), WorkerError> {
    let mut out = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), WorkerError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write every report of a run and return the run directory.
pub fn write_run(
    dir: &Path,
    analyses: &[MoveAnalysis],
    summary: &Summary,
    meta: &RunMeta,
) -> Result<PathBuf, WorkerError> {
    let analysis_dir = dir.join("analysis");
    let stats_dir = dir.join("stats");
    fs::create_dir_all(&analysis_dir)?;
    fs::create_dir_all(&stats_dir)?;

    write_jsonl(&analysis_dir.join("moves.jsonl"), analyses)?;
    write_jsonl(&analysis_dir.join("games.jsonl"), &summary.game_summaries)?;
    write_json(&stats_dir.join("summary.json"), summary)?;
    write_json(&dir.join("run.json"), meta)?;

    info!(dir = %dir.display(), moves = analyses.len(), "Reports written");
    Ok(dir.to_path_buf())
}

/// Whether `name` looks like a full-run directory, `YYYYMMDD_HHMMSS`.
fn is_run_id(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 8 || b.is_ascii_digit())
}

/// Most recent full run of `username` under `output_dir`. Single-game
/// directories are not runs.
pub fn find_latest_run_dir(output_dir: &Path, username: &str) -> Option<PathBuf> {
    let user_dir = output_dir.join(username);
    let entries = match fs::read_dir(&user_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %user_dir.display(), error = %e, "No run directory");
            return None;
        }
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_run_id(name))
        .max()
        .map(|name| user_dir.join(name))
}

/// Baseline from the latest full run's `stats/summary.json`. Absent or
/// unreadable summaries give `None`.
pub fn load_historical_context(config: &AnalysisConfig) -> Option<HistoricalContext> {
    let Some(dir) = find_latest_run_dir(&config.output_dir, &config.username) else {
        info!(username = %config.username, "No earlier run to compare against");
        return None;
    };
    let path = dir.join("stats").join("summary.json");
    let parsed = fs::read_to_string(&path)
        .map_err(WorkerError::from)
        .and_then(|raw| serde_json::from_str::<HistoricalContext>(&raw).map_err(WorkerError::from));
    match parsed {
        Ok(mut context) => {
            context.run_id = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(
                run_id = %context.run_id,
                games = context.total_games,
                acpl = %format!("{:.1}", context.acpl),
                "Loaded historical context"
            );
            Some(context)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load historical summary");
            None
        }
    }
}

/// `<output_dir>/<username>/single_<game id prefix>_<run_id>/`
pub fn single_run_dir(config: &AnalysisConfig, game_id: &str, at: DateTime<Utc>) -> PathBuf {
    let prefix: String = game_id.chars().take(8).collect();
    config
        .output_dir
        .join(&config.username)
        .join(format!("single_{prefix}_{}", run_id(at)))
}

/// Write a single-game analysis and return its directory.
pub fn write_single_game(
    dir: &Path,
    analyses: &[MoveAnalysis],
    summary: &SingleGameSummary,
) -> Result<PathBuf, WorkerError> {
    fs::create_dir_all(dir)?;
    write_jsonl(&dir.join("moves.jsonl"), analyses)?;
    write_json(&dir.join("summary.json"), summary)?;
    info!(dir = %dir.display(), moves = analyses.len(), "Single-game report written");
    Ok(dir.to_path_buf())
}
