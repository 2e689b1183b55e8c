//! Single-game mode: analyze one game from the input and compare it with the
//! player's latest full run.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chess_analyzers::{compute_single_game_stats, SingleGameSummary};
use chess_core::ParsedGame;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::WorkerError;
use crate::output::{load_historical_context, single_run_dir, write_single_game};
use crate::phase::label_phases;
use crate::pool::run_pool;
use crate::stockfish::PositionEvaluator;

/// Which input game to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSelector {
    /// Last game in the input
    Latest,
    /// `-N`: N-th game from the end, `-1` being the last
    Offset(usize),
    GameId(String),
}

impl FromStr for GameSelector {
    type Err = WorkerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("latest") {
            return Ok(GameSelector::Latest);
        }
        if raw.starts_with("https://") || raw.starts_with("http://") {
            let id = raw.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
            if id.is_empty() || id.contains(':') {
                return Err(WorkerError::Config(format!("no game id in URL: {raw}")));
            }
            return Ok(GameSelector::GameId(id.to_string()));
        }
        if let Some(digits) = raw.strip_prefix('-') {
            return digits
                .parse()
                .map(GameSelector::Offset)
                .map_err(|_| WorkerError::Config(format!("invalid game offset: {raw}")));
        }
        if raw.is_empty() {
            return Err(WorkerError::Config(
                "empty game selector; use 'latest', '-N', a game id or a URL".into(),
            ));
        }
        Ok(GameSelector::GameId(raw.to_string()))
    }
}

pub fn select_game<'a>(
    games: &'a [ParsedGame],
    selector: &GameSelector,
) -> Result<&'a ParsedGame, WorkerError> {
    match selector {
        GameSelector::Latest => games
            .last()
            .ok_or_else(|| WorkerError::Config("no games in the input".into())),
        GameSelector::Offset(n) => games
            .len()
            .checked_sub(*n)
            .filter(|_| *n > 0)
            .and_then(|idx| games.get(idx))
            .ok_or_else(|| {
                WorkerError::Config(format!(
                    "offset -{n} is out of range for {} games",
                    games.len()
                ))
            }),
        GameSelector::GameId(id) => games
            .iter()
            .find(|g| g.game_id == *id)
            .ok_or_else(|| WorkerError::Config(format!("game not found: {id}"))),
    }
}

/// Analyze `game` with one engine, label phases, load the baseline and write
/// the single-game report. Returns the report directory and the summary.
pub async fn run_single_game<E>(
    engine: E,
    config: Arc<AnalysisConfig>,
    game: ParsedGame,
    at: DateTime<Utc>,
) -> Result<(PathBuf, SingleGameSummary), WorkerError>
where
    E: PositionEvaluator + 'static,
{
    info!(
        game_id = %game.game_id,
        white = %game.white,
        black = %game.black,
        plies = game.moves_san.len(),
        "Single-game analysis"
    );

    let mut report = run_pool(vec![engine], config.clone(), vec![game.clone()]).await?;
    if let Some(failure) = report.failures.pop() {
        return Err(WorkerError::Analysis(format!(
            "game {} failed: {}",
            failure.game_id, failure.error
        )));
    }
    if report.analyses.is_empty() {
        return Err(WorkerError::Analysis(format!(
            "no moves analyzed for game {}",
            game.game_id
        )));
    }

    label_phases(&mut report.analyses);
    let historical = load_historical_context(&config);
    let summary = compute_single_game_stats(&report.analyses, &game, historical);

    let dir = write_single_game(
        &single_run_dir(&config, &game.game_id, at),
        &report.analyses,
        &summary,
    )?;
    Ok((dir, summary))
}
