//! Weakness analysis run
//!
//! Evaluates every move of a player's games with a pool of native Stockfish
//! processes, then writes per-move records, per-game summaries and the
//! aggregated weakness report. With `SINGLE_GAME` set, only the selected game
//! is analyzed and compared with the player's latest run.

use std::sync::Arc;
use std::time::Instant;

use analysis_worker::config::AnalysisConfig;
use analysis_worker::output::{load_games, run_dir, write_run, RunMeta};
use analysis_worker::phase::label_phases;
use analysis_worker::pool::{run_pool, spawn_engines};
use analysis_worker::single::{run_single_game, select_game, GameSelector};
use analysis_worker::stockfish::StockfishEngine;
use chess_analyzers::compute_summary;
use chess_core::ParsedGame;
use chrono::Utc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let config = Arc::new(AnalysisConfig::from_env()?);
    let games = load_games(&config.games_path)?;

    match config.single_game.as_deref() {
        Some(selector) => single_game(config.clone(), &games, selector).await,
        None => full_run(config, games).await,
    }
}

async fn single_game(
    config: Arc<AnalysisConfig>,
    games: &[ParsedGame],
    selector: &str,
) -> anyhow::Result<()> {
    let selector: GameSelector = selector.parse()?;
    let game = select_game(games, &selector)?.clone();

    let clock = Instant::now();
    let engine = StockfishEngine::new(&config.engine).await?;
    let (dir, summary) = run_single_game(engine, config, game, Utc::now()).await?;

    info!(
        game_id = %summary.game.game_id,
        acpl = %format!("{:.1}", summary.game.acpl),
        verdict = ?summary.comparison.as_ref().map(|c| c.verdict),
        dir = %dir.display(),
        duration_s = clock.elapsed().as_secs_f64(),
        "Single-game analysis complete"
    );
    Ok(())
}

async fn full_run(config: Arc<AnalysisConfig>, games: Vec<ParsedGame>) -> anyhow::Result<()> {
    if games.is_empty() {
        warn!(path = %config.games_path.display(), "No games to analyze");
    }

    let started = Utc::now();
    let clock = Instant::now();

    // One Stockfish process per worker, never more than there are games
    let num_workers = config.workers.clamp(1, games.len().max(1));
    info!(num_workers, "Creating Stockfish engine pool");
    let engines = spawn_engines(num_workers, |_| StockfishEngine::new(&config.engine)).await?;

    let mut report = run_pool(engines, config.clone(), games.clone()).await?;
    for failure in &report.failures {
        warn!(game_id = %failure.game_id, error = %failure.error, "Game skipped");
    }

    label_phases(&mut report.analyses);
    let summary = compute_summary(
        &config.username,
        &report.analyses,
        &games,
        config.swing_moves,
    );

    let meta = RunMeta::new(
        &config,
        started,
        games.len(),
        &report,
        clock.elapsed().as_secs_f64(),
    );
    let dir = write_run(
        &run_dir(&config, &meta.run_id),
        &report.analyses,
        &summary,
        &meta,
    )?;

    info!(
        run_id = %meta.run_id,
        dir = %dir.display(),
        games = meta.games_analyzed,
        failed = meta.games_failed,
        duration_s = meta.duration_seconds,
        "Run complete"
    );
    Ok(())
}
