//! Fixed-size worker pool: one engine and one private position cache per worker,
//! games pulled from a shared queue, results streamed back over a channel.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chess_core::{MoveAnalysis, ParsedGame};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::analyzer::{analyze_game, log_progress, GameOutcome};
use crate::cache::{merge_position_caches, GameCache, PositionCache};
use crate::config::AnalysisConfig;
use crate::error::WorkerError;
use crate::stockfish::PositionEvaluator;

/// State owned by exactly one worker for the whole run.
pub struct WorkerContext {
    pub id: usize,
    pub config: Arc<AnalysisConfig>,
    pub cache: PositionCache,
    pub game_cache: Option<GameCache>,
}

impl WorkerContext {
    pub fn new(id: usize, config: Arc<AnalysisConfig>, cache: PositionCache) -> Self {
        let game_cache = config
            .game_cache
            .then(|| GameCache::new(config.game_cache_dir(), config.game_cache_tag()));
        Self {
            id,
            config,
            cache,
            game_cache,
        }
    }

    pub async fn analyze<E: PositionEvaluator>(
        &mut self,
        engine: &mut E,
        game: &ParsedGame,
    ) -> Result<GameOutcome, WorkerError> {
        analyze_game(
            engine,
            &self.config,
            &mut self.cache,
            self.game_cache.as_ref(),
            game,
        )
        .await
    }
}

/// A game that produced no records because its analysis failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFailure {
    pub game_id: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct PoolReport {
    /// Records in arrival order, plies in order within each game
    pub analyses: Vec<MoveAnalysis>,
    pub games_analyzed: usize,
    pub games_from_cache: usize,
    pub failures: Vec<GameFailure>,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl PoolReport {
    fn record(&mut self, game_id: &str, result: Result<GameOutcome, WorkerError>) {
        match result {
            Ok(outcome) => {
                self.games_analyzed += 1;
                self.games_from_cache += usize::from(outcome.from_game_cache);
                self.cache_hits += outcome.cache_hits;
                self.cache_misses += outcome.cache_misses;
                self.analyses.extend(outcome.analyses);
            }
            Err(e) => self.failures.push(GameFailure {
                game_id: game_id.to_string(),
                error: e.to_string(),
            }),
        }
    }
}

struct Finished {
    worker_id: usize,
    game: ParsedGame,
    result: Result<GameOutcome, WorkerError>,
}

/// Start up to `count` evaluators. Ones that fail to start are logged and
/// left out; only an empty pool is an error.
pub async fn spawn_engines<E, F, Fut>(count: usize, mut spawn: F) -> Result<Vec<E>, WorkerError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<E, WorkerError>>,
{
    let mut engines = Vec::with_capacity(count);
    for id in 0..count {
        match spawn(id).await {
            Ok(engine) => {
                info!(engine_id = id, "Engine ready");
                engines.push(engine);
            }
            Err(e) => warn!(engine_id = id, error = %e, "Engine failed to start"),
        }
    }
    if engines.is_empty() {
        return Err(WorkerError::Engine(format!(
            "none of {count} engines could be started"
        )));
    }
    if engines.len() < count {
        warn!(started = engines.len(), requested = count, "Running with a reduced pool");
    }
    Ok(engines)
}

/// Analyze every game with one worker per engine.
///
/// The engines are shut down before this returns. With a single engine or
/// `workers <= 1` the games run sequentially against the persistent cache.
pub async fn run_pool<E>(
    engines: Vec<E>,
    config: Arc<AnalysisConfig>,
    games: Vec<ParsedGame>,
) -> Result<PoolReport, WorkerError>
where
    E: PositionEvaluator + 'static,
{
    if engines.is_empty() {
        return Err(WorkerError::Config("no evaluators available".into()));
    }

    let persistent = if config.position_cache {
        PositionCache::load(&config.position_cache_path())?
    } else {
        PositionCache::in_memory()
    };

    let report = if config.workers <= 1 || engines.len() == 1 {
        run_sequential(engines, config.clone(), persistent, games).await
    } else {
        run_parallel(engines, config.clone(), persistent, games).await?
    };

    info!(
        games = report.games_analyzed,
        failed = report.failures.len(),
        positions = report.analyses.len(),
        cache_hits = report.cache_hits,
        cache_misses = report.cache_misses,
        "Analysis complete"
    );
    Ok(report)
}

async fn run_sequential<E: PositionEvaluator>(
    engines: Vec<E>,
    config: Arc<AnalysisConfig>,
    cache: PositionCache,
    games: Vec<ParsedGame>,
) -> PoolReport {
    let mut engines = engines.into_iter();
    let mut report = PoolReport::default();
    let Some(mut engine) = engines.next() else {
        return report;
    };
    // Surplus engines are not needed in sequential mode
    for mut spare in engines {
        spare.quit().await;
    }

    let mut ctx = WorkerContext::new(0, config, cache);
    let total = games.len();
    for (idx, game) in games.iter().enumerate() {
        let result = ctx.analyze(&mut engine, game).await;
        handle_result(&mut engine, ctx.id, idx + 1, total, game, &result).await;
        report.record(&game.game_id, result);
    }
    engine.quit().await;
    report
}

async fn run_parallel<E>(
    engines: Vec<E>,
    config: Arc<AnalysisConfig>,
    persistent: PositionCache,
    games: Vec<ParsedGame>,
) -> Result<PoolReport, WorkerError>
where
    E: PositionEvaluator + 'static,
{
    let scratch = tempfile::Builder::new().prefix("position-cache-").tempdir()?;
    let total = games.len();
    let queue = Arc::new(Mutex::new(games.into_iter().collect::<VecDeque<_>>()));
    let (tx, mut rx) = mpsc::channel::<Finished>(engines.len().max(1) * 2);

    let mut worker_files: Vec<PathBuf> = Vec::with_capacity(engines.len());
    let mut handles = Vec::with_capacity(engines.len());
    info!(workers = engines.len(), games = total, "Starting worker pool");

    for (id, mut engine) in engines.into_iter().enumerate() {
        let path = scratch.path().join(format!("cache_{id}.jsonl"));
        worker_files.push(path.clone());
        let cache = PositionCache::seeded(path, persistent.entries().clone());
        let mut ctx = WorkerContext::new(id, config.clone(), cache);
        let queue = queue.clone();
        let tx = tx.clone();
        // Game the worker holds; charged with the failure if the task panics
        let in_flight: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let slot = in_flight.clone();

        let handle = tokio::spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some(game) = next else { break };
                *slot.lock().await = Some(game.game_id.clone());
                let result = ctx.analyze(&mut engine, &game).await;
                if let Err(e) = &result {
                    if e.is_fatal_for_game() {
                        if let Err(re) = engine.recover().await {
                            error!(worker_id = ctx.id, error = %re, "Failed to restart engine");
                        }
                    }
                }
                let finished = Finished {
                    worker_id: ctx.id,
                    game,
                    result,
                };
                let sent = tx.send(finished).await;
                *slot.lock().await = None;
                if sent.is_err() {
                    break;
                }
            }
            engine.quit().await;
        });
        handles.push((id, handle, in_flight));
    }
    drop(tx);

    let mut report = PoolReport::default();
    let mut done = 0;
    while let Some(finished) = rx.recv().await {
        done += 1;
        match &finished.result {
            Ok(outcome) => log_progress(finished.worker_id, done, total, &finished.game, outcome),
            Err(e) => error!(
                worker_id = finished.worker_id,
                game_id = %finished.game.game_id,
                error = %e,
                "Game analysis failed"
            ),
        }
        report.record(&finished.game.game_id, finished.result);
    }

    for (worker_id, handle, in_flight) in handles {
        let Err(e) = handle.await else { continue };
        match in_flight.lock().await.take() {
            Some(game_id) => {
                error!(worker_id, game_id = %game_id, error = %e, "Worker task died mid-game");
                report.record(
                    &game_id,
                    Err(WorkerError::Worker(format!("worker {worker_id} died: {e}"))),
                );
            }
            None => warn!(worker_id, error = %e, "Worker task ended abnormally"),
        }
    }

    if config.position_cache {
        let added = merge_position_caches(&config.position_cache_path(), &worker_files)?;
        info!(added, "Merged worker caches into the persistent position cache");
    }
    Ok(report)
}

async fn handle_result<E: PositionEvaluator>(
    engine: &mut E,
    worker_id: usize,
    done: usize,
    total: usize,
    game: &ParsedGame,
    result: &Result<GameOutcome, WorkerError>,
) {
    match result {
        Ok(outcome) => log_progress(worker_id, done, total, game, outcome),
        Err(e) => {
            error!(worker_id, game_id = %game.game_id, error = %e, "Game analysis failed");
            if e.is_fatal_for_game() {
                if let Err(re) = engine.recover().await {
                    error!(worker_id, error = %re, "Failed to restart engine");
                }
            }
        }
    }
}
