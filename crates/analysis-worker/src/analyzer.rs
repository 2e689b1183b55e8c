//! Per-game analysis: replay the moves, consult the caches, drive the engine
//! and turn its output into `MoveAnalysis` records.

use chess_core::board::{move_to_san, move_to_uci, parse_fen, parse_san_move, play, to_fen, uci_to_san};
use chess_core::{Evaluation, MoveAnalysis, ParsedGame, Side};
use shakmaty::{Chess, Move, Position};
use tracing::{debug, info, warn};

use crate::analysis::{centipawn_loss_for_mover, classify};
use crate::cache::{position_key, GameCache, PositionCache};
use crate::config::AnalysisConfig;
use crate::error::WorkerError;
use crate::stockfish::PositionEvaluator;

/// Records produced for one game plus cache accounting.
#[derive(Debug, Default)]
pub struct GameOutcome {
    pub analyses: Vec<MoveAnalysis>,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// The whole game came from the per-game cache
    pub from_game_cache: bool,
}

/// Engine-dependent facts about the position before a move.
struct PreMove {
    eval: Evaluation,
    best_move_uci: String,
    best_move_san: String,
    pv: Vec<String>,
}

/// Everything about one ply that does not come from the engine.
struct PlyInput<'a> {
    game: &'a ParsedGame,
    ply: u32,
    san: &'a str,
    mv: &'a Move,
    before: &'a Chess,
    fen_before: String,
    side_to_move: Side,
    clock_remaining: Option<f64>,
}

impl PlyInput<'_> {
    fn is_player_move(&self) -> bool {
        self.side_to_move == self.game.player_color
    }
}

/// Analyze one game.
///
/// Engine I/O failures abort the game and are returned; a ply the engine
/// cannot score is skipped with a warning.
pub async fn analyze_game<E: PositionEvaluator>(
    engine: &mut E,
    config: &AnalysisConfig,
    position_cache: &mut PositionCache,
    game_cache: Option<&GameCache>,
    game: &ParsedGame,
) -> Result<GameOutcome, WorkerError> {
    if let Some(cached) = game_cache.and_then(|c| c.load(&game.game_id)) {
        debug!(game_id = %game.game_id, records = cached.len(), "Game cache hit");
        return Ok(GameOutcome {
            analyses: cached,
            from_game_cache: true,
            ..GameOutcome::default()
        });
    }

    let fingerprint = config.engine.fingerprint();
    let mut outcome = GameOutcome::default();
    let mut tracker = Chess::default();

    for (i, san) in game.moves_san.iter().enumerate() {
        let ply = i as u32 + 1;
        let side_to_move = if ply % 2 == 1 { Side::White } else { Side::Black };
        let fen_before = to_fen(&tracker);

        let mv = match parse_san_move(&tracker, san) {
            Ok(mv) => mv,
            Err(e) => {
                warn!(game_id = %game.game_id, ply, error = %e, "Skipping unplayable move");
                if let Some(synced) = game.fens.get(i).and_then(|fen| parse_fen(fen).ok()) {
                    tracker = synced;
                }
                continue;
            }
        };

        let input = PlyInput {
            game,
            ply,
            san,
            mv: &mv,
            before: &tracker,
            fen_before,
            side_to_move,
            clock_remaining: game.clock_after(i),
        };

        if config.both_sides || input.is_player_move() {
            let key = position_key(&input.fen_before, &fingerprint);
            match analyze_ply(engine, config, position_cache, &key, &input, &mut outcome).await {
                Ok(record) => outcome.analyses.push(record),
                Err(e) if e.is_fatal_for_game() => return Err(e),
                Err(e) => {
                    warn!(game_id = %game.game_id, ply, error = %e, "Skipping ply");
                }
            }
        }

        tracker.play_unchecked(mv);
    }

    if let Some(cache) = game_cache {
        if !outcome.analyses.is_empty() {
            if let Err(e) = cache.store(&game.game_id, &outcome.analyses) {
                warn!(game_id = %game.game_id, error = %e, "Failed to write game cache");
            }
        }
    }

    Ok(outcome)
}

async fn analyze_ply<E: PositionEvaluator>(
    engine: &mut E,
    config: &AnalysisConfig,
    position_cache: &mut PositionCache,
    key: &str,
    input: &PlyInput<'_>,
    outcome: &mut GameOutcome,
) -> Result<MoveAnalysis, WorkerError> {
    let perspective = input.game.player_color;
    let move_uci = move_to_uci(input.mv);

    let cached = if config.position_cache {
        position_cache.get(key).cloned()
    } else {
        None
    };

    let pre = match cached {
        Some(hit) if hit.move_uci == move_uci => {
            outcome.cache_hits += 1;
            return Ok(reuse_cached(config, &hit, input, perspective));
        }
        Some(other_move) => {
            let flip = |e: Evaluation| reorient(e, other_move.perspective(), perspective);
            PreMove {
                eval: flip(other_move.eval_before),
                best_move_uci: other_move.best_move_uci.clone(),
                best_move_san: other_move.best_move_san.clone(),
                pv: other_move.pv.clone(),
            }
        }
        None => search_before(engine, config, input, perspective).await?,
    };
    outcome.cache_misses += 1;

    let after = play(input.before, input.mv);
    let (eval_after, refutation, cpl) = if after.is_checkmate() {
        (pre.eval, Vec::new(), 0)
    } else {
        let (eval_after, refutation) = if after.is_stalemate() {
            (Evaluation::Cp(0), Vec::new())
        } else {
            let out = engine.evaluate(&to_fen(&after), config.engine.budget).await?;
            (out.eval.from_white_for(perspective), out.pv)
        };
        let cpl = centipawn_loss_for_mover(pre.eval, eval_after, perspective, input.side_to_move);
        (eval_after, refutation, cpl)
    };

    let record = MoveAnalysis {
        game_id: input.game.game_id.clone(),
        ply: input.ply,
        move_san: input.san.to_string(),
        move_uci,
        fen_before: input.fen_before.clone(),
        side_to_move: input.side_to_move,
        eval_before: pre.eval,
        best_move_uci: pre.best_move_uci,
        best_move_san: pre.best_move_san,
        eval_best: pre.eval,
        eval_after,
        cpl,
        flag: classify(cpl, &config.thresholds),
        pv: pre.pv,
        refutation,
        phase: Default::default(),
        is_player_move: input.is_player_move(),
        clock_remaining: input.clock_remaining,
    };

    if config.position_cache {
        if let Err(e) = position_cache.insert(key.to_string(), record.clone()) {
            warn!(game_id = %record.game_id, ply = record.ply, error = %e, "Failed to write position cache");
        }
    }
    Ok(record)
}

async fn search_before<E: PositionEvaluator>(
    engine: &mut E,
    config: &AnalysisConfig,
    input: &PlyInput<'_>,
    perspective: Side,
) -> Result<PreMove, WorkerError> {
    let out = engine.evaluate(&input.fen_before, config.engine.budget).await?;
    let best_move_uci = out.best_move.ok_or_else(|| {
        WorkerError::Analysis(format!("no best move for {}", input.fen_before))
    })?;
    let best_move_san = uci_to_san(input.before, &best_move_uci).unwrap_or_else(|_| best_move_uci.clone());
    Ok(PreMove {
        eval: out.eval.from_white_for(perspective),
        best_move_uci,
        best_move_san,
        pv: out.pv,
    })
}

/// Build this game's record from a cached search of the same move.
fn reuse_cached(
    config: &AnalysisConfig,
    hit: &MoveAnalysis,
    input: &PlyInput<'_>,
    perspective: Side,
) -> MoveAnalysis {
    let from = hit.perspective();
    MoveAnalysis {
        game_id: input.game.game_id.clone(),
        ply: input.ply,
        move_san: move_to_san(input.before, input.mv),
        move_uci: hit.move_uci.clone(),
        fen_before: input.fen_before.clone(),
        side_to_move: input.side_to_move,
        eval_before: reorient(hit.eval_before, from, perspective),
        best_move_uci: hit.best_move_uci.clone(),
        best_move_san: hit.best_move_san.clone(),
        eval_best: reorient(hit.eval_best, from, perspective),
        eval_after: reorient(hit.eval_after, from, perspective),
        cpl: hit.cpl,
        flag: classify(hit.cpl, &config.thresholds),
        pv: hit.pv.clone(),
        refutation: hit.refutation.clone(),
        phase: Default::default(),
        is_player_move: input.is_player_move(),
        clock_remaining: input.clock_remaining,
    }
}

fn reorient(eval: Evaluation, from: Side, to: Side) -> Evaluation {
    if from == to {
        eval
    } else {
        eval.negate()
    }
}

/// Log line emitted after each finished game.
pub fn log_progress(worker_id: usize, done: usize, total: usize, game: &ParsedGame, outcome: &GameOutcome) {
    info!(
        worker_id,
        game_id = %game.game_id,
        progress = %format!("{done}/{total}"),
        plies = game.moves_san.len(),
        records = outcome.analyses.len(),
        cache_hits = outcome.cache_hits,
        cache_misses = outcome.cache_misses,
        from_game_cache = outcome.from_game_cache,
        "Game analyzed"
    );
}
