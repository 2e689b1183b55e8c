/// End-to-end runs of the analysis pipeline against a material-only evaluator:
/// orchestrator -> phase labels -> summary -> report files.
mod common;

use std::fs;
use std::sync::Arc;

use analysis_worker::output::{run_dir, write_run, RunMeta};
use analysis_worker::phase::label_phases;
use analysis_worker::pool::run_pool;
use chess_analyzers::compute_summary;
use chess_core::{MoveAnalysis, MoveFlag, ParsedGame, Phase, Side};
use chrono::Utc;
use common::{config, game, Greedy};
use tempfile::TempDir;

/// g1: the player (white) drops the queen with 2.Qg4?? Bxg4.
/// g2: the player (black) leaves e5 hanging by the evaluator's one-ply view.
fn games() -> Vec<ParsedGame> {
    vec![
        game("g1", Side::White, &["e4", "d5", "Qg4", "Bxg4"], &[180.0, 180.0, 170.0, 175.0]),
        game("g2", Side::Black, &["e4", "e5", "Nf3", "Nc6"], &[180.0, 178.0, 179.0, 160.0]),
    ]
}

fn sorted(mut analyses: Vec<MoveAnalysis>) -> Vec<MoveAnalysis> {
    analyses.sort_by(|a, b| (a.game_id.as_str(), a.ply).cmp(&(b.game_id.as_str(), b.ply)));
    analyses
}

#[tokio::test]
async fn test_pipeline_finds_dropped_queen() {
    let tmp = TempDir::new().unwrap();
    let config = Arc::new(config(tmp.path(), 2));

    let mut report = run_pool(vec![Greedy, Greedy], config.clone(), games())
        .await
        .unwrap();
    assert_eq!(report.games_analyzed, 2);
    assert!(report.failures.is_empty());

    label_phases(&mut report.analyses);
    let analyses = sorted(report.analyses.clone());
    let keys: Vec<(&str, u32)> = analyses.iter().map(|a| (a.game_id.as_str(), a.ply)).collect();
    assert_eq!(keys, vec![("g1", 1), ("g1", 3), ("g2", 2), ("g2", 4)]);
    assert!(analyses.iter().all(|a| a.cpl >= 0 && a.is_player_move));
    assert!(analyses.iter().all(|a| a.phase == Phase::Opening));

    let blunder = &analyses[1];
    assert_eq!(blunder.move_uci, "d1g4");
    assert_eq!(blunder.best_move_uci, "e4d5");
    assert_eq!(blunder.best_move_san, "exd5");
    assert_eq!(blunder.refutation.first().map(String::as_str), Some("c8g4"));
    assert_eq!(blunder.cpl, 1000);
    assert_eq!(blunder.flag, MoveFlag::Blunder);
    assert_eq!(blunder.clock_remaining, Some(170.0));

    // Black's evaluations are stored from black's side
    assert_eq!(analyses[3].cpl, 100);
    assert_eq!(analyses[3].flag, MoveFlag::Mistake);

    let games = games();
    let summary = compute_summary(&config.username, &report.analyses, &games, config.swing_moves);
    assert_eq!(summary.total_games, 2);
    assert_eq!(summary.total_moves, 4);
    assert_eq!(summary.phase_stats[0].blunders, 1);
    assert_eq!(summary.phase_stats[0].mistakes, 1);

    let names: Vec<&str> = summary.motifs.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Hanging Pieces", "Missed Tactics", "Ignored Threats"]);
    let hang = &summary.motifs[0].examples[0];
    assert_eq!(hang.subtype.as_deref(), Some("hang_en_prise"));
    assert_eq!(hang.meta["lost_piece_type"], "queen");
    assert_eq!(hang.meta["captured_by_piece_type"], "bishop");
    assert_eq!(hang.game_url, "https://example.org/g1");
    assert_eq!(
        summary.motifs[2].subtype_counts.get("allowed_forcing_capture"),
        Some(&1)
    );

    let swings: Vec<(&str, i32)> = summary
        .swing_moves
        .iter()
        .map(|s| (s.game_id.as_str(), s.cpl))
        .collect();
    assert_eq!(swings, vec![("g1", 1000), ("g2", 100)]);

    let rows: Vec<&str> = summary.game_summaries.iter().map(|g| g.game_id.as_str()).collect();
    assert_eq!(rows, vec!["g1", "g2"]);
    assert_eq!(summary.game_summaries[1].opponent, "rival");

    // 180+2: g1 think time 180-170+2, g2 178-160+2
    let time = summary.time_stats.as_ref().unwrap();
    assert_eq!(time.timed_moves, 2);
    assert_eq!(time.median_dt_s, 16.0);
    assert_eq!(time.blunder_rate_normal, 0.5);

    assert_eq!(summary.opening_acpl_white, Some(500.0));
    assert_eq!(summary.opening_acpl_black, Some(50.0));

    let meta = RunMeta::new(&config, Utc::now(), games.len(), &report, 0.1);
    let dir = write_run(&run_dir(&config, &meta.run_id), &report.analyses, &summary, &meta).unwrap();
    let moves = fs::read_to_string(dir.join("analysis/moves.jsonl")).unwrap();
    assert_eq!(moves.lines().count(), 4);
    let first: MoveAnalysis = serde_json::from_str(moves.lines().next().unwrap()).unwrap();
    assert!(first.cpl >= 0);
    let rows = fs::read_to_string(dir.join("analysis/games.jsonl")).unwrap();
    assert_eq!(rows.lines().count(), 2);
    assert!(dir.join("stats/summary.json").exists());
    assert!(dir.join("run.json").exists());
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let tmp = TempDir::new().unwrap();
    let config = Arc::new(config(tmp.path(), 2));

    let first = run_pool(vec![Greedy, Greedy], config.clone(), games())
        .await
        .unwrap();
    assert_eq!(first.cache_hits, 0);
    assert!(config.position_cache_path().exists());

    let second = run_pool(vec![Greedy, Greedy], config.clone(), games())
        .await
        .unwrap();
    assert_eq!(second.games_from_cache, 2);
    assert_eq!(second.cache_misses, 0);
    assert_eq!(sorted(first.analyses), sorted(second.analyses));
}

#[tokio::test]
async fn test_position_cache_alone_reproduces_records() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config(tmp.path(), 1);
    cfg.game_cache = false;
    let config = Arc::new(cfg);

    let first = run_pool(vec![Greedy], config.clone(), games()).await.unwrap();
    let second = run_pool(vec![Greedy], config.clone(), games()).await.unwrap();
    assert_eq!(second.games_from_cache, 0);
    assert_eq!(second.cache_misses, 0);
    assert_eq!(second.cache_hits, 4);
    assert_eq!(first.analyses, second.analyses);
}
