//! Turns per-move records into the player's summary statistics.

use std::collections::{HashMap, HashSet};

use chess_core::{MoveAnalysis, MoveFlag, ParsedGame, Phase, Side, TimeControl};
use tracing::info;

use crate::summary::{
    GameSummary, MotifBucket, PhaseStats, Summary, SwingMove, TimeControlStats,
};
use crate::time_usage::compute_time_stats;
use crate::unified::detect_motifs;

pub const DEFAULT_SWING_MOVES: usize = 10;

/// Running severity tallies over a set of moves.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    moves: usize,
    total_cpl: i64,
    blunders: usize,
    mistakes: usize,
    inaccuracies: usize,
}

impl Tally {
    fn add(&mut self, a: &MoveAnalysis) {
        self.moves += 1;
        self.total_cpl += a.cpl as i64;
        match a.flag {
            MoveFlag::Blunder => self.blunders += 1,
            MoveFlag::Mistake => self.mistakes += 1,
            MoveFlag::Inaccuracy => self.inaccuracies += 1,
            MoveFlag::Best | MoveFlag::Good => {}
        }
    }

    fn acpl(&self) -> f64 {
        if self.moves == 0 {
            0.0
        } else {
            self.total_cpl as f64 / self.moves as f64
        }
    }

    fn per_100(&self, count: usize) -> f64 {
        if self.moves == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.moves as f64
        }
    }
}

fn player_moves(analyses: &[MoveAnalysis]) -> impl Iterator<Item = &MoveAnalysis> {
    analyses.iter().filter(|a| a.is_player_move)
}

/// Stats for every phase, zeroed where the player made no moves.
pub fn compute_phase_stats(analyses: &[MoveAnalysis]) -> Vec<PhaseStats> {
    Phase::ALL
        .iter()
        .map(|&phase| {
            let mut tally = Tally::default();
            player_moves(analyses)
                .filter(|a| a.phase == phase)
                .for_each(|a| tally.add(a));
            PhaseStats {
                phase,
                total_moves: tally.moves,
                acpl: tally.acpl(),
                blunders: tally.blunders,
                mistakes: tally.mistakes,
                inaccuracies: tally.inaccuracies,
                blunders_per_100: tally.per_100(tally.blunders),
                mistakes_per_100: tally.per_100(tally.mistakes),
                inaccuracies_per_100: tally.per_100(tally.inaccuracies),
            }
        })
        .collect()
}

/// Stats per time-control category that has at least one player move.
/// Moves of games missing from `games` count as [`TimeControl::Unknown`].
pub fn compute_time_control_stats(
    analyses: &[MoveAnalysis],
    games: &[ParsedGame],
) -> Vec<TimeControlStats> {
    let tc_of: HashMap<&str, TimeControl> = games
        .iter()
        .map(|g| (g.game_id.as_str(), g.time_control))
        .collect();

    let mut tallies: HashMap<TimeControl, (Tally, HashSet<&str>)> = HashMap::new();
    for a in player_moves(analyses) {
        let tc = tc_of
            .get(a.game_id.as_str())
            .copied()
            .unwrap_or(TimeControl::Unknown);
        let (tally, ids) = tallies.entry(tc).or_default();
        tally.add(a);
        ids.insert(a.game_id.as_str());
    }

    TimeControl::ALL
        .iter()
        .filter_map(|tc| {
            let (tally, ids) = tallies.get(tc)?;
            Some(TimeControlStats {
                time_control: *tc,
                games: ids.len(),
                total_moves: tally.moves,
                acpl: tally.acpl(),
                blunders: tally.blunders,
                mistakes: tally.mistakes,
                inaccuracies: tally.inaccuracies,
                blunders_per_100: tally.per_100(tally.blunders),
                mistakes_per_100: tally.per_100(tally.mistakes),
                inaccuracies_per_100: tally.per_100(tally.inaccuracies),
            })
        })
        .collect()
}

/// The player's costliest moves, at most one per (game, phase).
pub fn select_swing_moves(
    analyses: &[MoveAnalysis],
    games: &[ParsedGame],
    limit: usize,
) -> Vec<SwingMove> {
    let urls = game_urls(games);
    let mut ranked: Vec<&MoveAnalysis> = player_moves(analyses).filter(|a| a.cpl > 0).collect();
    ranked.sort_by(|a, b| b.cpl.cmp(&a.cpl));

    let mut seen: HashSet<(&str, Phase)> = HashSet::new();
    ranked
        .into_iter()
        .filter(|a| seen.insert((a.game_id.as_str(), a.phase)))
        .take(limit)
        .map(|a| SwingMove {
            game_id: a.game_id.clone(),
            ply: a.ply,
            move_san: a.move_san.clone(),
            fen_before: a.fen_before.clone(),
            best_move_san: a.best_move_san.clone(),
            cpl: a.cpl,
            eval_before: a.eval_before,
            eval_after: a.eval_after,
            pv: a.pv.clone(),
            phase: a.phase,
            game_url: urls.get(a.game_id.as_str()).cloned().unwrap_or_default(),
        })
        .collect()
}

/// One row per input game the player has analyzed moves in, in input order.
pub fn compute_game_summaries(
    analyses: &[MoveAnalysis],
    games: &[ParsedGame],
) -> Vec<GameSummary> {
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for a in player_moves(analyses) {
        tallies.entry(a.game_id.as_str()).or_default().add(a);
    }

    games
        .iter()
        .filter_map(|game| {
            let tally = tallies.get(game.game_id.as_str())?;
            Some(game_row(game, tally))
        })
        .collect()
}

/// Summary row for `game` over its player moves in `analyses`, even when
/// there are none.
pub fn summarize_game(analyses: &[MoveAnalysis], game: &ParsedGame) -> GameSummary {
    let mut tally = Tally::default();
    player_moves(analyses)
        .filter(|a| a.game_id == game.game_id)
        .for_each(|a| tally.add(a));
    game_row(game, &tally)
}

fn game_row(game: &ParsedGame, tally: &Tally) -> GameSummary {
    GameSummary {
        game_id: game.game_id.clone(),
        player_color: game.player_color,
        result: game.result,
        time_control: game.time_control,
        opponent: game.opponent_name().to_string(),
        total_moves: tally.moves,
        acpl: tally.acpl(),
        blunders: tally.blunders,
        mistakes: tally.mistakes,
        inaccuracies: tally.inaccuracies,
        url: game.url.clone(),
        date: game.date.clone(),
    }
}

/// Opening ACPL of the player's moves with the given color, if any.
pub fn opening_acpl(analyses: &[MoveAnalysis], side: Side) -> Option<f64> {
    let mut tally = Tally::default();
    player_moves(analyses)
        .filter(|a| a.phase == Phase::Opening && a.side_to_move == side)
        .for_each(|a| tally.add(a));
    (tally.moves > 0).then(|| tally.acpl())
}

fn game_urls(games: &[ParsedGame]) -> HashMap<&str, String> {
    games
        .iter()
        .map(|g| (g.game_id.as_str(), g.url.clone()))
        .collect()
}

/// Motif buckets with each example linked to its game.
pub(crate) fn detect_motifs_with_urls(
    analyses: &[MoveAnalysis],
    games: &[ParsedGame],
) -> Vec<MotifBucket> {
    let urls = game_urls(games);
    let mut motifs = detect_motifs(analyses);
    for example in motifs.iter_mut().flat_map(|m| m.examples.iter_mut()) {
        if let Some(url) = urls.get(example.game_id.as_str()) {
            example.game_url = url.clone();
        }
    }
    motifs
}

/// Full summary over phase-labeled records.
pub fn compute_summary(
    username: &str,
    analyses: &[MoveAnalysis],
    games: &[ParsedGame],
    swing_moves: usize,
) -> Summary {
    let mut overall = Tally::default();
    player_moves(analyses).for_each(|a| overall.add(a));

    let motifs = detect_motifs_with_urls(analyses, games);

    let summary = Summary {
        username: username.to_string(),
        total_games: games.len(),
        total_moves: overall.moves,
        acpl: overall.acpl(),
        phase_stats: compute_phase_stats(analyses),
        time_control_stats: compute_time_control_stats(analyses, games),
        swing_moves: select_swing_moves(analyses, games, swing_moves),
        motifs,
        game_summaries: compute_game_summaries(analyses, games),
        time_stats: compute_time_stats(analyses, games),
        opening_acpl_white: opening_acpl(analyses, Side::White),
        opening_acpl_black: opening_acpl(analyses, Side::Black),
    };

    info!(
        username,
        games = summary.total_games,
        moves = summary.total_moves,
        acpl = %format!("{:.1}", summary.acpl),
        motifs = summary.motifs.len(),
        "Summary computed"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer_trait::test_support::record;
    use chess_core::GameResult;

    fn game(id: &str, tc: TimeControl) -> ParsedGame {
        ParsedGame {
            game_id: id.into(),
            white: "hero".into(),
            black: format!("villain-{id}"),
            result: GameResult::Loss,
            date: "2024.03.01".into(),
            time_control_raw: "180+2".into(),
            time_control: tc,
            rated: true,
            player_color: Side::White,
            moves_san: vec![],
            fens: vec![],
            clock_times: vec![],
            url: format!("https://example.org/game/{id}"),
            eco: String::new(),
        }
    }

    /// 10 opening, 15 middlegame, 5 endgame moves; two blunders.
    fn thirty_moves() -> Vec<MoveAnalysis> {
        (0..30u32)
            .map(|i| {
                let cpl = match i {
                    12 => 250,
                    27 => 300,
                    _ => 10,
                };
                let mut r = record("g1", 2 * i + 1, cpl);
                r.phase = match i {
                    0..=9 => Phase::Opening,
                    10..=24 => Phase::Middlegame,
                    _ => Phase::Endgame,
                };
                r
            })
            .collect()
    }

    #[test]
    fn test_phase_stats_count_blunders() {
        let stats = compute_phase_stats(&thirty_moves());
        assert_eq!(stats.len(), 3);
        let blunders: usize = stats.iter().map(|s| s.blunders).sum();
        assert_eq!(blunders, 2);
        assert_eq!(stats[0].total_moves, 10);
        assert_eq!(stats[1].total_moves, 15);
        assert_eq!(stats[2].total_moves, 5);
        assert_eq!(stats[2].blunders, 1);
        assert!((stats[2].blunders_per_100 - 20.0).abs() < 1e-9);
        assert!((stats[0].acpl - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_phase_is_zeroed() {
        let records = vec![record("g1", 1, 30)];
        let stats = compute_phase_stats(&records);
        assert_eq!(stats[0].phase, Phase::Opening);
        assert_eq!(stats[0].total_moves, 0);
        assert_eq!(stats[0].acpl, 0.0);
        assert_eq!(stats[0].blunders_per_100, 0.0);
    }

    #[test]
    fn test_opponent_moves_excluded() {
        let mut records = thirty_moves();
        let mut opp = record("g1", 2, 900);
        opp.is_player_move = false;
        records.push(opp);
        let blunders: usize = compute_phase_stats(&records).iter().map(|s| s.blunders).sum();
        assert_eq!(blunders, 2);
    }

    #[test]
    fn test_time_control_stats_only_non_empty() {
        let games = vec![
            game("g1", TimeControl::Rapid),
            game("g2", TimeControl::Blitz),
            game("g3", TimeControl::Blitz),
            game("g4", TimeControl::Bullet),
        ];
        let records = vec![
            record("g1", 1, 100),
            record("g2", 1, 0),
            record("g2", 3, 200),
            record("g3", 1, 40),
        ];
        let stats = compute_time_control_stats(&records, &games);
        let tcs: Vec<TimeControl> = stats.iter().map(|s| s.time_control).collect();
        assert_eq!(tcs, vec![TimeControl::Blitz, TimeControl::Rapid]);
        assert_eq!(stats[0].games, 2);
        assert_eq!(stats[0].total_moves, 3);
        assert!((stats[0].acpl - 80.0).abs() < 1e-9);
        assert_eq!(stats[0].blunders, 1);
        assert_eq!(stats[0].mistakes, 0);
        assert_eq!(stats[0].inaccuracies, 0);
        assert!((stats[0].blunders_per_100 - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats[1].mistakes, 1);
        assert!((stats[1].mistakes_per_100 - 100.0).abs() < 1e-9);
        assert_eq!(stats[1].inaccuracies_per_100, 0.0);

        let json = serde_json::to_value(&stats[0]).unwrap();
        for key in ["blunders", "mistakes", "inaccuracies", "inaccuracies_per_100"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_time_control_stats_unknown_game_bucket() {
        let games = vec![game("g1", TimeControl::Rapid)];
        let records = vec![record("g1", 1, 10), record("lost", 1, 60), record("lost", 3, 0)];
        let stats = compute_time_control_stats(&records, &games);
        let tcs: Vec<TimeControl> = stats.iter().map(|s| s.time_control).collect();
        assert_eq!(tcs, vec![TimeControl::Rapid, TimeControl::Unknown]);
        assert_eq!(stats[1].games, 1);
        assert_eq!(stats[1].total_moves, 2);
        assert_eq!(stats[1].inaccuracies, 1);
        assert!((stats[1].inaccuracies_per_100 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_swing_moves_dedup_by_game_and_phase() {
        let games = vec![game("g1", TimeControl::Blitz), game("g2", TimeControl::Blitz)];
        let mut late = record("g1", 61, 400);
        late.phase = Phase::Endgame;
        let records = vec![
            record("g1", 11, 300),
            record("g1", 13, 500),
            record("g2", 11, 300),
            late,
            record("g2", 13, 0),
        ];
        let swings = select_swing_moves(&records, &games, 10);
        let keys: Vec<(&str, u32)> = swings.iter().map(|s| (s.game_id.as_str(), s.ply)).collect();
        assert_eq!(keys, vec![("g1", 13), ("g1", 61), ("g2", 11)]);
        assert_eq!(swings[0].game_url, "https://example.org/game/g1");

        assert_eq!(select_swing_moves(&records, &games, 2).len(), 2);
    }

    #[test]
    fn test_game_summaries_follow_input_order() {
        let games = vec![
            game("g2", TimeControl::Blitz),
            game("g1", TimeControl::Rapid),
            game("g9", TimeControl::Rapid),
        ];
        let records = vec![record("g1", 1, 250), record("g1", 3, 60), record("g2", 1, 120)];
        let rows = compute_game_summaries(&records, &games);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].game_id, "g2");
        assert_eq!(rows[0].mistakes, 1);
        assert_eq!(rows[1].opponent, "villain-g1");
        assert_eq!(rows[1].blunders, 1);
        assert_eq!(rows[1].inaccuracies, 1);
        assert!((rows[1].acpl - 155.0).abs() < 1e-9);
    }

    #[test]
    fn test_opening_acpl_by_side() {
        let mut records = vec![record("g1", 1, 20), record("g1", 3, 40), record("g2", 2, 90)];
        for r in &mut records {
            r.phase = Phase::Opening;
        }
        assert_eq!(opening_acpl(&records, Side::White), Some(30.0));
        assert_eq!(opening_acpl(&records, Side::Black), Some(90.0));
        records.pop();
        assert_eq!(opening_acpl(&records, Side::Black), None);
    }

    #[test]
    fn test_summary_totals_and_urls() {
        let games = vec![game("g1", TimeControl::Blitz)];
        let summary = compute_summary("hero", &thirty_moves(), &games, DEFAULT_SWING_MOVES);
        assert_eq!(summary.total_games, 1);
        assert_eq!(summary.total_moves, 30);
        assert_eq!(summary.phase_stats.len(), 3);
        assert_eq!(summary.game_summaries.len(), 1);
        assert!(summary.time_stats.is_none());
        assert!(summary.opening_acpl_white.is_some());
        assert!(summary.opening_acpl_black.is_none());
        for bucket in &summary.motifs {
            assert!(bucket.count > 0);
            for ex in &bucket.examples {
                assert_eq!(ex.game_url, "https://example.org/game/g1");
            }
        }
    }
}
