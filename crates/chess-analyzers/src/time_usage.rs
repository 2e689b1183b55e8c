//! Think-time analysis from per-move clock samples.

use std::collections::HashMap;

use chess_core::{MoveAnalysis, MoveFlag, ParsedGame, TimeControl};
use tracing::debug;

use crate::summary::TimeStats;

/// Share of player moves that must carry a clock sample.
pub const MIN_CLOCK_COVERAGE: f64 = 0.7;

/// Per-category cut-offs, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeThresholds {
    /// Think times strictly below this count as fast.
    pub fast_s: f64,
    /// Remaining clock at or below this counts as time trouble.
    pub trouble_s: f64,
}

impl TimeThresholds {
    pub fn for_category(tc: TimeControl) -> Self {
        match tc {
            TimeControl::Bullet => Self { fast_s: 1.0, trouble_s: 5.0 },
            TimeControl::Blitz | TimeControl::Unknown => Self { fast_s: 2.0, trouble_s: 10.0 },
            TimeControl::Rapid | TimeControl::Daily => Self { fast_s: 3.0, trouble_s: 30.0 },
        }
    }
}

/// The most frequent time control among the games; ties go to the faster one.
pub fn dominant_time_control(games: &[ParsedGame]) -> TimeControl {
    let mut counts: HashMap<TimeControl, usize> = HashMap::new();
    for g in games {
        *counts.entry(g.time_control).or_insert(0) += 1;
    }
    let mut best = TimeControl::Blitz;
    let mut best_count = 0;
    for tc in TimeControl::ALL {
        let n = counts.get(&tc).copied().unwrap_or(0);
        if n > best_count {
            best = tc;
            best_count = n;
        }
    }
    best
}

/// A player move with its derived think time.
struct Timed<'a> {
    record: &'a MoveAnalysis,
    think_s: f64,
    remaining_s: f64,
}

fn think_times<'a>(player: &[&'a MoveAnalysis], games: &[ParsedGame]) -> Vec<Timed<'a>> {
    let increments: HashMap<&str, f64> = games
        .iter()
        .map(|g| (g.game_id.as_str(), g.increment_seconds()))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut by_game: HashMap<&str, Vec<(&'a MoveAnalysis, f64)>> = HashMap::new();
    for &a in player {
        let Some(clock) = a.clock_remaining else {
            continue;
        };
        by_game
            .entry(a.game_id.as_str())
            .or_insert_with(|| {
                order.push(a.game_id.as_str());
                Vec::new()
            })
            .push((a, clock));
    }

    let mut out = Vec::new();
    for game_id in order {
        let Some(moves) = by_game.get_mut(game_id) else {
            continue;
        };
        moves.sort_by_key(|(a, _)| a.ply);
        let inc = increments.get(game_id).copied().unwrap_or(0.0);
        for pair in moves.windows(2) {
            let (_, prev_clock) = pair[0];
            let (record, clock) = pair[1];
            out.push(Timed {
                record,
                think_s: (prev_clock - clock + inc).max(0.0),
                remaining_s: clock,
            });
        }
    }
    out
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Think-time stats for the player's moves, or `None` when the clock data
/// cannot support them.
pub fn compute_time_stats(analyses: &[MoveAnalysis], games: &[ParsedGame]) -> Option<TimeStats> {
    let player: Vec<&MoveAnalysis> = analyses.iter().filter(|a| a.is_player_move).collect();
    if player.is_empty() {
        return None;
    }

    let with_clock = player.iter().filter(|a| a.clock_remaining.is_some()).count();
    let coverage = with_clock as f64 / player.len() as f64;
    if coverage < MIN_CLOCK_COVERAGE {
        debug!(coverage, "Clock coverage too low for time stats");
        return None;
    }

    let timed = think_times(&player, games);
    if timed.is_empty() {
        return None;
    }

    let thresholds = TimeThresholds::for_category(dominant_time_control(games));
    let mut sorted: Vec<f64> = timed.iter().map(|t| t.think_s).collect();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let avg = sorted.iter().sum::<f64>() / n as f64;
    let median_dt = median(&sorted);
    let p90 = sorted[((n as f64 * 0.9) as usize).min(n - 1)];

    let is_fast = |t: &Timed<'_>| t.think_s < thresholds.fast_s;
    let is_blunder = |t: &Timed<'_>| t.record.flag == MoveFlag::Blunder;

    let in_trouble = timed.iter().filter(|t| t.remaining_s <= thresholds.trouble_s).count();
    let fast = timed.iter().filter(|&t| is_fast(t)).count();
    let fast_blunders = timed.iter().filter(|&t| is_fast(t) && is_blunder(t)).count();
    let normal_blunders = timed.iter().filter(|&t| !is_fast(t) && is_blunder(t)).count();
    let calculation_failures = timed
        .iter()
        .filter(|&t| !is_fast(t) && is_blunder(t) && t.think_s > median_dt)
        .count();

    Some(TimeStats {
        clock_coverage: coverage,
        timed_moves: n,
        avg_dt_s: avg,
        median_dt_s: median_dt,
        p90_dt_s: p90,
        time_trouble_rate: rate(in_trouble, n),
        blunder_rate_fast: rate(fast_blunders, fast),
        blunder_rate_normal: rate(normal_blunders, n - fast),
        autopilot_blunders: fast_blunders,
        calculation_failures,
    })
}
