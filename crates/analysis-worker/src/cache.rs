//! Two-tier evaluation cache.
//!
//! The position cache is an append-only JSON-lines file keyed by
//! (FEN, engine fingerprint). The game cache keeps one JSON document per
//! analyzed game keyed by (game id, fingerprint, thresholds, side mode).
//! Both treat anything unreadable as a miss.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chess_core::MoveAnalysis;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::short_sha256;
use crate::error::WorkerError;

/// Bumped whenever the stored record layout changes.
pub const CACHE_VERSION: u32 = 1;

pub fn position_key(fen: &str, fingerprint: &str) -> String {
    short_sha256(&format!("{fen}|{fingerprint}"))
}

#[derive(Serialize, Deserialize)]
struct PositionLine {
    #[serde(rename = "_cache_key")]
    key: String,
    #[serde(rename = "_cache_version")]
    version: u32,
    #[serde(flatten)]
    analysis: MoveAnalysis,
}

/// In-memory view of a position cache, optionally backed by a file that every
/// new entry is appended to.
#[derive(Debug, Default)]
pub struct PositionCache {
    path: Option<PathBuf>,
    entries: HashMap<String, MoveAnalysis>,
}

impl PositionCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load every valid line of `path`. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self, WorkerError> {
        let entries = read_entries(path)?;
        info!(path = %path.display(), entries = entries.len(), "Loaded position cache");
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    /// A cache that starts from `entries` and appends new ones to `path`.
    pub fn seeded(path: PathBuf, entries: HashMap<String, MoveAnalysis>) -> Self {
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&MoveAnalysis> {
        self.entries.get(key)
    }

    /// Record an entry. Keys are write-once: an existing key is left alone.
    pub fn insert(&mut self, key: String, analysis: MoveAnalysis) -> Result<(), WorkerError> {
        if self.entries.contains_key(&key) {
            return Ok(());
        }
        if let Some(path) = &self.path {
            append_line(path, &key, &analysis)?;
        }
        self.entries.insert(key, analysis);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &HashMap<String, MoveAnalysis> {
        &self.entries
    }
}

fn read_entries(path: &Path) -> Result<HashMap<String, MoveAnalysis>, WorkerError> {
    let mut entries = HashMap::new();
    if !path.exists() {
        return Ok(entries);
    }
    let reader = BufReader::new(File::open(path)?);
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PositionLine>(&line) {
            Ok(entry) if entry.version == CACHE_VERSION => {
                entries.insert(entry.key, entry.analysis);
            }
            Ok(entry) => {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    version = entry.version,
                    "Skipping position cache entry with a different version"
                );
            }
            Err(e) => {
                warn!(path = %path.display(), line = idx + 1, error = %e, "Skipping corrupt position cache line");
            }
        }
    }
    Ok(entries)
}

fn append_line(path: &Path, key: &str, analysis: &MoveAnalysis) -> Result<(), WorkerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(&PositionLine {
        key: key.to_string(),
        version: CACHE_VERSION,
        analysis: analysis.clone(),
    })?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Fold per-worker cache files into the persistent one, skipping keys it
/// already holds. Returns the number of entries added.
pub fn merge_position_caches(target: &Path, sources: &[PathBuf]) -> Result<usize, WorkerError> {
    let mut known: HashSet<String> = read_entries(target)?.into_keys().collect();
    let mut added = 0;
    for source in sources {
        for (key, analysis) in read_entries(source)? {
            if known.insert(key.clone()) {
                append_line(target, &key, &analysis)?;
                added += 1;
            }
        }
    }
    debug!(target = %target.display(), added, "Merged worker position caches");
    Ok(added)
}

#[derive(Serialize, Deserialize)]
struct GameCacheFile {
    cache_version: u32,
    game_id: String,
    analyses: Vec<MoveAnalysis>,
}

/// Whole-game results, one JSON file per game under `dir`.
#[derive(Debug, Clone)]
pub struct GameCache {
    dir: PathBuf,
    tag: String,
}

impl GameCache {
    /// `tag` carries every setting besides the game id that the results depend on.
    pub fn new(dir: PathBuf, tag: String) -> Self {
        Self { dir, tag }
    }

    pub fn key(&self, game_id: &str) -> String {
        short_sha256(&format!("{game_id}|{}", self.tag))
    }

    fn file_for(&self, game_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", self.key(game_id)))
    }

    pub fn load(&self, game_id: &str) -> Option<Vec<MoveAnalysis>> {
        let path = self.file_for(game_id);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<GameCacheFile>(&raw) {
            Ok(file) if file.cache_version == CACHE_VERSION && file.game_id == game_id => {
                Some(file.analyses)
            }
            Ok(file) => {
                warn!(
                    game_id,
                    version = file.cache_version,
                    "Ignoring game cache entry with a different version or game"
                );
                None
            }
            Err(e) => {
                warn!(game_id, path = %path.display(), error = %e, "Ignoring corrupt game cache entry");
                None
            }
        }
    }

    /// Write the game's records via a temp file and rename.
    pub fn store(&self, game_id: &str, analyses: &[MoveAnalysis]) -> Result<(), WorkerError> {
        fs::create_dir_all(&self.dir)?;
        let body = serde_json::to_vec(&GameCacheFile {
            cache_version: CACHE_VERSION,
            game_id: game_id.to_string(),
            analyses: analyses.to_vec(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&body)?;
        tmp.flush()?;
        tmp.persist(self.file_for(game_id)).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::board::START_FEN;
    use chess_core::{Evaluation, MoveFlag, Phase, Side};
    use tempfile::TempDir;

    fn record(game_id: &str, ply: u32, san: &str, uci: &str, cpl: i32, flag: MoveFlag) -> MoveAnalysis {
        MoveAnalysis {
            game_id: game_id.into(),
            ply,
            move_san: san.into(),
            move_uci: uci.into(),
            fen_before: START_FEN.into(),
            side_to_move: Side::White,
            eval_before: Evaluation::Cp(30),
            best_move_uci: "e2e4".into(),
            best_move_san: "e4".into(),
            eval_best: Evaluation::Cp(30),
            eval_after: Evaluation::Cp(30 - cpl),
            cpl,
            flag,
            pv: vec!["e2e4".into(), "e7e5".into()],
            refutation: vec!["e7e5".into()],
            phase: Phase::Opening,
            is_player_move: true,
            clock_remaining: Some(178.5),
        }
    }

    #[test]
    fn test_position_key_determinism() {
        let a = position_key(START_FEN, "abc");
        assert_eq!(a, position_key(START_FEN, "abc"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, position_key(START_FEN, "abd"));
        assert_ne!(
            a,
            position_key("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1", "abc")
        );
    }

    #[test]
    fn test_write_then_load_two_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.jsonl");

        let mut cache = PositionCache::load(&path).unwrap();
        assert!(cache.is_empty());
        cache
            .insert("k1".into(), record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best))
            .unwrap();
        cache
            .insert("k2".into(), record("g1", 3, "Nf3", "g1f3", 250, MoveFlag::Blunder))
            .unwrap();

        let reloaded = PositionCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        let k2 = reloaded.get("k2").unwrap();
        assert_eq!(k2.move_san, "Nf3");
        assert_eq!(k2.eval_after, Evaluation::Cp(-220));
        assert_eq!(k2.flag, MoveFlag::Blunder);
        assert_eq!(reloaded.get("k1").unwrap().flag, MoveFlag::Best);
    }

    #[test]
    fn test_corrupt_and_stale_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.jsonl");
        let mut cache = PositionCache::load(&path).unwrap();
        cache
            .insert("good".into(), record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best))
            .unwrap();

        let mut stale = serde_json::to_value(record("g1", 2, "d4", "d2d4", 0, MoveFlag::Best)).unwrap();
        stale["_cache_key"] = "stale".into();
        stale["_cache_version"] = (CACHE_VERSION + 1).into();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file, "{stale}").unwrap();
        writeln!(file).unwrap();

        let reloaded = PositionCache::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.get("good").is_some());
        assert!(reloaded.get("stale").is_none());
    }

    #[test]
    fn test_insert_is_write_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.jsonl");
        let mut cache = PositionCache::load(&path).unwrap();
        cache
            .insert("k".into(), record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best))
            .unwrap();
        cache
            .insert("k".into(), record("g2", 1, "d4", "d2d4", 0, MoveFlag::Best))
            .unwrap();
        assert_eq!(cache.get("k").unwrap().move_san, "e4");
        let lines = fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 1);
    }

    #[test]
    fn test_merge_deduplicates_by_key() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("positions.jsonl");
        let mut persistent = PositionCache::load(&target).unwrap();
        persistent
            .insert("shared".into(), record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best))
            .unwrap();

        let w0 = dir.path().join("cache_0.jsonl");
        let w1 = dir.path().join("cache_1.jsonl");
        let mut c0 = PositionCache::seeded(w0.clone(), HashMap::new());
        c0.insert("shared".into(), record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best))
            .unwrap();
        c0.insert("a".into(), record("g2", 1, "d4", "d2d4", 0, MoveFlag::Best))
            .unwrap();
        let mut c1 = PositionCache::seeded(w1.clone(), HashMap::new());
        c1.insert("a".into(), record("g3", 1, "d4", "d2d4", 0, MoveFlag::Best))
            .unwrap();
        c1.insert("b".into(), record("g3", 2, "c4", "c2c4", 0, MoveFlag::Best))
            .unwrap();

        let added = merge_position_caches(&target, &[w0, w1]).unwrap();
        assert_eq!(added, 2);
        assert_eq!(PositionCache::load(&target).unwrap().len(), 3);
    }

    #[test]
    fn test_game_cache_roundtrip_and_isolation() {
        let dir = TempDir::new().unwrap();
        let cache = GameCache::new(dir.path().join("games"), "fp|0/50/100/200|false".into());
        assert!(cache.load("g1").is_none());

        let analyses = vec![
            record("g1", 1, "e4", "e2e4", 0, MoveFlag::Best),
            record("g1", 3, "Nf3", "g1f3", 60, MoveFlag::Inaccuracy),
        ];
        cache.store("g1", &analyses).unwrap();
        assert_eq!(cache.load("g1").unwrap(), analyses);

        let other_mode = GameCache::new(dir.path().join("games"), "fp|0/50/100/200|true".into());
        assert!(other_mode.load("g1").is_none());
        assert_ne!(cache.key("g1"), other_mode.key("g1"));
    }

    #[test]
    fn test_game_cache_version_mismatch_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = GameCache::new(dir.path().to_path_buf(), "tag".into());
        let body = serde_json::json!({
            "cache_version": CACHE_VERSION + 1,
            "game_id": "g1",
            "analyses": [],
        });
        fs::write(cache.file_for("g1"), body.to_string()).unwrap();
        assert!(cache.load("g1").is_none());

        fs::write(cache.file_for("g1"), "{ truncated").unwrap();
        assert!(cache.load("g1").is_none());
    }
}
