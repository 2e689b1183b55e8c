//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::future::Future;
use std::process::Stdio;

use chess_core::Evaluation;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::config::{EngineSettings, SearchBudget};
use crate::error::WorkerError;

/// Result of searching one position.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// Score from white's perspective
    pub eval: Evaluation,
    /// Best move in UCI notation, `None` when the side to move has no moves
    pub best_move: Option<String>,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
}

/// Anything that can score a FEN within a search budget.
///
/// Implementations must accept arbitrary positions without a restart.
pub trait PositionEvaluator: Send {
    fn evaluate(
        &mut self,
        fen: &str,
        budget: SearchBudget,
    ) -> impl Future<Output = Result<EngineOutput, WorkerError>> + Send;

    /// Bring a crashed evaluator back to a usable state.
    fn recover(&mut self) -> impl Future<Output = Result<(), WorkerError>> + Send;

    fn quit(&mut self) -> impl Future<Output = ()> + Send;
}

/// Stockfish engine instance
pub struct StockfishEngine {
    settings: EngineSettings,
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(settings: &EngineSettings) -> Result<Self, WorkerError> {
        let (process, stdin, stdout) = spawn(&settings.path)?;
        let mut engine = Self {
            settings: settings.clone(),
            process,
            stdin,
            stdout,
        };
        engine.handshake().await?;
        Ok(engine)
    }

    async fn handshake(&mut self) -> Result<(), WorkerError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;

        let threads = self.settings.threads;
        let hash_mb = self.settings.hash_mb;
        self.send(&format!("setoption name Threads value {threads}")).await?;
        self.send(&format!("setoption name Hash value {hash_mb}")).await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        Ok(())
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), WorkerError> {
        line.clear();
        let n = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| WorkerError::Engine(format!("Failed to read from Stockfish: {e}")))?;
        if n == 0 {
            return Err(WorkerError::Engine("Stockfish closed its output".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    async fn search(&mut self, fen: &str, budget: SearchBudget) -> Result<EngineOutput, WorkerError> {
        self.send(&format!("position fen {fen}")).await?;
        let go = match budget {
            SearchBudget::Depth(depth) => format!("go depth {depth}"),
            SearchBudget::MoveTime(ms) => format!("go movetime {ms}"),
        };
        self.send(&go).await?;

        let mut last_info: Option<String> = None;
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" pv ") {
                last_info = Some(trimmed.to_string());
            } else if trimmed.starts_with("info") && trimmed.contains(" score ") && last_info.is_none() {
                // Terminal positions report a score without a pv
                last_info = Some(trimmed.to_string());
            } else if trimmed.starts_with("bestmove") {
                let white_to_move = fen_white_to_move(fen);
                return build_output(last_info.as_deref(), trimmed, white_to_move);
            }
        }
    }
}

impl PositionEvaluator for StockfishEngine {
    async fn evaluate(
        &mut self,
        fen: &str,
        budget: SearchBudget,
    ) -> Result<EngineOutput, WorkerError> {
        self.search(fen, budget).await
    }

    async fn recover(&mut self) -> Result<(), WorkerError> {
        warn!(path = %self.settings.path, "Restarting Stockfish");
        let _ = self.process.start_kill();
        let _ = self.process.wait().await;

        let (process, stdin, stdout) = spawn(&self.settings.path)?;
        self.process = process;
        self.stdin = stdin;
        self.stdout = stdout;
        self.handshake().await
    }

    /// Send quit command and wait for process to exit
    async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

fn spawn(path: &str) -> Result<(Child, ChildStdin, BufReader<ChildStdout>), WorkerError> {
    let mut process = Command::new(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WorkerError::Engine(format!("Failed to spawn Stockfish at {path}: {e}")))?;

    let stdin = process
        .stdin
        .take()
        .ok_or_else(|| WorkerError::Engine("Stockfish stdin unavailable".into()))?;
    let stdout = process
        .stdout
        .take()
        .ok_or_else(|| WorkerError::Engine("Stockfish stdout unavailable".into()))?;

    Ok((process, stdin, BufReader::new(stdout)))
}

fn fen_white_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) != Some("b")
}

/// Turn the last scored `info` line and the `bestmove` line into an output
/// expressed from white's perspective.
fn build_output(
    info: Option<&str>,
    bestmove_line: &str,
    white_to_move: bool,
) -> Result<EngineOutput, WorkerError> {
    let info = info.ok_or_else(|| WorkerError::Analysis("engine reported no score".into()))?;

    let side_to_move_eval = match (parse_mate(info), parse_cp(info)) {
        (Some(mate), _) => Evaluation::Mate(mate),
        (None, Some(cp)) => Evaluation::Cp(cp),
        (None, None) => return Err(WorkerError::Analysis("engine reported no score".into())),
    };
    let eval = if white_to_move {
        side_to_move_eval
    } else {
        side_to_move_eval.negate()
    };

    let best_move = bestmove_line
        .split_whitespace()
        .nth(1)
        .filter(|mv| *mv != "(none)")
        .map(String::from);

    Ok(EngineOutput {
        eval,
        best_move,
        pv: parse_pv(info),
    })
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    value_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    value_after(line, "mate")
}

fn value_after(line: &str, key: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in line.split_whitespace() {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}
