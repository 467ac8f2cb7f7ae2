use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::info::InfoTable;
use super::{Engine, SearchOutput};
use crate::error::EngineError;

pub const ENGINE_READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// movetime を超えてから `stop` を送るまでの猶予。
pub const DEFAULT_TIMEOUT_MARGIN: Duration = Duration::from_millis(500);

/// エンジンプロセス起動時の設定。
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub threads: usize,
    pub hash_mb: u32,
    /// Stockfish の `Skill Level` (0..=20)
    pub skill_level: Option<u8>,
    /// 追加の UCI オプション (Name=Value 形式)
    pub options: Vec<String>,
    pub ready_timeout: Duration,
    pub timeout_margin: Duration,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            threads: 1,
            hash_mb: 64,
            skill_level: None,
            options: Vec::new(),
            ready_timeout: ENGINE_READY_TIMEOUT,
            timeout_margin: DEFAULT_TIMEOUT_MARGIN,
        }
    }
}

/// 1本の UCI エンジンに対する入出力をカプセル化する。
pub struct UciProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    opt_names: HashSet<String>,
    name: String,
    multipv: u32,
    ready_timeout: Duration,
    timeout_margin: Duration,
    /// 前回の探索が bestmove を返さずに打ち切られた。
    awaiting_bestmove: bool,
}

impl UciProcess {
    /// Start the engine and run the UCI handshake.
    ///
    /// Any failure here means there is no usable engine and is reported as
    /// [`EngineError::Unavailable`].
    pub fn spawn(cfg: &EngineConfig) -> Result<Self, EngineError> {
        let mut cmd = Command::new(&cfg.path);
        if !cfg.args.is_empty() {
            cmd.args(&cfg.args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!(
                    "failed to spawn engine at {}: {e}",
                    cfg.path.display()
                ))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("engine has no stdout".to_string()))?;
        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut proc = Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            opt_names: HashSet::new(),
            name: cfg.path.display().to_string(),
            multipv: 1,
            ready_timeout: cfg.ready_timeout,
            timeout_margin: cfg.timeout_margin,
            awaiting_bestmove: false,
        };
        proc.initialize(cfg).map_err(|e| match e {
            EngineError::Failure(msg) => EngineError::Unavailable(msg),
            other => other,
        })?;
        log::info!("engine ready: {}", proc.name);
        Ok(proc)
    }

    fn initialize(&mut self, cfg: &EngineConfig) -> Result<(), EngineError> {
        self.write_line("uci")?;
        loop {
            let line = self.recv_line(self.ready_timeout)?;
            if let Some(rest) = line.strip_prefix("option ") {
                if let Some(name) = parse_option_name(rest) {
                    self.opt_names.insert(name);
                }
            } else if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.trim().to_string();
            } else if line.trim() == "uciok" {
                break;
            }
        }
        self.set_option_if_available("Threads", &cfg.threads.to_string())?;
        self.set_option_if_available("Hash", &cfg.hash_mb.to_string())?;
        if let Some(level) = cfg.skill_level {
            self.set_option_if_available("Skill Level", &level.to_string())?;
        }
        // 追加のUCIオプションを設定
        for opt in &cfg.options {
            if let Some((name, value)) = opt.split_once('=') {
                self.set_option_if_available(name.trim(), value.trim())?;
            } else {
                // "=" がない場合はボタン型オプションとして値なしで送る
                self.write_line(&format!("setoption name {}", opt.trim()))?;
            }
        }
        self.sync_ready()?;
        self.write_line("ucinewgame")?;
        Ok(())
    }

    pub fn supports_option(&self, name: &str) -> bool {
        self.opt_names.contains(name)
    }

    pub fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.write_line("isready")?;
        loop {
            let line = self.recv_line(self.ready_timeout)?;
            if line.trim() == "readyok" {
                break;
            }
        }
        Ok(())
    }

    pub fn recv_line(&self, timeout: Duration) -> Result<String, EngineError> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => {
                log::trace!("{} < {}", self.name, line);
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => {
                Err(EngineError::Failure(format!("{}: engine read timeout", self.name)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(self.exited()),
        }
    }

    fn exited(&self) -> EngineError {
        EngineError::Unavailable(format!("{}: engine exited unexpectedly", self.name))
    }

    pub fn set_option_if_available(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        if self.opt_names.is_empty() || self.opt_names.contains(name) {
            self.write_line(&format!("setoption name {name} value {value}"))?;
        } else {
            log::debug!("{}: option '{}' not advertised, skipped", self.name, name);
        }
        Ok(())
    }

    pub fn write_line(&mut self, msg: &str) -> Result<(), EngineError> {
        log::debug!("{} > {}", self.name, msg);
        // 書き込めないのはプロセスが終了しているとき
        let io = |e: std::io::Error| EngineError::Unavailable(format!("{}: {e}", self.name));
        self.stdin.write_all(msg.as_bytes()).map_err(io)?;
        self.stdin.write_all(b"\n").map_err(io)?;
        self.stdin.flush().map_err(io)?;
        Ok(())
    }

    /// Wait out the `bestmove` of a search that hit the hard deadline, so it
    /// cannot be mistaken for the answer to the next one.
    ///
    /// An engine that still does not answer is reported as
    /// [`EngineError::Unavailable`].
    fn resync(&mut self) -> Result<(), EngineError> {
        if !self.awaiting_bestmove {
            return Ok(());
        }
        log::warn!("{}: waiting for the bestmove of an abandoned search", self.name);
        let name = self.name.clone();
        let unresponsive =
            |e: EngineError| EngineError::Unavailable(format!("{name}: unresponsive: {e}"));
        self.write_line("stop")?;
        loop {
            let line = self.recv_line(self.ready_timeout).map_err(unresponsive)?;
            if line.starts_with("bestmove") {
                break;
            }
        }
        self.sync_ready().map_err(unresponsive)?;
        self.awaiting_bestmove = false;
        Ok(())
    }

    /// 前回の探索の残りの出力を捨てる。
    fn drain_pending(&self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            log::debug!("{}: dropped {} stale lines", self.name, dropped);
        }
    }
}

impl Engine for UciProcess {
    fn search(
        &mut self,
        fen: &str,
        movetime: Duration,
        multipv: u32,
    ) -> Result<SearchOutput, EngineError> {
        self.resync()?;
        self.drain_pending();
        let multipv = multipv.max(1);
        if multipv != self.multipv {
            self.set_option_if_available("MultiPV", &multipv.to_string())?;
            self.multipv = multipv;
        }
        self.write_line(&format!("position fen {fen}"))?;
        let movetime_ms = movetime.as_millis().max(1);
        self.write_line(&format!("go movetime {movetime_ms}"))?;

        let start = Instant::now();
        let soft_limit = movetime + self.timeout_margin;
        let hard_limit = soft_limit + self.timeout_margin;
        let mut stop_sent = false;
        let mut table = InfoTable::default();

        loop {
            let elapsed = start.elapsed();
            let deadline = if stop_sent { hard_limit } else { soft_limit };
            if elapsed >= deadline {
                if !stop_sent {
                    self.write_line("stop")?;
                    stop_sent = true;
                    continue;
                }
                self.awaiting_bestmove = true;
                return Err(EngineError::Failure(format!(
                    "{}: no bestmove after {} ms",
                    self.name,
                    elapsed.as_millis()
                )));
            }

            let remaining = deadline.saturating_sub(elapsed);
            match self.rx.recv_timeout(remaining) {
                Ok(line) => {
                    if line.starts_with("info") {
                        table.update_from_line(&line);
                        continue;
                    }
                    if let Some(rest) = line.strip_prefix("bestmove") {
                        let bestmove = rest.split_whitespace().next().map(str::to_string);
                        return Ok(SearchOutput {
                            bestmove,
                            lines: table.into_lines(multipv),
                            elapsed: start.elapsed(),
                            timed_out: stop_sent,
                        });
                    }
                }
                // 期限切れはループ先頭で処理する
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(self.exited()),
            }
        }
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        self.resync()?;
        self.set_option_if_available(name, value)?;
        self.sync_ready()
    }

    fn new_game(&mut self) -> Result<(), EngineError> {
        self.resync()?;
        self.write_line("ucinewgame")?;
        self.sync_ready()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for UciProcess {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
        log::warn!("{}: did not quit in time, killing", self.name);
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// `option name Skill Level type spin …` から `Skill Level` を取り出す。
pub fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace();
    tokens.by_ref().find(|tok| *tok == "name")?;
    let parts: Vec<&str> = tokens.take_while(|tok| *tok != "type").collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
