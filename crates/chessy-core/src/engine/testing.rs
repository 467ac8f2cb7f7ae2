//! Scripted engine for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::info::InfoLine;
use super::{Engine, SearchOutput};
use crate::error::EngineError;
use crate::position::Position;
use crate::types::Score;

/// Counters shared between a [`ScriptedEngine`] and the test body.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    pub calls: Arc<Mutex<Vec<(String, u32)>>>,
    pub options: Arc<Mutex<Vec<(String, String)>>>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
}

impl Probe {
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn searched_fens(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(fen, _)| fen.clone()).collect()
    }
}

/// Answers every search with the first legal moves of the position.
pub(crate) struct ScriptedEngine {
    pub delay: Duration,
    pub score_cp: i32,
    pub fail: bool,
    pub exit: bool,
    probe: Probe,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Probe) {
        let probe = Probe::default();
        let engine = Self {
            delay: Duration::ZERO,
            score_cp: 30,
            fail: false,
            exit: false,
            probe: probe.clone(),
        };
        (engine, probe)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Behave like a process that died during the first search.
    pub fn exited(mut self) -> Self {
        self.exit = true;
        self
    }
}

impl Engine for ScriptedEngine {
    fn search(
        &mut self,
        fen: &str,
        _movetime: Duration,
        multipv: u32,
    ) -> Result<SearchOutput, EngineError> {
        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(now, Ordering::SeqCst);
        self.probe.calls.lock().push((fen.to_string(), multipv));
        std::thread::sleep(self.delay);
        self.probe.active.fetch_sub(1, Ordering::SeqCst);

        if self.exit {
            return Err(EngineError::Unavailable("scripted exit".to_string()));
        }
        if self.fail {
            return Err(EngineError::Failure("scripted crash\nbacktrace".to_string()));
        }
        let position =
            Position::from_fen(fen).map_err(|e| EngineError::Failure(e.to_string()))?;
        let legal = position.legal_moves();
        let lines = legal
            .iter()
            .take(multipv.max(1) as usize)
            .enumerate()
            .map(|(idx, mv)| InfoLine {
                multipv: idx as u32 + 1,
                depth: Some(12),
                score: Some(Score::Cp(self.score_cp - 10 * idx as i32)),
                pv: vec![mv.to_string()],
                ..Default::default()
            })
            .collect();
        Ok(SearchOutput {
            bestmove: Some(legal.first().map_or("(none)".to_string(), |m| m.to_string())),
            lines,
            elapsed: self.delay,
            timed_out: false,
        })
    }

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        self.probe.options.lock().push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn new_game(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}
