//! The single, lock-protected engine handle shared by all workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::process::{EngineConfig, UciProcess};
use super::{Engine, SearchOutput};
use crate::analysis::{Analysis, CandidateLine};
use crate::error::EngineError;
use crate::position::Position;
use crate::types::Move;

struct Inner {
    engine: Option<Box<dyn Engine>>,
    skill_level: Option<u8>,
}

/// エンジン呼び出しを直列化するセッション。
///
/// At most one `evaluate`/`play` call is in flight: the mutex is held for the
/// whole engine round-trip and released on every exit path.
pub struct EngineSession {
    inner: Mutex<Inner>,
    available: AtomicBool,
}

impl EngineSession {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                engine: Some(engine),
                skill_level: None,
            }),
            available: AtomicBool::new(true),
        }
    }

    /// A session without an engine. Every call reports `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            inner: Mutex::new(Inner {
                engine: None,
                skill_level: None,
            }),
            available: AtomicBool::new(false),
        }
    }

    /// Spawn a UCI process. A failed start yields an unavailable session.
    pub fn spawn(cfg: &EngineConfig) -> Self {
        match UciProcess::spawn(cfg) {
            Ok(process) => {
                let session = Self::new(Box::new(process));
                session.inner.lock().skill_level = cfg.skill_level;
                session
            }
            Err(e) => {
                log::warn!("{e}");
                Self::unavailable()
            }
        }
    }

    /// Lock-free check usable from the event loop.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn with_engine<T>(
        &self,
        f: impl FnOnce(&mut dyn Engine) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut inner = self.inner.lock();
        self.call(&mut inner, f)
    }

    /// Run `f` on the loaded engine. An `Unavailable` answer means the
    /// process is gone: the engine is dropped and the session stays
    /// unavailable until it is replaced.
    fn call<T>(
        &self,
        inner: &mut Inner,
        f: impl FnOnce(&mut dyn Engine) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let engine = inner
            .engine
            .as_deref_mut()
            .ok_or_else(|| EngineError::Unavailable("no engine loaded".to_string()))?;
        let result = f(engine);
        if let Err(EngineError::Unavailable(reason)) = &result {
            log::error!("engine lost: {reason}");
            self.available.store(false, Ordering::Release);
            inner.engine = None;
        }
        result
    }

    /// Analyse `position` for `budget` with `breadth` ranked lines.
    pub fn evaluate(
        &self,
        position: &Position,
        budget: Duration,
        breadth: u32,
    ) -> Result<Analysis, EngineError> {
        let output = self.with_engine(|engine| engine.search(position.fen(), budget, breadth))?;
        if output.timed_out {
            log::debug!("analysis of {} needed stop after {:?}", position.fen(), output.elapsed);
        }
        Ok(to_analysis(output))
    }

    /// Best move for `position` within `budget`.
    pub fn play(&self, position: &Position, budget: Duration) -> Result<Move, EngineError> {
        let output = self.with_engine(|engine| engine.search(position.fen(), budget, 1))?;
        let token = output.bestmove.unwrap_or_default();
        if token.is_empty() || token == "(none)" || token == "0000" {
            return Err(EngineError::Failure("No move returned by engine".to_string()));
        }
        let mv = Move::from_uci(&token)
            .map_err(|_| EngineError::Failure(format!("unreadable bestmove '{token}'")))?;
        if !position.is_legal(&mv) {
            return Err(EngineError::Failure(format!(
                "engine played illegal move {mv} in {}",
                position.fen()
            )));
        }
        Ok(mv)
    }

    /// `Skill Level` を設定する。同じ値なら送らない。
    pub fn configure(&self, skill_level: u8) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if inner.skill_level == Some(skill_level) {
            return Ok(());
        }
        self.call(&mut inner, |engine| {
            engine.set_option("Skill Level", &skill_level.to_string())
        })?;
        inner.skill_level = Some(skill_level);
        log::info!("engine skill level set to {skill_level}");
        Ok(())
    }

    pub fn new_game(&self) -> Result<(), EngineError> {
        self.with_engine(|engine| engine.new_game())
    }

    /// Take the engine out of the session and drop it (which quits the
    /// process). Waits for an in-flight call to finish first.
    pub fn shutdown(&self) {
        self.available.store(false, Ordering::Release);
        let engine = self.inner.lock().engine.take();
        if let Some(engine) = engine {
            log::info!("shutting down {}", engine.name());
            drop(engine);
        }
    }
}

fn to_analysis(output: SearchOutput) -> Analysis {
    let lines: Vec<CandidateLine> = output
        .lines
        .into_iter()
        .map(|info| CandidateLine {
            rank: info.multipv,
            score: info.score.unwrap_or_default(),
            depth: info.depth,
            pv: info.pv.iter().map_while(|s| Move::from_uci(s).ok()).collect(),
        })
        .collect();
    let (score, depth) = lines
        .first()
        .map(|l| (l.score, l.depth))
        .unwrap_or_default();
    Analysis {
        score,
        depth,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::types::Score;

    #[test]
    fn concurrent_calls_never_overlap() {
        let (engine, probe) = ScriptedEngine::new();
        let session = Arc::new(EngineSession::new(Box::new(
            engine.with_delay(Duration::from_millis(15)),
        )));
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    let pos = Position::startpos();
                    if i % 2 == 0 {
                        session.evaluate(&pos, Duration::from_millis(10), 2).map(|_| ())
                    } else {
                        session.play(&pos, Duration::from_millis(10)).map(|_| ())
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
        assert_eq!(probe.call_count(), 6);
        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn evaluate_builds_ranked_lines() {
        let (engine, _probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine));
        let analysis = session.evaluate(&Position::startpos(), Duration::from_millis(10), 3).unwrap();
        assert_eq!(analysis.lines.len(), 3);
        assert_eq!(analysis.score, Score::Cp(30));
        assert_eq!(analysis.depth, Some(12));
        assert_eq!(analysis.lines[2].rank, 3);
        assert_eq!(analysis.lines[2].score, Score::Cp(10));
    }

    #[test]
    fn play_returns_legal_move() {
        let (engine, _probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine));
        let pos = Position::startpos();
        let mv = session.play(&pos, Duration::from_millis(10)).unwrap();
        assert!(pos.is_legal(&mv));
    }

    #[test]
    fn play_without_moves_is_a_failure() {
        let (engine, _probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine));
        let mated = Position::from_fen(
            "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4",
        )
        .unwrap();
        assert!(matches!(
            session.play(&mated, Duration::from_millis(10)),
            Err(EngineError::Failure(_))
        ));
    }

    #[test]
    fn missing_engine_is_unavailable() {
        let session = EngineSession::unavailable();
        assert!(!session.is_available());
        assert!(matches!(
            session.evaluate(&Position::startpos(), Duration::from_millis(10), 1),
            Err(EngineError::Unavailable(_))
        ));
        assert!(matches!(
            session.play(&Position::startpos(), Duration::from_millis(10)),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[test]
    fn shutdown_makes_later_calls_unavailable() {
        let (engine, _probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine));
        assert!(session.is_available());
        session.shutdown();
        session.shutdown();
        assert!(!session.is_available());
        assert!(matches!(
            session.evaluate(&Position::startpos(), Duration::from_millis(10), 1),
            Err(EngineError::Unavailable(_))
        ));
    }

    #[test]
    fn skill_level_is_sent_once() {
        let (engine, probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine));
        session.configure(8).unwrap();
        session.configure(8).unwrap();
        session.configure(12).unwrap();
        let options = probe.options.lock().clone();
        assert_eq!(
            options,
            vec![
                ("Skill Level".to_string(), "8".to_string()),
                ("Skill Level".to_string(), "12".to_string())
            ]
        );
    }

    #[test]
    fn engine_failure_is_propagated() {
        let (engine, _probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine.failing()));
        let err = session.evaluate(&Position::startpos(), Duration::from_millis(10), 1).unwrap_err();
        assert_eq!(err.short_message(), "engine failure: scripted crash");
        assert!(session.is_available());
    }

    #[test]
    fn exited_engine_is_dropped() {
        let (engine, probe) = ScriptedEngine::new();
        let session = EngineSession::new(Box::new(engine.exited()));
        let pos = Position::startpos();
        assert!(matches!(
            session.play(&pos, Duration::from_millis(10)),
            Err(EngineError::Unavailable(_))
        ));
        assert!(!session.is_available());

        // 以降の呼び出しはエンジンに届かない
        assert!(matches!(
            session.evaluate(&pos, Duration::from_millis(10), 1),
            Err(EngineError::Unavailable(msg)) if msg == "no engine loaded"
        ));
        assert!(session.configure(3).is_err());
        assert_eq!(probe.call_count(), 1);
    }
}
