//! Token/ply reconciliation of asynchronous engine results.

use serde::Serialize;

use super::request::EngineMessage;
use crate::analysis::{Analysis, MoveVerdict};
use crate::cache::{CachedEval, EvalCache};
use crate::position::Position;
use crate::types::Move;

pub const STATUS_UPDATED: &str = "Suggestions updated.";
pub const STATUS_ENGINE_ERROR: &str = "Engine error.";
pub const STATUS_NO_ENGINE: &str = "Engine not available. Configure Stockfish to see suggestions.";

/// What the review screen currently shows for the engine.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvalDisplay {
    /// Pawns from the side to move's point of view.
    pub evaluation: f32,
    pub label: String,
    pub arrows: Vec<(Move, u32)>,
    pub lines: Vec<String>,
    pub status: String,
}

impl Default for EvalDisplay {
    fn default() -> Self {
        Self {
            evaluation: 0.0,
            label: "+0.00".to_string(),
            arrows: Vec::new(),
            lines: Vec::new(),
            status: String::new(),
        }
    }
}

impl EvalDisplay {
    /// `Evaluation: +0.32`
    pub fn headline(&self) -> String {
        format!("Evaluation: {}", self.label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    Accepted,
    Discarded,
}

/// 有効トークンと表示状態を持ち、到着した結果を採用するか捨てるかを決める。
#[derive(Debug, Default)]
pub struct Reconciler {
    token: u64,
    display: EvalDisplay,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Issue the token for a new dispatch.
    pub fn next_token(&mut self) -> u64 {
        self.token += 1;
        self.token
    }

    /// Make every in-flight result stale.
    pub fn invalidate(&mut self) -> u64 {
        self.next_token()
    }

    pub fn display(&self) -> &EvalDisplay {
        &self.display
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.display.status = status.into();
    }

    pub fn reset_display(&mut self) {
        self.display = EvalDisplay::default();
    }

    /// Decide the fate of a worker message.
    ///
    /// Successful analyses are cached whether or not they are still current.
    /// Failures are never cached.
    pub fn reconcile(
        &mut self,
        message: EngineMessage,
        cursor: usize,
        cache: &mut EvalCache,
        pv_limit: usize,
    ) -> Reconciled {
        let current = message.token() == self.token && message.ply() == cursor;
        match message {
            EngineMessage::Analysis(result) => {
                cache.put(
                    result.key.clone(),
                    CachedEval {
                        analysis: result.analysis.clone(),
                        verdict: result.verdict.clone(),
                    },
                );
                if !current {
                    log::debug!(
                        "discarding stale analysis (token {} ply {}, live token {} cursor {})",
                        result.token,
                        result.ply,
                        self.token,
                        cursor
                    );
                    return Reconciled::Discarded;
                }
                self.show(&result.analysis, result.verdict.as_ref(), &result.position, pv_limit);
                Reconciled::Accepted
            }
            EngineMessage::Failed { token, ply, error } => {
                if !current {
                    log::debug!("discarding stale engine error (token {token} ply {ply})");
                    return Reconciled::Discarded;
                }
                self.display = EvalDisplay {
                    evaluation: 0.0,
                    label: "engine error".to_string(),
                    arrows: Vec::new(),
                    lines: vec![format!("Engine error: {}", first_line(&error.to_string()))],
                    status: STATUS_ENGINE_ERROR.to_string(),
                };
                Reconciled::Accepted
            }
        }
    }

    /// Render an analysis for `position` into the display.
    pub fn show(
        &mut self,
        analysis: &Analysis,
        verdict: Option<&MoveVerdict>,
        position: &Position,
        pv_limit: usize,
    ) {
        let mut lines = analysis.describe(position, pv_limit);
        if let Some(verdict) = verdict {
            lines.insert(0, verdict.summary());
        }
        self.display = EvalDisplay {
            evaluation: analysis.score.pawns(),
            label: analysis.score.label(),
            arrows: analysis.arrows(),
            lines,
            status: STATUS_UPDATED.to_string(),
        };
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("Unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::CandidateLine;
    use crate::cache::CacheKey;
    use crate::error::EngineError;
    use crate::review::request::AnalysisResult;
    use crate::types::Score;

    fn result(token: u64, ply: usize, cp: i32) -> EngineMessage {
        let position = Position::startpos();
        EngineMessage::Analysis(AnalysisResult {
            token,
            ply,
            key: CacheKey::new(position.fen(), 3),
            position,
            analysis: Analysis {
                score: Score::Cp(cp),
                depth: Some(14),
                lines: vec![CandidateLine {
                    rank: 1,
                    score: Score::Cp(cp),
                    depth: Some(14),
                    pv: vec![Move::from_uci("e2e4").unwrap()],
                }],
            },
            verdict: None,
        })
    }

    #[test]
    fn current_result_is_accepted_and_cached() {
        let mut rec = Reconciler::new();
        let mut cache = EvalCache::new(10);
        let token = rec.next_token();
        assert_eq!(rec.reconcile(result(token, 0, 32), 0, &mut cache, 6), Reconciled::Accepted);
        let display = rec.display();
        assert_eq!(display.label, "+0.32");
        assert_eq!(display.lines, vec!["Best: +0.32 (d14) - e4".to_string()]);
        assert_eq!(display.status, STATUS_UPDATED);
        assert!(cache.get(Position::startpos().fen(), 3).is_some());
    }

    #[test]
    fn invalidated_token_is_discarded_but_cached() {
        let mut rec = Reconciler::new();
        let mut cache = EvalCache::new(10);
        for _ in 0..5 {
            rec.next_token();
        }
        assert_eq!(rec.token(), 5);
        let before = rec.display().clone();
        assert_eq!(rec.invalidate(), 6);
        assert_eq!(rec.reconcile(result(5, 0, 32), 0, &mut cache, 6), Reconciled::Discarded);
        assert_eq!(rec.display(), &before);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn moved_cursor_discards_result() {
        let mut rec = Reconciler::new();
        let mut cache = EvalCache::new(10);
        let token = rec.next_token();
        assert_eq!(rec.reconcile(result(token, 3, 32), 1, &mut cache, 6), Reconciled::Discarded);
        assert_eq!(rec.display(), &EvalDisplay::default());
    }

    #[test]
    fn accepted_failure_shows_engine_error_without_caching() {
        let mut rec = Reconciler::new();
        let mut cache = EvalCache::new(10);
        let token = rec.next_token();
        let msg = EngineMessage::Failed {
            token,
            ply: 2,
            error: EngineError::Failure("pipe closed\ndetails".to_string()),
        };
        assert_eq!(rec.reconcile(msg, 2, &mut cache, 6), Reconciled::Accepted);
        assert_eq!(rec.display().label, "engine error");
        assert_eq!(rec.display().lines, vec!["Engine error: engine failure: pipe closed".to_string()]);
        assert_eq!(rec.display().status, STATUS_ENGINE_ERROR);
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_failure_is_dropped() {
        let mut rec = Reconciler::new();
        let mut cache = EvalCache::new(10);
        rec.next_token();
        let msg = EngineMessage::Failed {
            token: 0,
            ply: 0,
            error: EngineError::Failure("late".to_string()),
        };
        assert_eq!(rec.reconcile(msg, 0, &mut cache, 6), Reconciled::Discarded);
        assert_eq!(rec.display().status, "");
    }
}
