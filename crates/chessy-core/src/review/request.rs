use std::time::Duration;

use crate::analysis::{Analysis, MoveVerdict};
use crate::cache::CacheKey;
use crate::engine::EngineSession;
use crate::error::EngineError;
use crate::position::Position;

/// 最短の直前局面解析時間。
pub const MIN_VERDICT_BUDGET: Duration = Duration::from_millis(100);

/// Snapshot handed to a worker thread.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub position: Position,
    pub breadth: u32,
    pub budget: Duration,
    pub token: u64,
    pub ply: usize,
    /// Position before the move that led to `position`, when the last move
    /// should be classified.
    pub previous: Option<Position>,
}

impl AnalysisRequest {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.position.fen(), self.breadth)
    }

    /// Run the request against the engine. Errors become a `Failed` message.
    pub fn execute(self, engine: &EngineSession) -> EngineMessage {
        let analysis = match engine.evaluate(&self.position, self.budget, self.breadth) {
            Ok(analysis) => analysis,
            Err(error) => {
                log::warn!("analysis of ply {} failed: {}", self.ply, error.short_message());
                return EngineMessage::Failed {
                    token: self.token,
                    ply: self.ply,
                    error,
                };
            }
        };
        let verdict = self.previous.as_ref().and_then(|before| {
            let budget = (self.budget / 2).max(MIN_VERDICT_BUDGET);
            match engine.evaluate(before, budget, 1) {
                Ok(pre) => Some(MoveVerdict::new(pre.score, analysis.score)),
                Err(e) => {
                    log::debug!("last-move classification skipped: {e}");
                    None
                }
            }
        });
        EngineMessage::Analysis(AnalysisResult {
            token: self.token,
            ply: self.ply,
            key: self.key(),
            position: self.position,
            analysis,
            verdict,
        })
    }
}

#[derive(Clone, Debug)]
pub struct AnalysisResult {
    pub token: u64,
    pub ply: usize,
    pub key: CacheKey,
    pub position: Position,
    pub analysis: Analysis,
    pub verdict: Option<MoveVerdict>,
}

/// ワーカーからイベントループへのメッセージ。
#[derive(Clone, Debug)]
pub enum EngineMessage {
    Analysis(AnalysisResult),
    Failed {
        token: u64,
        ply: usize,
        error: EngineError,
    },
}

impl EngineMessage {
    pub fn token(&self) -> u64 {
        match self {
            EngineMessage::Analysis(r) => r.token,
            EngineMessage::Failed { token, .. } => *token,
        }
    }

    pub fn ply(&self) -> usize {
        match self {
            EngineMessage::Analysis(r) => r.ply,
            EngineMessage::Failed { ply, .. } => *ply,
        }
    }
}

/// Lifecycle of the review's analysis request.
///
/// `Idle → Scheduled → Dispatched → Idle`; a scheduled request may be
/// cancelled back to `Idle`. Whether the result was accepted or discarded is
/// reported separately as [`super::Reconciled`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Scheduled,
    Dispatched,
}
