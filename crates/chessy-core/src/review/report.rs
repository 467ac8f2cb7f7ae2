//! Full-game analysis report.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::analysis::{Analysis, MoveQuality};
use crate::cache::{CacheKey, EvalCache};
use crate::engine::EngineSession;
use crate::error::ReportError;
use crate::timeline::Timeline;
use crate::types::{Color, Move, Score, color_name};

/// 1局面あたりの解析時間。
pub const REPORT_BUDGET: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, Serialize)]
pub struct MoveReport {
    pub ply: usize,
    pub move_number: u32,
    pub side: &'static str,
    pub san: String,
    pub uci: Move,
    /// Mover's score before the move.
    pub before: Score,
    /// Opponent's score after the move.
    pub after: Score,
    pub change: f32,
    pub quality: MoveQuality,
    /// Engine's preferred move in SAN, when it differs from the played one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SideSummary {
    pub inaccuracies: usize,
    pub mistakes: usize,
    pub blunders: usize,
    /// Mean loss per move in pawns, losses only.
    pub average_loss: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening: Option<String>,
    pub moves: Vec<MoveReport>,
    pub white: SideSummary,
    pub black: SideSummary,
}

impl GameReport {
    pub fn render_text(&self) -> String {
        let mut out = String::from("=== Game Analysis ===\n\n");
        if let Some(opening) = &self.opening {
            let _ = writeln!(out, "Opening: {opening}\n");
        }
        for m in &self.moves {
            let _ = writeln!(out, "{}. {} ({}) - {}", m.ply + 1, m.san, m.side, m.quality);
            let _ = write!(out, "   Eval: {:+.2} -> {:+.2}", m.before.pawns(), m.after.pawns());
            if m.change < -0.5 {
                let _ = write!(out, " (Loss: {:.2})", m.change);
            }
            out.push('\n');
            if let Some(best) = m.best.as_ref().filter(|_| m.quality.is_error()) {
                let _ = writeln!(out, "   Best was {best}");
            }
            out.push('\n');
        }
        for (name, side) in [("White", &self.white), ("Black", &self.black)] {
            let _ = writeln!(
                out,
                "{name}: {} inaccuracies, {} mistakes, {} blunders (avg loss {:.2})",
                side.inaccuracies, side.mistakes, side.blunders, side.average_loss
            );
        }
        out.push_str("\n=== Analysis Complete ===\n");
        out
    }
}

fn evaluate_cached(
    engine: &EngineSession,
    cache: &mut EvalCache,
    position: &crate::position::Position,
    budget: Duration,
) -> Result<Analysis, ReportError> {
    if let Some(hit) = cache.get(position.fen(), 1) {
        return Ok(hit.analysis.clone());
    }
    let analysis = engine.evaluate(position, budget, 1)?;
    cache.put(CacheKey::new(position.fen(), 1), analysis.clone());
    Ok(analysis)
}

/// Analyse every move of `timeline`.
///
/// Each position is evaluated once; `progress(done, total)` is called after
/// every ply.
pub fn analyse_game(
    engine: &EngineSession,
    timeline: &Timeline,
    cache: &mut EvalCache,
    budget: Duration,
    mut progress: impl FnMut(usize, usize),
) -> Result<GameReport, ReportError> {
    let total = timeline.len();
    let mut moves = Vec::with_capacity(total);
    let mut position = timeline.initial().clone();
    let mut before = evaluate_cached(engine, cache, &position, budget)?;

    for (ply, mv) in timeline.moves().iter().enumerate() {
        let mover = position.turn();
        let move_number = position.fullmove_number();
        let san = position.san(mv)?;
        let best = before
            .best_move()
            .filter(|b| b != mv)
            .and_then(|b| position.san(&b).ok());
        let next = position.apply(mv)?;
        let after = evaluate_cached(engine, cache, &next, budget)?;
        let (quality, change) = MoveQuality::classify(before.score.pawns(), after.score.pawns());
        moves.push(MoveReport {
            ply,
            move_number,
            side: color_name(mover),
            san,
            uci: *mv,
            before: before.score,
            after: after.score,
            change,
            quality,
            best,
        });
        progress(ply + 1, total);
        position = next;
        before = after;
    }

    let white = summarize(&moves, color_name(Color::White));
    let black = summarize(&moves, color_name(Color::Black));
    let opening = crate::opening::detect(timeline.moves()).map(str::to_string);
    log::info!("analysed {total} plies");
    Ok(GameReport {
        opening,
        moves,
        white,
        black,
    })
}

fn summarize(moves: &[MoveReport], side: &str) -> SideSummary {
    let mut summary = SideSummary::default();
    let mut total_loss = 0.0f32;
    let mut count = 0usize;
    for m in moves.iter().filter(|m| m.side == side) {
        match m.quality {
            MoveQuality::Inaccuracy => summary.inaccuracies += 1,
            MoveQuality::Mistake => summary.mistakes += 1,
            MoveQuality::Blunder => summary.blunders += 1,
            _ => {}
        }
        if m.quality != MoveQuality::MateZone {
            total_loss += (-m.change).max(0.0);
            count += 1;
        }
    }
    if count > 0 {
        summary.average_loss = total_loss / count as f32;
    }
    summary
}
