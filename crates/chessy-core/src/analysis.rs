//! Engine analysis content and move-quality classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Position;
use crate::types::{MATE_THRESHOLD, Move, Score};

/// One ranked candidate (MultiPV line).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLine {
    /// 1-based MultiPV rank.
    pub rank: u32,
    pub score: Score,
    pub depth: Option<u32>,
    pub pv: Vec<Move>,
}

impl CandidateLine {
    pub fn first_move(&self) -> Option<Move> {
        self.pv.first().copied()
    }
}

/// Evaluation of one position: score of the best line plus ranked lines.
///
/// This is the content stored in the evaluation cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub score: Score,
    pub depth: Option<u32>,
    pub lines: Vec<CandidateLine>,
}

impl Analysis {
    pub fn best_move(&self) -> Option<Move> {
        self.lines.first().and_then(CandidateLine::first_move)
    }

    /// 候補手の矢印 (手, 順位)。
    pub fn arrows(&self) -> Vec<(Move, u32)> {
        self.lines
            .iter()
            .filter_map(|l| l.first_move().map(|m| (m, l.rank)))
            .collect()
    }

    /// Human readable lines, e.g. `Best: +0.32 (d18) - e4 e5 Nf3`.
    ///
    /// PVs are rendered in SAN from `position`, truncated to `pv_limit`
    /// moves.
    pub fn describe(&self, position: &Position, pv_limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        for line in &self.lines {
            let Some(first) = line.first_move() else {
                continue;
            };
            let san = position.san_line(&line.pv, pv_limit);
            let pv_text = if san.is_empty() {
                first.to_string()
            } else {
                san.join(" ")
            };
            let depth = line.depth.map(|d| format!(" (d{d})")).unwrap_or_default();
            let prefix = if line.rank == 1 {
                "Best".to_string()
            } else {
                format!("#{}", line.rank)
            };
            out.push(format!("{prefix}: {}{depth} - {pv_text}", line.score.label()));
        }
        if out.is_empty() {
            out.push("Engine did not return a principal variation.".to_string());
        }
        out
    }
}

/// 指し手の質。評価値の変化量（指した側から見た損得）で決める。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveQuality {
    Good,
    Equal,
    Inaccuracy,
    Mistake,
    Blunder,
    /// Either side of the move is in mate territory; not classified.
    MateZone,
}

impl MoveQuality {
    /// Classify a move from the mover's evaluation before it and the
    /// opponent-relative evaluation after it. Returns the quality and the
    /// evaluation change for the mover (negative = loss).
    pub fn classify(before: f32, after_for_opponent: f32) -> (MoveQuality, f32) {
        let change = -after_for_opponent - before;
        if before.abs() > MATE_THRESHOLD || after_for_opponent.abs() > MATE_THRESHOLD {
            return (MoveQuality::MateZone, change);
        }
        let quality = if change < -2.0 {
            MoveQuality::Blunder
        } else if change < -1.0 {
            MoveQuality::Mistake
        } else if change < -0.5 {
            MoveQuality::Inaccuracy
        } else if change > 0.5 {
            MoveQuality::Good
        } else {
            MoveQuality::Equal
        };
        (quality, change)
    }

    pub fn label(self) -> &'static str {
        match self {
            MoveQuality::Good => "Good",
            MoveQuality::Equal => "=",
            MoveQuality::Inaccuracy => "Inaccuracy",
            MoveQuality::Mistake => "Mistake",
            MoveQuality::Blunder => "Blunder",
            MoveQuality::MateZone => "OK",
        }
    }

    pub fn annotation(self) -> &'static str {
        match self {
            MoveQuality::Good => "!",
            MoveQuality::Equal | MoveQuality::MateZone => "",
            MoveQuality::Inaccuracy => "?!",
            MoveQuality::Mistake => "?",
            MoveQuality::Blunder => "??",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, MoveQuality::Inaccuracy | MoveQuality::Mistake | MoveQuality::Blunder)
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict on the move that led to a reviewed position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveVerdict {
    pub quality: MoveQuality,
    /// Mover's evaluation change in pawns.
    pub change: f32,
    /// Mover-relative score before the move.
    pub before: Score,
    /// Opponent-relative score after the move.
    pub after: Score,
}

impl MoveVerdict {
    pub fn new(before: Score, after: Score) -> Self {
        let (quality, change) = MoveQuality::classify(before.pawns(), after.pawns());
        Self {
            quality,
            change,
            before,
            after,
        }
    }

    /// `?! - Last move impact: -0.80 (from +0.30 to +0.50) - Inaccuracy`
    pub fn summary(&self) -> String {
        let icon = match self.quality.annotation() {
            "" => self.quality.label(),
            a => a,
        };
        format!(
            "{icon} - Last move impact: {:+.2} (from {} to {}) - {}",
            self.change,
            self.before.label(),
            self.after.label(),
            self.quality
        )
    }
}
