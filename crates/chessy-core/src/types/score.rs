use std::fmt;

use serde::{Deserialize, Serialize};

/// 詰みスコアを評価バー上で表す値（ポーン単位）。
pub const MATE_EVAL: f32 = 100.0;

/// 評価値がこの絶対値を超えたら詰み圏内とみなし、指し手分類を行わない。
pub const MATE_THRESHOLD: f32 = 50.0;

/// Engine score from the point of view of the side to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    /// Centipawns.
    Cp(i32),
    /// Signed mate distance in moves; negative or zero means being mated.
    Mate(i32),
}

impl Default for Score {
    fn default() -> Self {
        Score::Cp(0)
    }
}

impl Score {
    /// `score cp` / `score mate` の値から生成する。mate が優先される。
    pub fn from_parts(cp: Option<i32>, mate: Option<i32>) -> Option<Self> {
        match (mate, cp) {
            (Some(m), _) => Some(Score::Mate(m)),
            (None, Some(c)) => Some(Score::Cp(c)),
            (None, None) => None,
        }
    }

    /// Evaluation in pawns, mate clamped to `±MATE_EVAL`.
    pub fn pawns(self) -> f32 {
        match self {
            Score::Cp(cp) => cp as f32 / 100.0,
            Score::Mate(m) if m > 0 => MATE_EVAL,
            Score::Mate(_) => -MATE_EVAL,
        }
    }

    /// The same score seen from the other side.
    pub fn flipped(self) -> Self {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(m) => Score::Mate(-m),
        }
    }

    /// Short label used by the evaluation display: `+0.32`, `#3`, `#-2`.
    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Score::Cp(_) => write!(f, "{:+.2}", self.pawns()),
            Score::Mate(m) if m > 0 => write!(f, "#{m}"),
            Score::Mate(m) => write!(f, "#-{}", m.unsigned_abs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centipawns_convert_to_pawns_and_label() {
        assert_eq!(Score::Cp(34).pawns(), 0.34);
        assert_eq!(Score::Cp(34).label(), "+0.34");
        assert_eq!(Score::Cp(-150).label(), "-1.50");
        assert_eq!(Score::Cp(0).label(), "+0.00");
    }

    #[test]
    fn mate_scores_clamp_to_mate_eval() {
        assert_eq!(Score::Mate(3).pawns(), MATE_EVAL);
        assert_eq!(Score::Mate(-2).pawns(), -MATE_EVAL);
        assert_eq!(Score::Mate(3).label(), "#3");
        assert_eq!(Score::Mate(-2).label(), "#-2");
        // 既に詰まされている局面は mate 0
        assert_eq!(Score::Mate(0).pawns(), -MATE_EVAL);
    }

    #[test]
    fn mate_takes_precedence_over_cp() {
        assert_eq!(Score::from_parts(Some(12), Some(4)), Some(Score::Mate(4)));
        assert_eq!(Score::from_parts(Some(12), None), Some(Score::Cp(12)));
        assert_eq!(Score::from_parts(None, None), None);
    }

    #[test]
    fn flipping_negates() {
        assert_eq!(Score::Cp(25).flipped(), Score::Cp(-25));
        assert_eq!(Score::Mate(2).flipped(), Score::Mate(-2));
    }
}
