//! Opening names from a small built-in book.

use crate::types::Move;

/// これを超える手数では判定しない。
pub const MAX_OPENING_PLIES: usize = 15;

/// UCI move prefix → opening name.
const OPENING_BOOK: &[(&str, &str)] = &[
    ("e2e4", "King's Pawn Opening"),
    ("e2e4 e7e5", "Open Game"),
    ("e2e4 e7e5 g1f3 b8c6 f1b5", "Ruy Lopez"),
    ("e2e4 e7e5 g1f3 b8c6 f1c4", "Italian Game"),
    ("e2e4 e7e5 g1f3 b8c6 d2d4", "Scotch Game"),
    ("e2e4 e7e5 g1f3 f7f6", "Damiano Defense"),
    ("e2e4 e7e5 f1c4 g8f6", "Two Knights Defense"),
    ("e2e4 c7c5", "Sicilian Defense"),
    ("e2e4 c7c5 g1f3 d7d6 d2d4 c5d4 f3d4", "Sicilian: Open"),
    ("e2e4 c7c5 c2c3", "Sicilian: Alapin"),
    ("e2e4 c7c5 b1c3", "Sicilian: Closed"),
    ("e2e4 c7c6", "Caro-Kann Defense"),
    ("e2e4 e7e6", "French Defense"),
    ("e2e4 d7d5", "Scandinavian Defense"),
    ("e2e4 g8f6", "Alekhine's Defense"),
    ("e2e4 b8c6", "Nimzowitsch Defense"),
    ("d2d4", "Queen's Pawn Opening"),
    ("d2d4 d7d5", "Closed Game"),
    ("d2d4 d7d5 c2c4", "Queen's Gambit"),
    ("d2d4 d7d5 c2c4 d5c4", "Queen's Gambit Accepted"),
    ("d2d4 d7d5 c2c4 e7e6", "Queen's Gambit Declined"),
    ("d2d4 g8f6 c2c4 e7e6 b1c3 f8b4", "Nimzo-Indian Defense"),
    ("d2d4 g8f6 c2c4 g7g6", "King's Indian Defense"),
    ("d2d4 g8f6 c2c4 e7e6", "Indian Defense"),
    ("d2d4 g8f6", "Indian Game"),
    ("d2d4 f7f5", "Dutch Defense"),
    ("c2c4", "English Opening"),
    ("c2c4 e7e5", "English: Reversed Sicilian"),
    ("c2c4 g8f6", "English: Anglo-Indian"),
    ("g1f3", "Réti Opening"),
    ("g1f3 d7d5 c2c4", "Réti: Anglo-Slav"),
    ("g1f3 g8f6 c2c4", "English via Réti"),
    ("b2b3", "Larsen's Opening"),
    ("f2f4", "Bird's Opening"),
    ("e2e4 e7e5 g1f3 b8c6 f1b5 a7a6", "Ruy Lopez: Morphy Defense"),
    ("e2e4 e7e5 g1f3 b8c6 f1b5 g8f6", "Ruy Lopez: Berlin Defense"),
    ("e2e4 c7c5 g1f3 d7d6 d2d4", "Sicilian: Open Variation"),
    ("e2e4 c7c5 g1f3 b8c6", "Sicilian: Old Sicilian"),
    ("d2d4 d7d5 c2c4 c7c6", "Slav Defense"),
    ("d2d4 g8f6 c2c4 c7c5", "Benoni Defense"),
];

fn lookup(sequence: &str) -> Option<&'static str> {
    OPENING_BOOK
        .iter()
        .find(|(moves, _)| *moves == sequence)
        .map(|(_, name)| *name)
}

/// Longest book prefix of `moves`, for games of 1..=15 plies.
pub fn detect(moves: &[Move]) -> Option<&'static str> {
    if moves.is_empty() || moves.len() > MAX_OPENING_PLIES {
        return None;
    }
    let uci: Vec<String> = moves.iter().map(Move::to_string).collect();
    (1..=uci.len()).rev().find_map(|n| lookup(&uci[..n].join(" ")))
}

/// 直近に判定できたオープニング名を保持する。
#[derive(Clone, Debug, Default)]
pub struct OpeningTracker {
    current: Option<&'static str>,
}

impl OpeningTracker {
    /// Re-detect from the full move list, keeping the last name when
    /// nothing matches.
    pub fn update(&mut self, moves: &[Move]) -> Option<&'static str> {
        if let Some(name) = detect(moves) {
            self.current = Some(name);
        }
        self.current
    }

    pub fn current(&self) -> Option<&'static str> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(list: &str) -> Vec<Move> {
        list.split_whitespace().map(|m| Move::from_uci(m).unwrap()).collect()
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(detect(&moves("e2e4")), Some("King's Pawn Opening"));
        assert_eq!(detect(&moves("e2e4 e7e5 g1f3")), Some("Open Game"));
        assert_eq!(
            detect(&moves("e2e4 e7e5 g1f3 b8c6 f1b5 a7a6 b5a4")),
            Some("Ruy Lopez: Morphy Defense")
        );
        assert_eq!(detect(&moves("a2a3")), None);
        assert_eq!(detect(&[]), None);
    }

    #[test]
    fn long_games_are_not_detected() {
        let shuffle = "g1f3 g8f6 f3g1 f6g8 ".repeat(4);
        assert_eq!(detect(&moves(&shuffle)), None);
    }

    #[test]
    fn tracker_keeps_last_detected_name() {
        let mut tracker = OpeningTracker::default();
        assert_eq!(tracker.update(&moves("d2d4 d7d5 c2c4")), Some("Queen's Gambit"));
        assert_eq!(tracker.update(&moves("d2d4 d7d5 c2c4 h7h6")), Some("Queen's Gambit"));
        let long = moves(&"g1f3 g8f6 f3g1 f6g8 ".repeat(4));
        assert_eq!(tracker.update(&long), Some("Queen's Gambit"));
        tracker.reset();
        assert_eq!(tracker.current(), None);
    }
}
