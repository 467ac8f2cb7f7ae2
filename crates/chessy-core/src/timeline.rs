//! Authoritative cursor over a game's move list.
//!
//! The cursor is the single source of truth for the displayed position. It is
//! only mutated on the event-loop thread; workers receive snapshots.

use std::collections::HashMap;

use crate::error::RulesError;
use crate::position::{Position, TerminalKind};
use crate::types::Move;

#[derive(Clone, Debug)]
pub struct Timeline {
    initial: Position,
    moves: Vec<Move>,
    cursor: usize,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(Position::startpos())
    }
}

impl Timeline {
    pub fn new(initial: Position) -> Self {
        Self {
            initial,
            moves: Vec::new(),
            cursor: 0,
        }
    }

    /// 全指し手を検証してから Timeline を作る。cursor は 0。
    pub fn with_moves(initial: Position, moves: Vec<Move>) -> Result<Self, RulesError> {
        let mut pos = initial.clone();
        for mv in &moves {
            pos = pos.apply(mv)?;
        }
        Ok(Self {
            initial,
            moves,
            cursor: 0,
        })
    }

    pub fn from_uci(initial: Position, moves: &[&str]) -> Result<Self, RulesError> {
        let parsed = moves
            .iter()
            .map(|s| Move::from_uci(s))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_moves(initial, parsed)
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn initial(&self) -> &Position {
        &self.initial
    }

    /// Move the cursor. Returns `true` when observers should refresh.
    pub fn jump(&mut self, index: usize) -> bool {
        let clamped = index.min(self.moves.len());
        if clamped == self.cursor {
            return false;
        }
        self.cursor = clamped;
        true
    }

    pub fn step(&mut self, delta: isize) -> bool {
        let target = self.cursor.saturating_add_signed(delta);
        self.jump(target)
    }

    /// Replace the move list and rewind to the start position.
    pub fn reset(&mut self, moves: Vec<Move>) {
        self.moves = moves;
        self.cursor = 0;
    }

    /// 初期局面と指し手列をまとめて入れ替える（FEN タグ付き PGN 用）。
    pub fn reset_from(&mut self, initial: Position, moves: Vec<Move>) {
        self.initial = initial;
        self.reset(moves);
    }

    /// Rebuild the position at `ply` by replaying moves `0..ply`.
    pub fn position_at(&self, ply: usize) -> Result<Position, RulesError> {
        let ply = ply.min(self.moves.len());
        let mut pos = self.initial.clone();
        for mv in &self.moves[..ply] {
            pos = pos.apply(mv)?;
        }
        Ok(pos)
    }

    pub fn current_position(&self) -> Result<Position, RulesError> {
        self.position_at(self.cursor)
    }

    /// The move that led to `ply` (`None` at the start position).
    pub fn move_into(&self, ply: usize) -> Option<Move> {
        ply.checked_sub(1).and_then(|i| self.moves.get(i).copied())
    }

    /// 対局中の着手。cursor は常に末尾に追従する。
    pub fn push(&mut self, mv: Move) -> Result<Position, RulesError> {
        let next = self.position_at(self.moves.len())?.apply(&mv)?;
        self.moves.push(mv);
        self.cursor = self.moves.len();
        Ok(next)
    }

    pub fn pop(&mut self) -> Option<Move> {
        let mv = self.moves.pop()?;
        self.cursor = self.cursor.min(self.moves.len());
        Some(mv)
    }

    /// SAN for every ply, in order.
    pub fn san_moves(&self) -> Result<Vec<String>, RulesError> {
        let mut pos = self.initial.clone();
        let mut out = Vec::with_capacity(self.moves.len());
        for mv in &self.moves {
            out.push(pos.san(mv)?);
            pos = pos.apply(mv)?;
        }
        Ok(out)
    }

    /// How often the position at `ply` has occurred up to and including it.
    pub fn repetitions_at(&self, ply: usize) -> Result<usize, RulesError> {
        let ply = ply.min(self.moves.len());
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut pos = self.initial.clone();
        *counts.entry(pos.repetition_key().to_string()).or_default() += 1;
        for mv in &self.moves[..ply] {
            pos = pos.apply(mv)?;
            *counts.entry(pos.repetition_key().to_string()).or_default() += 1;
        }
        Ok(counts.get(pos.repetition_key()).copied().unwrap_or(0))
    }

    /// Terminal state at the end of the move list, including threefold
    /// repetition.
    pub fn terminal(&self) -> Result<Option<TerminalKind>, RulesError> {
        let last = self.position_at(self.moves.len())?;
        if let Some(kind) = last.terminal() {
            return Ok(Some(kind));
        }
        if self.repetitions_at(self.moves.len())? >= 3 {
            return Ok(Some(TerminalKind::ThreefoldRepetition));
        }
        Ok(None)
    }

    /// UCI notation of the first `ply` moves, joined by spaces.
    pub fn uci_prefix(&self, ply: usize) -> String {
        self.moves
            .iter()
            .take(ply)
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Timeline {
        Timeline::from_uci(Position::startpos(), &["e2e4", "e7e5", "g1f3"]).unwrap()
    }

    #[test]
    fn jump_clamps_and_reports_change() {
        let mut tl = sample();
        assert_eq!(tl.cursor(), 0);
        assert!(tl.jump(2));
        assert_eq!(tl.cursor(), 2);
        assert!(!tl.jump(2));
        assert!(tl.jump(99));
        assert_eq!(tl.cursor(), 3);
        assert!(!tl.jump(3));
    }

    #[test]
    fn step_saturates_at_both_ends() {
        let mut tl = sample();
        assert!(!tl.step(-1));
        assert!(tl.step(1));
        assert!(tl.step(5));
        assert_eq!(tl.cursor(), 3);
        assert!(tl.step(-2));
        assert_eq!(tl.cursor(), 1);
    }

    #[test]
    fn reset_rewinds_cursor() {
        let mut tl = sample();
        tl.jump(3);
        tl.reset(vec![Move::from_uci("d2d4").unwrap()]);
        assert_eq!(tl.cursor(), 0);
        assert_eq!(tl.len(), 1);
        assert_eq!(
            tl.position_at(1).unwrap().fen(),
            "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1"
        );
    }

    #[test]
    fn position_is_replayed_from_start() {
        let tl = sample();
        assert_eq!(tl.position_at(0).unwrap(), Position::startpos());
        assert_eq!(
            tl.position_at(3).unwrap().fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
        assert_eq!(tl.move_into(0), None);
        assert_eq!(tl.move_into(3), Some(Move::from_uci("g1f3").unwrap()));
    }

    #[test]
    fn illegal_move_list_is_rejected() {
        assert!(Timeline::from_uci(Position::startpos(), &["e2e4", "e2e4"]).is_err());
    }

    #[test]
    fn push_and_pop_follow_the_end() {
        let mut tl = Timeline::default();
        tl.push(Move::from_uci("e2e4").unwrap()).unwrap();
        tl.push(Move::from_uci("c7c5").unwrap()).unwrap();
        assert_eq!(tl.cursor(), 2);
        assert_eq!(tl.pop(), Some(Move::from_uci("c7c5").unwrap()));
        assert_eq!(tl.cursor(), 1);
        assert!(tl.push(Move::from_uci("e4e6").unwrap()).is_err());
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn detects_threefold_repetition() {
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"];
        let tl = Timeline::from_uci(Position::startpos(), &shuffle).unwrap();
        assert_eq!(tl.repetitions_at(8).unwrap(), 3);
        assert_eq!(tl.terminal().unwrap(), Some(TerminalKind::ThreefoldRepetition));
        assert_eq!(tl.repetitions_at(4).unwrap(), 2);
    }

    #[test]
    fn san_moves_in_order() {
        let tl = sample();
        assert_eq!(tl.san_moves().unwrap(), vec!["e4", "e5", "Nf3"]);
        assert_eq!(tl.uci_prefix(2), "e2e4 e7e5");
    }
}
