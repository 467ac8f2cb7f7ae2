//! Rules adapter.
//!
//! Move generation, legality, terminal detection and SAN/FEN conversion are
//! delegated to `shakmaty`. [`Position`] only pairs a board with its
//! canonical FEN string, which is the identity used by the evaluation cache
//! and by the engine protocol.

use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position as _, Role};

use crate::error::RulesError;
use crate::types::{Color, Move};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// 終局の種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalKind {
    Checkmate { winner: Color },
    Stalemate,
    InsufficientMaterial,
    FiftyMoves,
    ThreefoldRepetition,
}

impl TerminalKind {
    /// PGN の Result タグ表記。
    pub fn result_tag(self) -> &'static str {
        match self {
            TerminalKind::Checkmate { winner: Color::White } => "1-0",
            TerminalKind::Checkmate { winner: Color::Black } => "0-1",
            _ => "1/2-1/2",
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalKind::Checkmate { winner } => {
                write!(f, "Checkmate! {} wins!", crate::types::color_name(*winner))
            }
            TerminalKind::Stalemate => write!(f, "Stalemate - Draw!"),
            TerminalKind::InsufficientMaterial => write!(f, "Draw - Insufficient material"),
            TerminalKind::FiftyMoves => write!(f, "Draw - Fifty move rule"),
            TerminalKind::ThreefoldRepetition => write!(f, "Draw - Threefold repetition"),
        }
    }
}

/// 初期配置の駒数と価値。キングは取られないので含めない。
const STARTING_MATERIAL: [(Role, usize, i32); 5] = [
    (Role::Pawn, 8, 1),
    (Role::Knight, 2, 3),
    (Role::Bishop, 2, 3),
    (Role::Rook, 2, 5),
    (Role::Queen, 1, 9),
];

/// 盤上から消えた駒。昇格で増えた駒は取られた駒を相殺しない。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Captured {
    /// Black pieces taken by White, as FEN letters (`pnb`).
    pub by_white: String,
    /// White pieces taken by Black (`PN`).
    pub by_black: String,
}

impl Captured {
    /// Material balance of the captures in pawns, positive when White is up.
    pub fn advantage(&self) -> i32 {
        value(&self.by_white) - value(&self.by_black)
    }

    /// `White took pn +2 | Black took P`
    pub fn summary(&self) -> String {
        let advantage = self.advantage();
        let side = |name: &str, taken: &str, lead: i32| {
            let taken = if taken.is_empty() { "-" } else { taken };
            if lead > 0 {
                format!("{name} took {taken} +{lead}")
            } else {
                format!("{name} took {taken}")
            }
        };
        format!(
            "{} | {}",
            side("White", &self.by_white, advantage),
            side("Black", &self.by_black, -advantage)
        )
    }
}

fn value(pieces: &str) -> i32 {
    pieces
        .chars()
        .filter_map(|c| {
            STARTING_MATERIAL
                .iter()
                .find(|(role, _, _)| role.char() == c.to_ascii_lowercase())
                .map(|(_, _, value)| *value)
        })
        .sum()
}

/// 不変の局面。指し手を適用すると新しい局面を返す。
#[derive(Clone, Debug)]
pub struct Position {
    chess: Chess,
    fen: String,
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.fen == other.fen
    }
}

impl Eq for Position {}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_chess(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, RulesError> {
        let invalid = |reason: String| RulesError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let setup: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        let chess: Chess = setup
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{e}")))?;
        Ok(Self::from_chess(chess))
    }

    fn from_chess(chess: Chess) -> Self {
        let fen = Fen::from_position(chess.clone(), EnPassantMode::Legal).to_string();
        Self { chess, fen }
    }

    /// Canonical FEN (legal en-passant squares only).
    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// 盤面・手番・キャスリング権・e.p. の4フィールド。千日手判定に使う。
    pub fn repetition_key(&self) -> &str {
        let mut end = self.fen.len();
        let mut spaces = 0;
        for (idx, ch) in self.fen.char_indices() {
            if ch == ' ' {
                spaces += 1;
                if spaces == 4 {
                    end = idx;
                    break;
                }
            }
        }
        &self.fen[..end]
    }

    pub fn turn(&self) -> Color {
        self.chess.turn()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.chess.fullmoves().get()
    }

    pub fn is_check(&self) -> bool {
        self.chess.is_check()
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        self.chess
            .legal_moves()
            .iter()
            .filter_map(|m| Move::from_uci_move(m.to_uci(CastlingMode::Standard)))
            .collect()
    }

    fn to_legal(&self, mv: &Move) -> Result<shakmaty::Move, RulesError> {
        mv.to_uci_move().to_move(&self.chess).map_err(|_| RulesError::IllegalMove {
            mv: mv.to_string(),
            fen: self.fen.clone(),
        })
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        self.to_legal(mv).is_ok()
    }

    /// Apply a move, returning the derived position.
    pub fn apply(&self, mv: &Move) -> Result<Position, RulesError> {
        let legal = self.to_legal(mv)?;
        let mut next = self.chess.clone();
        next.play_unchecked(&legal);
        Ok(Self::from_chess(next))
    }

    /// SAN with check (`+`) / mate (`#`) suffix.
    pub fn san(&self, mv: &Move) -> Result<String, RulesError> {
        let legal = self.to_legal(mv)?;
        let san = San::from_move(&self.chess, &legal);
        let mut next = self.chess.clone();
        next.play_unchecked(&legal);
        let suffix = if next.is_checkmate() {
            "#"
        } else if next.is_check() {
            "+"
        } else {
            ""
        };
        Ok(format!("{san}{suffix}"))
    }

    /// Resolve SAN (`Nf3`, `exd5`, `O-O`, `e8=Q+`) in this position.
    pub fn parse_san(&self, text: &str) -> Result<Move, RulesError> {
        let san: SanPlus =
            text.trim().parse().map_err(|_| RulesError::InvalidNotation(text.to_string()))?;
        let legal = san.san.to_move(&self.chess).map_err(|_| RulesError::IllegalMove {
            mv: text.to_string(),
            fen: self.fen.clone(),
        })?;
        Move::from_uci_move(legal.to_uci(CastlingMode::Standard))
            .ok_or_else(|| RulesError::InvalidNotation(text.to_string()))
    }

    /// UCI か SAN のどちらかで書かれた指し手を解釈し、合法手であることを保証する。
    pub fn parse_move(&self, text: &str) -> Result<Move, RulesError> {
        if let Ok(mv) = Move::from_uci(text) {
            if self.is_legal(&mv) {
                return Ok(mv);
            }
        }
        self.parse_san(text)
    }

    /// Terminal state detectable from the position alone.
    ///
    /// Threefold repetition needs the move history and is reported by
    /// [`crate::timeline::Timeline::terminal`].
    pub fn terminal(&self) -> Option<TerminalKind> {
        if self.chess.is_checkmate() {
            return Some(TerminalKind::Checkmate {
                winner: self.chess.turn().other(),
            });
        }
        if self.chess.is_stalemate() {
            return Some(TerminalKind::Stalemate);
        }
        if self.chess.is_insufficient_material() {
            return Some(TerminalKind::InsufficientMaterial);
        }
        if self.chess.halfmoves() >= 100 {
            return Some(TerminalKind::FiftyMoves);
        }
        None
    }

    /// Pieces missing from the board compared with the initial set-up.
    pub fn captured(&self) -> Captured {
        let board = self.chess.board();
        let mut captured = Captured::default();
        for (role, start, _) in STARTING_MATERIAL {
            for color in [Color::White, Color::Black] {
                let piece = role.of(color);
                let missing = start.saturating_sub(board.by_piece(piece).count());
                let taker = match color {
                    Color::White => &mut captured.by_black,
                    Color::Black => &mut captured.by_white,
                };
                taker.extend(std::iter::repeat_n(piece.char(), missing));
            }
        }
        captured
    }

    /// Convert a UCI line into SAN, stopping at the first move that does not
    /// apply.
    pub fn san_line(&self, moves: &[Move], limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut pos = self.clone();
        for mv in moves.iter().take(limit) {
            let Ok(san) = pos.san(mv) else { break };
            let Ok(next) = pos.apply(mv) else { break };
            out.push(san);
            pos = next;
        }
        out
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen)
    }
}
