use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shakmaty::uci::UciMove;
use shakmaty::{Role, Square};

use crate::error::RulesError;

/// from/to マスと成り駒だけを持つ指し手。
///
/// 合法性はルールライブラリ側（[`crate::position::Position`]）でのみ検証し、
/// ここでは等価比較できる不透明なトークンとして扱う。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Move {
    from: Square,
    to: Square,
    promotion: Option<Role>,
}

impl Move {
    /// UCI 表記（`e2e4`, `e7e8q`）から生成する。
    pub fn from_uci(text: &str) -> Result<Self, RulesError> {
        let uci = UciMove::from_ascii(text.trim().as_bytes())
            .map_err(|_| RulesError::InvalidNotation(text.to_string()))?;
        Self::from_uci_move(uci).ok_or_else(|| RulesError::InvalidNotation(text.to_string()))
    }

    pub fn new(from: Square, to: Square, promotion: Option<Role>) -> Self {
        Self { from, to, promotion }
    }

    pub fn from_square(&self) -> Square {
        self.from
    }

    pub fn to_square(&self) -> Square {
        self.to
    }

    pub fn promotion(&self) -> Option<Role> {
        self.promotion
    }

    pub(crate) fn to_uci_move(self) -> UciMove {
        UciMove::Normal { from: self.from, to: self.to, promotion: self.promotion }
    }

    /// drop / null move は扱わない。
    pub(crate) fn from_uci_move(uci: UciMove) -> Option<Self> {
        match uci {
            UciMove::Normal { from, to, promotion } => Some(Self { from, to, promotion }),
            _ => None,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci_move())
    }
}

impl FromStr for Move {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uci(s)
    }
}

impl TryFrom<String> for Move {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_uci(&value)
    }
}

impl From<Move> for String {
    fn from(mv: Move) -> Self {
        mv.to_string()
    }
}
