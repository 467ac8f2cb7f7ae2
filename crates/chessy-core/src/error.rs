//! Error types shared by the core crate.
//!
//! Stale engine results are deliberately absent: they are an expected outcome
//! of reconciliation (`review::Reconciled::Discarded`), not a failure.

use thiserror::Error;

/// Errors raised while talking to the external engine.
///
/// Both variants mean "no result" to callers. They are turned into status
/// messages at the worker boundary and never take down the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No engine process could be started or found, it was shut down, or it
    /// exited or stopped answering. The session drops the engine after this.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The call timed out or produced unusable output; the engine stays loaded.
    #[error("engine failure: {0}")]
    Failure(String),
}

impl EngineError {
    /// First line of the message, trimmed for one-line status displays.
    pub fn short_message(&self) -> String {
        let text = self.to_string();
        let first = text.lines().next().unwrap_or_default();
        first.chars().take(160).collect()
    }
}

/// Errors from the rules adapter around `shakmaty`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    #[error("cannot read move notation '{0}'")]
    InvalidNotation(String),
}

/// Malformed imported game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PgnError {
    #[error("PGN contains no moves or tags")]
    Empty,

    #[error("unterminated {0} in PGN")]
    Unterminated(&'static str),

    #[error("ply {ply}: cannot play '{token}': {source}")]
    Move {
        ply: usize,
        token: String,
        #[source]
        source: RulesError,
    },

    #[error("invalid FEN tag: {0}")]
    Setup(#[source] RulesError),
}

/// Rejected player input in play mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    #[error("the engine is thinking")]
    EngineThinking,

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the game is over: {0}")]
    GameOver(String),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Full-game analysis aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// Failures while loading or saving persisted settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
