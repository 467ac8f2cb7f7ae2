//! External engine access.
//!
//! [`Engine`] is the seam between the session lock and the actual process:
//! [`process::UciProcess`] talks UCI over pipes, tests plug in doubles.

pub mod discovery;
pub mod info;
pub mod process;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use crate::error::EngineError;

pub use discovery::find_engine;
pub use info::{InfoLine, InfoTable};
pub use process::{EngineConfig, UciProcess};
pub use session::EngineSession;

/// Raw outcome of one `go movetime` search.
#[derive(Clone, Debug, Default)]
pub struct SearchOutput {
    /// `bestmove` token as sent by the engine (`(none)` / `0000` included).
    pub bestmove: Option<String>,
    /// Final info per multipv rank, ordered.
    pub lines: Vec<InfoLine>,
    pub elapsed: Duration,
    /// `stop` had to be sent before `bestmove` arrived.
    pub timed_out: bool,
}

/// A chess engine that can be searched one call at a time.
pub trait Engine: Send {
    /// Search `fen` for `movetime` with `multipv` ranked lines.
    fn search(&mut self, fen: &str, movetime: Duration, multipv: u32)
    -> Result<SearchOutput, EngineError>;

    fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError>;

    fn new_game(&mut self) -> Result<(), EngineError>;

    /// Human readable name (`id name …`).
    fn name(&self) -> &str {
        "engine"
    }
}
