//! Engine coordination core for the chessy chess GUI.
//!
//! - [`engine`]: UCI process management behind a session lock
//! - [`review`]: debounced, cached, token-reconciled analysis of a game
//! - [`play`]: games against the engine with hints, live evaluation and clocks
//! - [`pgn`], [`opening`], [`settings`]: game files, opening names, user settings

pub mod analysis;
pub mod cache;
pub mod clock;
pub mod engine;
pub mod error;
pub mod opening;
pub mod pgn;
pub mod play;
pub mod position;
pub mod review;
pub mod scheduler;
pub mod settings;
pub mod timeline;
pub mod types;

pub use analysis::{Analysis, CandidateLine, MoveQuality, MoveVerdict};
pub use cache::{CacheKey, EvalCache};
pub use engine::{EngineConfig, EngineSession, find_engine};
pub use error::{EngineError, PgnError, PlayError, ReportError, RulesError, SettingsError};
pub use position::{Captured, Position, TerminalKind};
pub use settings::Settings;
pub use timeline::Timeline;
pub use types::{Color, Move, Score};
