//! Arguments and setup shared by the binaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Args;

use chessy_core::pgn::{self, PgnGame};
use chessy_core::settings::SETTINGS_FILE;
use chessy_core::{EngineConfig, EngineSession, Settings, find_engine};

pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// UCI engine binary (defaults to CHESSY_ENGINE, ./stockfish, then PATH)
    #[arg(long)]
    pub engine: Option<PathBuf>,

    /// Threads for the engine
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Hash size (MiB)
    #[arg(long, default_value_t = 64)]
    pub hash_mb: u32,

    /// Additional UCI options (format: "Name=Value", can be repeated)
    #[arg(long = "uci-option", num_args = 1)]
    pub uci_options: Vec<String>,

    /// Settings file
    #[arg(long, default_value = SETTINGS_FILE)]
    pub settings: PathBuf,
}

impl EngineArgs {
    pub fn load_settings(&self) -> Settings {
        Settings::load_or_default(&self.settings)
    }

    /// Start the engine. A missing engine yields an unavailable session so
    /// the caller can keep going without suggestions.
    pub fn spawn_session(&self, settings: &Settings) -> Arc<EngineSession> {
        let Some(path) = find_engine(self.engine.as_deref()) else {
            log::warn!("no UCI engine found; engine features are disabled");
            return Arc::new(EngineSession::unavailable());
        };
        let mut cfg = EngineConfig::new(path);
        cfg.threads = self.threads;
        cfg.hash_mb = self.hash_mb;
        cfg.skill_level = Some(settings.skill_level);
        cfg.options = self.uci_options.clone();
        Arc::new(EngineSession::spawn(&cfg))
    }

    /// Like [`Self::spawn_session`], but failing when there is no engine.
    pub fn require_session(&self, settings: &Settings) -> Result<Arc<EngineSession>> {
        let session = self.spawn_session(settings);
        if !session.is_available() {
            bail!("no usable UCI engine (use --engine or set CHESSY_ENGINE)");
        }
        Ok(session)
    }
}

/// Load game `index` (1-based) from a `.pgn` or `.pgn.gz` file.
pub fn load_pgn(path: &Path, index: usize) -> Result<PgnGame> {
    let text = crate::io::read_text(path).with_context(|| format!("read {}", path.display()))?;
    let mut games =
        pgn::parse_all(&text).with_context(|| format!("parse {}", path.display()))?;
    if index == 0 || index > games.len() {
        bail!("{} holds {} game(s); --game {index} is out of range", path.display(), games.len());
    }
    Ok(games.swap_remove(index - 1))
}
