/// List recent games from Lichess or Chess.com and optionally save them.
///
/// ```shell
/// cargo run -p chessy-tools --bin chessy-fetch -- lichess --user alice --save-dir games/
/// ```
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser as _;

use chessy_core::Settings;
use chessy_core::settings::SETTINGS_FILE;
use chessy_tools::cli::init_logging;
use chessy_tools::history::{self, DEFAULT_LIMIT, GameSummary, HistoryError, Platform};
use chessy_tools::io::open_writer;

#[derive(clap::Parser, Debug)]
#[command(about = "fetch recent games from an online platform")]
struct Cli {
    #[arg(value_enum)]
    platform: Platform,

    /// Username (defaults to the one in the settings file)
    #[arg(long)]
    user: Option<String>,

    /// Number of games
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Write each game as a PGN file into this directory
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Write the list as JSON ("-" for stdout, *.gz is compressed)
    #[arg(long)]
    json: Option<PathBuf>,

    /// Remember --user in the settings file
    #[arg(long)]
    remember: bool,

    /// Settings file
    #[arg(long, default_value = SETTINGS_FILE)]
    settings: PathBuf,
}

fn save_games(dir: &Path, platform: Platform, games: &[GameSummary]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let slug = match platform {
        Platform::Lichess => "lichess",
        Platform::ChessCom => "chesscom",
    };
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    for (i, game) in games.iter().enumerate() {
        let path = dir.join(format!("{slug}_{stamp}_{:02}.pgn", i + 1));
        fs::write(&path, &game.pgn).with_context(|| format!("write {}", path.display()))?;
        log::info!("saved {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings = Settings::load_or_default(&cli.settings);
    let user = match (&cli.user, cli.platform) {
        (Some(user), _) => user.trim().to_string(),
        (None, Platform::Lichess) => settings.lichess_username.clone(),
        (None, Platform::ChessCom) => settings.chesscom_username.clone(),
    };
    if user.is_empty() {
        bail!("no {} username (use --user or set it in the settings file)", cli.platform);
    }

    let client = history::client()?;
    let games = match history::fetch_recent_games(&client, cli.platform, &user, cli.limit) {
        Ok(games) => games,
        Err(HistoryError::NotFound(name)) => {
            bail!("User '{name}' not found on {}. Please check the username.", cli.platform)
        }
        Err(e) => return Err(e).context(format!("fetch games from {}", cli.platform)),
    };

    if games.is_empty() {
        println!("No recent games found for {user}.");
    }
    for (i, game) in games.iter().enumerate() {
        let date = game.date.as_deref().unwrap_or("????-??-??");
        println!("{date}  {}", game.label(i + 1));
    }

    if let Some(dir) = &cli.save_dir {
        save_games(dir, cli.platform, &games)?;
    }
    if let Some(path) = &cli.json {
        let mut out = open_writer(path).with_context(|| format!("open {}", path.display()))?;
        serde_json::to_writer_pretty(&mut out, &games)?;
        writeln!(out)?;
        out.close()?;
    }
    if cli.remember && cli.user.is_some() {
        match cli.platform {
            Platform::Lichess => settings.lichess_username = user,
            Platform::ChessCom => settings.chesscom_username = user,
        }
        settings.save(&cli.settings).context("save settings")?;
    }
    Ok(())
}
