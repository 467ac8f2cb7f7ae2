/// Full-game analysis report for a PGN game.
///
/// ```shell
/// cargo run -p chessy-tools --release --bin chessy-analyze -- game.pgn --format json --out report.json.gz
/// ```
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser as _;
use indicatif::{ProgressBar, ProgressStyle};

use chessy_core::EvalCache;
use chessy_core::review::analyse_game;
use chessy_core::review::report::REPORT_BUDGET;

use chessy_tools::cli::{EngineArgs, init_logging, load_pgn};
use chessy_tools::io::open_writer;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

#[derive(clap::Parser, Debug)]
#[command(about = "classify every move of a game with the engine")]
struct Cli {
    /// PGN file (.pgn or .pgn.gz)
    pgn: PathBuf,

    /// Game number within the file
    #[arg(long, default_value_t = 1)]
    game: usize,

    /// Analysis time per position in milliseconds
    #[arg(long, default_value_t = REPORT_BUDGET.as_millis() as u64)]
    movetime: u64,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Output file ("-" for stdout, *.gz is compressed)
    #[arg(long, default_value = "-")]
    out: PathBuf,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let game = load_pgn(&cli.pgn, cli.game)?;
    let timeline = game.timeline();
    let settings = cli.engine.load_settings();
    let engine = cli.engine.require_session(&settings)?;

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(timeline.len() as u64)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} plies")
            .context("progress template")?,
    );

    let mut cache = EvalCache::default();
    let report = analyse_game(
        &engine,
        &timeline,
        &mut cache,
        Duration::from_millis(cli.movetime.max(1)),
        |done, _total| progress.set_position(done as u64),
    )
    .with_context(|| format!("analyse {}", game.title()))?;
    progress.finish_and_clear();
    engine.shutdown();

    let mut out = open_writer(&cli.out).with_context(|| format!("open {}", cli.out.display()))?;
    match cli.format {
        Format::Text => {
            writeln!(out, "{}\n", game.title())?;
            write!(out, "{}", report.render_text())?;
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, &report)?;
            writeln!(out)?;
        }
    }
    out.close().with_context(|| format!("close {}", cli.out.display()))?;
    Ok(())
}
