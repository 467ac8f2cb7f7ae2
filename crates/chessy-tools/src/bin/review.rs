/// Step through a game with live engine suggestions.
///
/// Commands on stdin: `n` / `p` (next / previous), `j N` (jump to ply N),
/// `drag N M ...` (slider drag through plies, analysed on release),
/// `best` (toggle best-move-only), `pv N` (number of lines), `q`.
///
/// ```shell
/// cargo run -p chessy-tools --bin chessy-review -- game.pgn --engine /usr/bin/stockfish
/// cargo run -p chessy-tools --bin chessy-review -- --fetch lichess --user alice
/// ```
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser as _;
use crossbeam_channel::Sender;

use chessy_core::pgn::PgnGame;
use chessy_core::review::{ReviewConfig, ReviewSession, UiEvent};

use chessy_tools::cli::{EngineArgs, init_logging, load_pgn};
use chessy_tools::history::{self, DEFAULT_LIMIT, Platform};

#[derive(clap::Parser, Debug)]
#[command(about = "review a game move by move with engine suggestions")]
struct Cli {
    /// PGN file (.pgn or .pgn.gz)
    pgn: Option<PathBuf>,

    /// Game number within the PGN file, or within the fetched list
    #[arg(long, default_value_t = 1)]
    game: usize,

    /// Fetch the game from a platform instead of a file
    #[arg(long, value_enum)]
    fetch: Option<Platform>,

    /// Platform username (defaults to the one in the settings file)
    #[arg(long)]
    user: Option<String>,

    /// Think time in seconds (the review budget is derived from it)
    #[arg(long)]
    think: Option<f64>,

    /// Number of candidate lines (1-5)
    #[arg(long)]
    multipv: Option<u32>,

    #[command(flatten)]
    engine: EngineArgs,
}

fn fetch_game(cli: &Cli, platform: Platform, settings: &chessy_core::Settings) -> Result<PgnGame> {
    let user = cli.user.clone().unwrap_or_else(|| match platform {
        Platform::Lichess => settings.lichess_username.clone(),
        Platform::ChessCom => settings.chesscom_username.clone(),
    });
    if user.trim().is_empty() {
        bail!("no {platform} username (use --user or set it in the settings file)");
    }
    let client = history::client()?;
    let games = history::fetch_recent_games(&client, platform, &user, DEFAULT_LIMIT.max(cli.game))?;
    let summary = games
        .get(cli.game.saturating_sub(1))
        .with_context(|| format!("{user} has fewer than {} recent games", cli.game))?;
    eprintln!("Reviewing {}", summary.label(cli.game));
    Ok(summary.game()?)
}

fn parse_command(line: &str, best_only: &mut bool) -> Result<Vec<UiEvent>, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(Vec::new());
    };
    let numbers = |words: std::str::SplitWhitespace<'_>| {
        words
            .map(|w| w.parse::<usize>().map_err(|_| format!("not a ply number: {w}")))
            .collect::<Result<Vec<_>, _>>()
    };
    let events = match cmd {
        "n" | "next" => vec![UiEvent::Step(1)],
        "p" | "prev" => vec![UiEvent::Step(-1)],
        "j" | "jump" => {
            let plies = numbers(words)?;
            let ply = plies.first().ok_or("usage: j N")?;
            vec![UiEvent::Jump(*ply)]
        }
        "drag" => {
            let plies = numbers(words)?;
            let mut events = vec![UiEvent::SliderPress];
            events.extend(plies.into_iter().map(UiEvent::Jump));
            events.push(UiEvent::SliderRelease);
            events
        }
        "best" => {
            *best_only = !*best_only;
            vec![UiEvent::SetBestOnly(*best_only)]
        }
        "pv" => {
            let n = numbers(words)?;
            let n = n.first().ok_or("usage: pv N")?;
            vec![UiEvent::SetMultipv(u32::try_from(*n).unwrap_or(u32::MAX))]
        }
        "q" | "quit" => vec![UiEvent::Exit],
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(events)
}

fn spawn_stdin_reader(tx: Sender<UiEvent>) -> Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let mut best_only = false;
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line, &mut best_only) {
                    Ok(events) => {
                        for event in events {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(msg) => eprintln!("{msg}"),
                }
            }
            let _ = tx.send(UiEvent::Exit);
        })
        .context("spawn stdin reader")?;
    Ok(())
}

fn print_state(session: &ReviewSession, last: &mut Option<(usize, String, Vec<String>)>) {
    let timeline = session.timeline();
    let display = session.display();
    let state = (timeline.cursor(), display.status.clone(), display.lines.clone());
    if last.as_ref() == Some(&state) {
        return;
    }
    let ply = timeline.cursor();
    let san = match timeline.move_into(ply) {
        Some(mv) => timeline
            .position_at(ply - 1)
            .and_then(|p| p.san(&mv))
            .unwrap_or_else(|_| mv.to_string()),
        None => "start".to_string(),
    };
    println!("[{ply}/{}] {san}  {}", timeline.len(), display.headline());
    for line in &display.lines {
        println!("  {line}");
    }
    if !display.status.is_empty() {
        println!("  ({})", display.status);
    }
    *last = Some(state);
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings = cli.engine.load_settings();
    if let Some(think) = cli.think {
        settings.think_time = think;
    }
    if let Some(multipv) = cli.multipv {
        settings.multipv_count = multipv;
    }
    let settings = settings.normalized();

    let game = match (&cli.pgn, cli.fetch) {
        (Some(path), _) => load_pgn(path, cli.game)?,
        (None, Some(platform)) => fetch_game(&cli, platform, &settings)?,
        (None, None) => bail!("give a PGN file or --fetch <platform>"),
    };
    eprintln!("{} - {} plies", game.title(), game.moves.len());

    let engine = cli.engine.spawn_session(&settings);
    let mut session = ReviewSession::new(engine.clone(), ReviewConfig::from_settings(&settings));
    session.open(game.initial.clone(), game.moves.clone(), Instant::now());

    let (tx, rx) = crossbeam_channel::unbounded();
    spawn_stdin_reader(tx)?;
    let mut last = None;
    session.run(&rx, |s| print_state(s, &mut last));
    engine.shutdown();
    Ok(())
}
