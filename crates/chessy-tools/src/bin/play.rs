/// Play against the engine on the terminal.
///
/// Enter moves in UCI (`e2e4`) or SAN (`Nf3`). Other commands: `hint`,
/// `undo`, `new`, `eval` (toggle live evaluation), `skill N`, `think SECS`,
/// `side white|black`, `save FILE`, `quit`.
use std::fs;
use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser as _;
use crossbeam_channel::select;

use chessy_core::play::{PlayConfig, PlaySession};
use chessy_core::{Color, Position, Settings};

use chessy_tools::cli::{EngineArgs, init_logging};

#[derive(clap::Parser, Debug)]
#[command(about = "play a game against a UCI engine")]
struct Cli {
    /// Play the black pieces
    #[arg(long)]
    black: bool,

    /// Engine think time per move in seconds
    #[arg(long)]
    think: Option<f64>,

    /// Engine skill level (0-20)
    #[arg(long)]
    skill: Option<u8>,

    /// Start from this FEN instead of the initial position
    #[arg(long)]
    fen: Option<String>,

    /// Disable the live evaluation bar
    #[arg(long)]
    no_eval: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// FEN の盤面部分を 8 行のテキストにする。
fn render_board(position: &Position, flip: bool) -> String {
    let placement = position.fen().split(' ').next().unwrap_or_default();
    let mut rows: Vec<(char, String)> = placement
        .split('/')
        .zip(('1'..='8').rev())
        .map(|(rank, label)| {
            let mut row = String::new();
            for c in rank.chars() {
                match c.to_digit(10) {
                    Some(n) => (0..n).for_each(|_| row.push_str(" .")),
                    None => {
                        row.push(' ');
                        row.push(c);
                    }
                }
            }
            (label, row)
        })
        .collect();
    let mut files = " a b c d e f g h".to_string();
    if flip {
        rows.reverse();
        for (_, row) in &mut rows {
            *row = row.chars().rev().collect::<String>();
            row.insert(0, ' ');
            row.pop();
        }
        files = files.chars().rev().collect::<String>();
        files.insert(0, ' ');
        files.pop();
    }
    let mut out = String::new();
    for (label, row) in rows {
        out.push_str(&format!("{label}{row}\n"));
    }
    out.push_str(&format!(" {files}\n"));
    out
}

fn show(session: &PlaySession, now: Instant) {
    let flip = session.player_color() == Color::Black;
    if let Ok(position) = session.current_position() {
        print!("{}", render_board(&position, flip));
    }
    let eval = session
        .evaluation()
        .map(|s| format!("  [{}]", s.label()))
        .unwrap_or_default();
    println!("{}{eval}", session.status_line());
    println!("{}", session.clock().summary(now));
    println!("{}", session.captured().summary());
    if let Some(hint) = session.hint() {
        println!("Hint: {hint}");
    }
}

fn save_game(session: &PlaySession, path: &Path) -> Result<()> {
    let date = Local::now().format("%Y.%m.%d").to_string();
    let text = session.to_pgn(&date).context("export game")?;
    fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
    log::info!("saved {}", path.display());
    Ok(())
}

fn parse_side(text: &str) -> Result<Color> {
    match text {
        "white" | "w" => Ok(Color::White),
        "black" | "b" => Ok(Color::Black),
        other => bail!("unknown side '{other}' (white or black)"),
    }
}

enum Outcome {
    Quit,
    Redraw,
    Quiet,
}

fn run_command(session: &mut PlaySession, command: &str, initial: &Position, now: Instant) -> Outcome {
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    let arg = arg.trim();
    match name {
        "" => Outcome::Quiet,
        "quit" | "q" => Outcome::Quit,
        "hint" => {
            if !session.request_hint() {
                println!("No hint available right now.");
            }
            Outcome::Quiet
        }
        "undo" => {
            session.undo(now);
            Outcome::Redraw
        }
        "new" => {
            session.start_from(initial.clone(), now);
            Outcome::Redraw
        }
        "eval" => {
            session.set_live_eval(!session.live_eval(), now);
            Outcome::Redraw
        }
        "skill" => {
            match arg.parse::<u8>() {
                Ok(level) => match session.set_skill_level(level) {
                    Ok(()) => println!("Skill level {}", level.min(20)),
                    Err(e) => println!("Engine error: {}", e.short_message()),
                },
                Err(_) => println!("usage: skill 0-20"),
            }
            Outcome::Quiet
        }
        "think" => {
            match arg.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => {
                    session.set_think_time(Duration::from_secs_f64(secs));
                    println!("Think time {secs}s");
                }
                _ => println!("usage: think SECONDS"),
            }
            Outcome::Quiet
        }
        "side" => match parse_side(arg) {
            Ok(color) => {
                session.set_player_color(color, now);
                Outcome::Redraw
            }
            Err(e) => {
                println!("{e}");
                Outcome::Quiet
            }
        },
        "save" if !arg.is_empty() => {
            if let Err(e) = save_game(session, Path::new(arg)) {
                println!("{e:#}");
            }
            Outcome::Quiet
        }
        _ => match session.player_move_text(command, now) {
            Ok(_) => Outcome::Redraw,
            Err(e) => {
                println!("{e}");
                Outcome::Quiet
            }
        },
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings: Settings = cli.engine.load_settings();
    if let Some(think) = cli.think {
        settings.think_time = think;
    }
    if let Some(skill) = cli.skill {
        settings.skill_level = skill;
    }
    let settings = settings.normalized();
    let initial = match &cli.fen {
        Some(fen) => Position::from_fen(fen).with_context(|| format!("bad --fen {fen}"))?,
        None => Position::startpos(),
    };

    let engine = cli.engine.require_session(&settings)?;
    let config = PlayConfig {
        player_color: if cli.black { Color::Black } else { Color::White },
        live_eval: !cli.no_eval,
        ..PlayConfig::from_settings(&settings)
    };
    let mut session = PlaySession::new(engine.clone(), config);
    session.start_from(initial.clone(), Instant::now());

    let (tx, lines) = crossbeam_channel::unbounded::<String>();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawn stdin reader")?;

    let messages = session.messages().clone();
    show(&session, Instant::now());
    let mut running = true;
    while running {
        let timer = match session.next_deadline() {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        };
        select! {
            recv(lines) -> line => {
                let outcome = match line {
                    Ok(line) => run_command(&mut session, line.trim(), &initial, Instant::now()),
                    Err(_) => Outcome::Quit,
                };
                match outcome {
                    Outcome::Quit => running = false,
                    Outcome::Redraw => show(&session, Instant::now()),
                    Outcome::Quiet => {}
                }
            }
            recv(messages) -> message => {
                if let Ok(message) = message {
                    if session.handle(message, Instant::now()) {
                        show(&session, Instant::now());
                    }
                }
            }
            recv(timer) -> _ => {
                session.tick(Instant::now());
            }
        }
    }
    drop(session);
    engine.shutdown();
    Ok(())
}
