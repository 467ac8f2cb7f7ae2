//! Drives `UciProcess` against small shell scripts that speak UCI.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chessy_core::engine::{Engine, UciProcess};
use chessy_core::{EngineConfig, EngineError, EngineSession, Move, Position, Score};

const HANDSHAKE: &str = r#"
    uci)
      echo "id name FakeFish 1.0"
      echo "option name Hash type spin default 16 min 1 max 1024"
      echo "option name MultiPV type spin default 1 min 1 max 5"
      echo "option name Skill Level type spin default 20 min 0 max 20"
      echo "uciok" ;;
    isready) echo "readyok" ;;
    quit) exit 0 ;;"#;

fn write_engine(dir: &Path, on_go: &str, on_stop: &str) -> PathBuf {
    let path = dir.join("fakefish.sh");
    let script = format!(
        "#!/bin/sh\nwhile read -r cmd rest; do\n  case \"$cmd\" in{HANDSHAKE}\n    go) {on_go} ;;\n    stop) {on_stop} ;;\n  esac\ndone\n"
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn config(path: PathBuf) -> EngineConfig {
    let mut cfg = EngineConfig::new(path);
    cfg.ready_timeout = Duration::from_secs(5);
    cfg.timeout_margin = Duration::from_millis(100);
    cfg
}

#[test]
fn handshake_and_multipv_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(
        dir.path(),
        "echo \"info string hello\"; \
         echo \"info depth 10 multipv 1 score cp 25 nodes 1000 pv e2e4 e7e5\"; \
         echo \"info depth 10 multipv 2 score cp 10 pv d2d4 d7d5\"; \
         echo \"bestmove e2e4 ponder e7e5\"",
        ":",
    );
    let mut engine = UciProcess::spawn(&config(path)).unwrap();
    assert_eq!(engine.name(), "FakeFish 1.0");
    assert!(engine.supports_option("Skill Level"));
    assert!(!engine.supports_option("Threads"));

    let out = engine
        .search(Position::startpos().fen(), Duration::from_millis(50), 2)
        .unwrap();
    assert_eq!(out.bestmove.as_deref(), Some("e2e4"));
    assert!(!out.timed_out);
    assert_eq!(out.lines.len(), 2);
    assert_eq!(out.lines[0].score, Some(Score::Cp(25)));
    assert_eq!(out.lines[1].pv, vec!["d2d4".to_string(), "d7d5".to_string()]);
}

#[test]
fn session_evaluates_and_plays() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(
        dir.path(),
        "echo \"info depth 8 multipv 1 score mate 3 pv e2e4\"; echo \"bestmove e2e4\"",
        ":",
    );
    let session = EngineSession::spawn(&config(path));
    assert!(session.is_available());

    let analysis = session
        .evaluate(&Position::startpos(), Duration::from_millis(50), 1)
        .unwrap();
    assert_eq!(analysis.score, Score::Mate(3));
    assert_eq!(analysis.best_move(), Some(Move::from_uci("e2e4").unwrap()));

    let mv = session.play(&Position::startpos(), Duration::from_millis(50)).unwrap();
    assert_eq!(mv.to_string(), "e2e4");
    session.configure(5).unwrap();
    session.shutdown();
    assert!(!session.is_available());
}

#[test]
fn stop_is_sent_after_movetime() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(
        dir.path(),
        "echo \"info depth 1 score cp 5 pv g1f3\"",
        "echo \"bestmove g1f3\"",
    );
    let mut engine = UciProcess::spawn(&config(path)).unwrap();
    let out = engine
        .search(Position::startpos().fen(), Duration::from_millis(20), 1)
        .unwrap();
    assert!(out.timed_out);
    assert_eq!(out.bestmove.as_deref(), Some("g1f3"));
}

#[test]
fn silent_engine_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(dir.path(), ":", ":");
    let mut engine = UciProcess::spawn(&config(path)).unwrap();
    let err = engine
        .search(Position::startpos().fen(), Duration::from_millis(20), 1)
        .unwrap_err();
    assert!(matches!(err, EngineError::Failure(_)));
}

#[test]
fn engine_without_uciok_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.sh");
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    let err = UciProcess::spawn(&config(path.clone())).err().unwrap();
    assert!(matches!(err, EngineError::Unavailable(_)));
    assert!(!EngineSession::spawn(&config(path)).is_available());
}

#[test]
fn late_bestmove_is_not_taken_for_the_next_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(
        dir.path(),
        "n=$((n+1)); \
         if [ \"$n\" -eq 1 ]; then sleep 1; echo \"bestmove a2a3\"; \
         else echo \"bestmove e2e4\"; fi",
        ":",
    );
    let mut engine = UciProcess::spawn(&config(path)).unwrap();
    let err = engine
        .search(Position::startpos().fen(), Duration::from_millis(20), 1)
        .unwrap_err();
    assert!(matches!(err, EngineError::Failure(_)));

    let out = engine
        .search(Position::startpos().fen(), Duration::from_millis(20), 1)
        .unwrap();
    assert_eq!(out.bestmove.as_deref(), Some("e2e4"));
}

#[test]
fn unresponsive_engine_is_dropped_by_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(dir.path(), ":", ":");
    let mut cfg = config(path);
    cfg.ready_timeout = Duration::from_secs(1);
    let session = EngineSession::spawn(&cfg);
    let pos = Position::startpos();

    let first = session.evaluate(&pos, Duration::from_millis(20), 1).unwrap_err();
    assert!(matches!(first, EngineError::Failure(_)));
    assert!(session.is_available());

    let second = session.evaluate(&pos, Duration::from_millis(20), 1).unwrap_err();
    assert!(matches!(second, EngineError::Unavailable(_)));
    assert!(!session.is_available());
}

#[test]
fn engine_exit_makes_the_session_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine(dir.path(), "exit 0", ":");
    let session = EngineSession::spawn(&config(path));
    assert!(session.is_available());

    let err = session.play(&Position::startpos(), Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)), "{err}");
    assert!(!session.is_available());
    assert!(matches!(
        session.evaluate(&Position::startpos(), Duration::from_millis(50), 1),
        Err(EngineError::Unavailable(_))
    ));
}
