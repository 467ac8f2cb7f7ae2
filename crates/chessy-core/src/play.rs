//! Play mode: a live game against the engine.
//!
//! Engine replies, hints and live evaluations run on short-lived worker
//! threads and come back as [`PlayMessage`]s. A message is applied only if
//! its token is still live and the game has not moved on since dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::clock::GameClock;
use crate::engine::EngineSession;
use crate::error::{EngineError, PlayError, RulesError};
use crate::opening::OpeningTracker;
use crate::pgn;
use crate::position::{Captured, Position, TerminalKind};
use crate::scheduler::Throttle;
use crate::settings::Settings;
use crate::timeline::Timeline;
use crate::types::{Color, Move, Score, color_name};

pub const ENGINE_ERROR_STATUS: &str = "Engine error - reload Stockfish to continue.";
pub const HINT_BUDGET: Duration = Duration::from_millis(500);
pub const LIVE_EVAL_BUDGET: Duration = Duration::from_millis(300);
const MIN_THINK: Duration = Duration::from_millis(100);
const MAX_THINK: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct PlayConfig {
    pub think_time: Duration,
    pub player_color: Color,
    pub live_eval: bool,
    /// ライブ評価をエンジン思考中は止める。
    pub pause_eval_on_ai: bool,
    pub skill_level: u8,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            think_time: Duration::from_secs(1),
            player_color: Color::White,
            live_eval: true,
            pause_eval_on_ai: true,
            skill_level: 20,
        }
    }
}

impl PlayConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            think_time: settings.think_duration(),
            skill_level: settings.skill_level,
            ..Self::default()
        }
    }

    /// Engine think time clamped to `[0.1s, 10s]`.
    pub fn engine_budget(&self) -> Duration {
        self.think_time.clamp(MIN_THINK, MAX_THINK)
    }
}

/// ワーカーからの応答。`ply` は依頼時点の手数。
#[derive(Clone, Debug)]
pub enum PlayMessage {
    EngineMove {
        token: u64,
        ply: usize,
        result: Result<Move, EngineError>,
    },
    Hint {
        token: u64,
        ply: usize,
        result: Result<Move, EngineError>,
    },
    Evaluation {
        token: u64,
        ply: usize,
        result: Result<Score, EngineError>,
    },
}

impl PlayMessage {
    fn stamp(&self) -> (u64, usize) {
        match self {
            PlayMessage::EngineMove { token, ply, .. }
            | PlayMessage::Hint { token, ply, .. }
            | PlayMessage::Evaluation { token, ply, .. } => (*token, *ply),
        }
    }
}

pub struct PlaySession {
    engine: Arc<EngineSession>,
    config: PlayConfig,
    timeline: Timeline,
    token: u64,
    ai_thinking: bool,
    hint: Option<Move>,
    evaluation: Option<Score>,
    status: Option<String>,
    game_over: Option<TerminalKind>,
    opening: OpeningTracker,
    clock: GameClock,
    throttle: Throttle,
    tx: Sender<PlayMessage>,
    rx: Receiver<PlayMessage>,
}

impl PlaySession {
    pub fn new(engine: Arc<EngineSession>, config: PlayConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            engine,
            config,
            timeline: Timeline::default(),
            token: 0,
            ai_thinking: false,
            hint: None,
            evaluation: None,
            status: None,
            game_over: None,
            opening: OpeningTracker::default(),
            clock: GameClock::default(),
            throttle: Throttle::default(),
            tx,
            rx,
        }
    }

    /// Start a fresh game from the standard position.
    pub fn new_game(&mut self, now: Instant) {
        self.start_from(Position::startpos(), now);
    }

    /// Start a game from `initial`. In-flight replies are dropped; the
    /// engine moves first when it has the move.
    pub fn start_from(&mut self, initial: Position, now: Instant) {
        self.token += 1;
        self.timeline = Timeline::new(initial);
        self.ai_thinking = false;
        self.hint = None;
        self.evaluation = None;
        self.status = None;
        self.opening.reset();
        self.clock.reset();
        self.throttle.cancel();
        self.reset_engine();
        self.game_over = self.detect_game_over();
        log::info!("new game, player has {}", color_name(self.config.player_color));
        self.after_move(now);
    }

    /// `ucinewgame` off the event loop; the engine may still be busy with a
    /// dropped reply.
    fn reset_engine(&self) {
        if !self.engine.is_available() {
            return;
        }
        let engine = Arc::clone(&self.engine);
        let spawned = std::thread::Builder::new().name("new-game".to_string()).spawn(move || {
            if let Err(e) = engine.new_game() {
                log::warn!("ucinewgame failed: {e}");
            }
        });
        if let Err(e) = spawned {
            log::warn!("failed to start new-game worker: {e}");
        }
    }

    pub fn player_color(&self) -> Color {
        self.config.player_color
    }

    /// Switch sides and start over.
    pub fn set_player_color(&mut self, color: Color, now: Instant) {
        self.config.player_color = color;
        self.new_game(now);
    }

    pub fn live_eval(&self) -> bool {
        self.config.live_eval
    }

    pub fn set_live_eval(&mut self, enabled: bool, now: Instant) {
        self.config.live_eval = enabled;
        if enabled {
            self.schedule_evaluation(now);
        } else {
            self.throttle.cancel();
        }
    }

    pub fn set_think_time(&mut self, think_time: Duration) {
        self.config.think_time = think_time;
    }

    pub fn set_skill_level(&mut self, level: u8) -> Result<(), EngineError> {
        self.config.skill_level = level.min(20);
        self.engine.configure(self.config.skill_level)
    }

    /// Play the human move (UCI or SAN already resolved to a [`Move`]).
    pub fn player_move(&mut self, mv: Move, now: Instant) -> Result<(), PlayError> {
        if let Some(kind) = self.game_over {
            return Err(PlayError::GameOver(kind.to_string()));
        }
        if self.ai_thinking {
            return Err(PlayError::EngineThinking);
        }
        if self.side_to_move() != self.config.player_color {
            return Err(PlayError::NotYourTurn);
        }
        self.timeline.push(mv)?;
        self.hint = None;
        self.after_move(now);
        Ok(())
    }

    /// Parse `text` (UCI or SAN) against the current position and play it.
    pub fn player_move_text(&mut self, text: &str, now: Instant) -> Result<Move, PlayError> {
        let mv = self.current_position()?.parse_move(text)?;
        self.player_move(mv, now)?;
        Ok(mv)
    }

    fn after_move(&mut self, now: Instant) {
        self.opening.update(self.timeline.moves());
        self.game_over = self.detect_game_over();
        if let Some(kind) = self.game_over {
            log::info!("game over: {kind}");
            self.ai_thinking = false;
            self.clock.stop(now);
            self.throttle.cancel();
            return;
        }
        self.clock.start(self.side_to_move(), now);
        if self.side_to_move() != self.config.player_color && self.engine.is_available() {
            self.request_engine_move();
        }
        if !(self.ai_thinking && self.config.pause_eval_on_ai) {
            self.schedule_evaluation(now);
        }
    }

    fn request_engine_move(&mut self) {
        let Ok(position) = self.current_position() else {
            return;
        };
        let budget = self.config.engine_budget();
        let (token, ply) = (self.token, self.timeline.len());
        self.ai_thinking = self.spawn_worker("engine-move", move |engine| PlayMessage::EngineMove {
            token,
            ply,
            result: engine.play(&position, budget),
        });
        if !self.ai_thinking {
            self.status = Some(ENGINE_ERROR_STATUS.to_string());
        }
    }

    /// Ask for a hint for the player. Returns `false` when no request was
    /// made.
    pub fn request_hint(&mut self) -> bool {
        if self.ai_thinking || self.game_over.is_some() || !self.engine.is_available() {
            return false;
        }
        let Ok(position) = self.current_position() else {
            return false;
        };
        let (token, ply) = (self.token, self.timeline.len());
        self.spawn_worker("hint", move |engine| PlayMessage::Hint {
            token,
            ply,
            result: engine.play(&position, HINT_BUDGET),
        })
    }

    fn schedule_evaluation(&mut self, now: Instant) {
        if self.config.live_eval && self.game_over.is_none() {
            self.throttle.request(now);
        }
    }

    /// Fire a throttled live evaluation when due.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.throttle.poll(now) {
            return false;
        }
        if !self.engine.is_available() || self.game_over.is_some() {
            return false;
        }
        if self.config.pause_eval_on_ai && self.ai_thinking {
            return false;
        }
        let Ok(position) = self.current_position() else {
            return false;
        };
        let (token, ply) = (self.token, self.timeline.len());
        self.spawn_worker("live-eval", move |engine| PlayMessage::Evaluation {
            token,
            ply,
            result: engine.evaluate(&position, LIVE_EVAL_BUDGET, 1).map(|a| a.score),
        })
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.throttle.deadline()
    }

    fn spawn_worker(
        &self,
        name: &str,
        job: impl FnOnce(&EngineSession) -> PlayMessage + Send + 'static,
    ) -> bool {
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        let spawned = std::thread::Builder::new().name(name.to_string()).spawn(move || {
            let _ = tx.send(job(&engine));
        });
        if let Err(e) = spawned {
            log::error!("failed to start {name} worker: {e}");
            return false;
        }
        true
    }

    /// Apply a worker message. Returns `true` when the game state changed.
    pub fn handle(&mut self, message: PlayMessage, now: Instant) -> bool {
        let (token, ply) = message.stamp();
        if token != self.token || ply != self.timeline.len() {
            log::debug!("dropping stale play message (token {token} ply {ply})");
            return false;
        }
        match message {
            PlayMessage::EngineMove { result, .. } => {
                self.ai_thinking = false;
                let pushed = result.and_then(|mv| {
                    self.timeline
                        .push(mv)
                        .map(|_| ())
                        .map_err(|e| EngineError::Failure(e.to_string()))
                });
                match pushed {
                    Ok(()) => {
                        self.hint = None;
                        self.status = None;
                        self.after_move(now);
                    }
                    Err(e) => {
                        log::error!("Stockfish failed to move: {e}");
                        self.clock.stop(now);
                        self.status = Some(ENGINE_ERROR_STATUS.to_string());
                    }
                }
            }
            PlayMessage::Hint { result, .. } => match result {
                Ok(mv) => self.hint = Some(mv),
                Err(e) => self.status = Some(format!("Hint unavailable: {}", e.short_message())),
            },
            PlayMessage::Evaluation { result, .. } => match result {
                Ok(score) => self.evaluation = Some(score),
                Err(e) => {
                    log::warn!("Evaluation error: {e}");
                    return false;
                }
            },
        }
        true
    }

    /// Take back the last move pair (one ply while the engine is thinking
    /// or when only one move exists). The restored position is handled like
    /// a fresh move: live evaluation is rescheduled and the engine replies
    /// if it has the move.
    pub fn undo(&mut self, now: Instant) -> bool {
        if self.timeline.is_empty() {
            return false;
        }
        self.token += 1;
        self.timeline.pop();
        if !self.ai_thinking && !self.timeline.is_empty() {
            self.timeline.pop();
        }
        self.ai_thinking = false;
        self.hint = None;
        self.evaluation = None;
        self.status = None;
        self.throttle.cancel();
        self.opening.reset();
        self.after_move(now);
        true
    }

    fn detect_game_over(&self) -> Option<TerminalKind> {
        match self.timeline.terminal() {
            Ok(kind) => kind,
            Err(e) => {
                log::error!("game timeline is inconsistent: {e}");
                None
            }
        }
    }

    fn side_to_move(&self) -> Color {
        // 初期局面の手番と手数の偶奇から求める
        let first = self.timeline.initial().turn();
        if self.timeline.len() % 2 == 0 { first } else { first.other() }
    }

    pub fn current_position(&self) -> Result<Position, PlayError> {
        Ok(self.timeline.position_at(self.timeline.len())?)
    }

    /// One-line status like the board header.
    pub fn status_line(&self) -> String {
        if let Some(status) = &self.status {
            return status.clone();
        }
        if self.ai_thinking {
            return "AI is thinking...".to_string();
        }
        if let Some(kind) = self.game_over {
            return kind.to_string();
        }
        let turn = color_name(self.side_to_move());
        let opening = self.opening.current().map(|o| format!(" | {o}")).unwrap_or_default();
        let in_check = self.current_position().map(|p| p.is_check()).unwrap_or(false);
        if in_check {
            format!("Check! {turn} to move{opening}")
        } else {
            format!("{turn} to move{opening}")
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn hint(&self) -> Option<Move> {
        self.hint
    }

    /// Latest live evaluation, side to move's point of view.
    pub fn evaluation(&self) -> Option<Score> {
        self.evaluation
    }

    pub fn is_thinking(&self) -> bool {
        self.ai_thinking
    }

    pub fn game_over(&self) -> Option<TerminalKind> {
        self.game_over
    }

    /// The game so far as PGN. `date` goes into the Date tag as given.
    pub fn to_pgn(&self, date: &str) -> Result<String, RulesError> {
        let (white, black) = match self.config.player_color {
            Color::White => ("Player", "Stockfish"),
            Color::Black => ("Stockfish", "Player"),
        };
        let mut tags = vec![
            ("Event".to_string(), "Casual game".to_string()),
            ("Site".to_string(), "chessy".to_string()),
            ("Date".to_string(), date.to_string()),
            ("White".to_string(), white.to_string()),
            ("Black".to_string(), black.to_string()),
        ];
        if let Some(opening) = self.opening.current() {
            tags.push(("Opening".to_string(), opening.to_string()));
        }
        pgn::export(&tags, &self.timeline)
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Pieces taken so far in the current position.
    pub fn captured(&self) -> Captured {
        self.current_position().map(|p| p.captured()).unwrap_or_default()
    }

    pub fn opening(&self) -> Option<&'static str> {
        self.opening.current()
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn messages(&self) -> &Receiver<PlayMessage> {
        &self.rx
    }
}
