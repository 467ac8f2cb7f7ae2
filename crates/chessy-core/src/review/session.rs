//! Review mode: timeline navigation driving debounced, cached analysis.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};

use super::reconciler::{EvalDisplay, Reconciled, Reconciler, STATUS_NO_ENGINE};
use super::request::{AnalysisRequest, EngineMessage, RequestState};
use crate::cache::{DEFAULT_CACHE_CAPACITY, EvalCache};
use crate::engine::EngineSession;
use crate::position::Position;
use crate::scheduler::{Debouncer, REVIEW_DEBOUNCE};
use crate::settings::Settings;
use crate::timeline::Timeline;
use crate::types::Move;

const MIN_REVIEW_THINK: f64 = 0.15;
const MAX_REVIEW_THINK: f64 = 2.0;
const REVIEW_THINK_SCALE: f64 = 0.6;
/// これ未満の解析時間では PV を短くし、直前手の分類を省く。
const QUICK_BUDGET: Duration = Duration::from_millis(350);
pub const MAX_MULTIPV: u32 = 5;

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// Play-mode think time; the review budget is derived from it.
    pub think_time: Duration,
    pub multipv: u32,
    pub best_only: bool,
    pub debounce: Duration,
    pub cache_capacity: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            think_time: Duration::from_secs(1),
            multipv: 3,
            best_only: false,
            debounce: REVIEW_DEBOUNCE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ReviewConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            think_time: settings.think_duration(),
            multipv: settings.multipv_count,
            ..Self::default()
        }
    }

    /// `clamp(think_time, 0.15s, 2.0s) × 0.6`
    pub fn budget(&self) -> Duration {
        let secs = self.think_time.as_secs_f64().clamp(MIN_REVIEW_THINK, MAX_REVIEW_THINK);
        Duration::from_secs_f64(secs * REVIEW_THINK_SCALE)
    }

    pub fn breadth(&self) -> u32 {
        if self.best_only { 1 } else { self.multipv.max(1) }
    }

    pub fn pv_limit(&self) -> usize {
        if self.is_quick() { 4 } else { 6 }
    }

    pub fn classifies_last_move(&self) -> bool {
        !self.is_quick()
    }

    fn is_quick(&self) -> bool {
        self.budget() < QUICK_BUDGET
    }
}

/// Input from the front-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    Step(isize),
    Jump(usize),
    SliderPress,
    SliderRelease,
    SetBestOnly(bool),
    SetMultipv(u32),
    Exit,
}

/// レビュー画面のアプリケーションオブジェクト。
///
/// All fields are owned by the event-loop thread. Workers only see an
/// [`AnalysisRequest`] snapshot and answer through the message channel.
pub struct ReviewSession {
    engine: Arc<EngineSession>,
    config: ReviewConfig,
    timeline: Timeline,
    cache: EvalCache,
    scheduler: Debouncer<usize>,
    reconciler: Reconciler,
    in_flight: Option<u64>,
    open: bool,
    tx: Sender<EngineMessage>,
    rx: Receiver<EngineMessage>,
}

impl ReviewSession {
    pub fn new(engine: Arc<EngineSession>, config: ReviewConfig) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            engine,
            cache: EvalCache::new(config.cache_capacity),
            scheduler: Debouncer::new(config.debounce),
            config,
            timeline: Timeline::default(),
            reconciler: Reconciler::new(),
            in_flight: None,
            open: false,
            tx,
            rx,
        }
    }

    /// Load a game and schedule analysis of its start position.
    ///
    /// The cache is cleared and outstanding results are invalidated.
    pub fn open(&mut self, initial: Position, moves: Vec<Move>, now: Instant) {
        self.reconciler.invalidate();
        self.reconciler.reset_display();
        self.scheduler.cancel();
        self.scheduler.resume();
        self.cache.clear();
        self.timeline.reset_from(initial, moves);
        self.in_flight = None;
        self.open = true;
        log::info!("review opened with {} plies", self.timeline.len());
        self.schedule(now);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn jump(&mut self, index: usize, now: Instant) -> bool {
        let changed = self.timeline.jump(index);
        if changed {
            self.schedule(now);
        }
        changed
    }

    pub fn step(&mut self, delta: isize, now: Instant) -> bool {
        let changed = self.timeline.step(delta);
        if changed {
            self.schedule(now);
        }
        changed
    }

    pub fn slider_pressed(&mut self) {
        self.scheduler.suspend();
    }

    /// ドラッグ終了。最終局面を1回だけ解析する。
    pub fn slider_released(&mut self, now: Instant) {
        if !self.scheduler.is_suspended() {
            return;
        }
        self.scheduler.resume();
        self.schedule(now);
    }

    pub fn set_best_only(&mut self, best_only: bool, now: Instant) {
        if self.config.best_only != best_only {
            let breadth = self.config.breadth();
            self.config.best_only = best_only;
            self.breadth_changed(breadth, now);
        }
    }

    pub fn set_multipv(&mut self, multipv: u32, now: Instant) {
        let multipv = multipv.clamp(1, MAX_MULTIPV);
        if self.config.multipv != multipv {
            let breadth = self.config.breadth();
            self.config.multipv = multipv;
            self.breadth_changed(breadth, now);
        }
    }

    /// 解析中の結果は旧 breadth のものなので破棄する。
    fn breadth_changed(&mut self, previous: u32, now: Instant) {
        if self.config.breadth() == previous {
            return;
        }
        if self.in_flight.take().is_some() {
            self.reconciler.invalidate();
        }
        self.schedule(now);
    }

    fn schedule(&mut self, now: Instant) {
        if self.open {
            self.scheduler.request(self.timeline.cursor(), now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Fire the debounced request if its quiet period has passed.
    ///
    /// Returns `true` when the display changed synchronously (cache hit,
    /// missing engine).
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.scheduler.poll(now) {
            Some(_) if self.open => self.request_analysis(),
            _ => false,
        }
    }

    fn request_analysis(&mut self) -> bool {
        if !self.engine.is_available() {
            self.reconciler.set_status(STATUS_NO_ENGINE);
            return true;
        }
        let ply = self.timeline.cursor();
        let position = match self.timeline.current_position() {
            Ok(p) => p,
            Err(e) => {
                log::error!("review timeline is inconsistent at ply {ply}: {e}");
                self.reconciler.set_status(e.to_string());
                return true;
            }
        };
        let breadth = self.config.breadth();
        let pv_limit = self.config.pv_limit();

        if let Some(cached) = self.cache.get(position.fen(), breadth) {
            log::debug!("cache hit for ply {ply} (multipv {breadth})");
            let cached = cached.clone();
            let verdict = cached.verdict.as_ref().filter(|_| self.config.classifies_last_move());
            self.reconciler.show(&cached.analysis, verdict, &position, pv_limit);
            return true;
        }

        let previous = if self.config.classifies_last_move() && ply > 0 {
            self.timeline.position_at(ply - 1).ok()
        } else {
            None
        };
        let token = self.reconciler.next_token();
        let request = AnalysisRequest {
            position,
            breadth,
            budget: self.config.budget(),
            token,
            ply,
            previous,
        };
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("review-ply-{ply}"))
            .spawn(move || {
                let message = request.execute(&engine);
                // 受信側が閉じていればセッションは終了済み
                let _ = tx.send(message);
            });
        match spawned {
            Ok(_) => {
                log::debug!("dispatched analysis token {token} ply {ply}");
                self.in_flight = Some(token);
                false
            }
            Err(e) => {
                log::error!("failed to start analysis worker: {e}");
                self.reconciler.set_status(format!("Engine error: {e}"));
                true
            }
        }
    }

    /// Reconcile one worker message against the live token and cursor.
    pub fn handle(&mut self, message: EngineMessage) -> Reconciled {
        if self.in_flight == Some(message.token()) {
            self.in_flight = None;
        }
        self.reconciler.reconcile(
            message,
            self.timeline.cursor(),
            &mut self.cache,
            self.config.pv_limit(),
        )
    }

    /// Leave review mode; in-flight results become stale.
    pub fn exit(&mut self) {
        self.reconciler.invalidate();
        self.scheduler.cancel();
        self.in_flight = None;
        self.open = false;
        log::info!("review closed");
    }

    pub fn state(&self) -> RequestState {
        if self.scheduler.is_pending() {
            RequestState::Scheduled
        } else if self.in_flight.is_some() {
            RequestState::Dispatched
        } else {
            RequestState::Idle
        }
    }

    pub fn display(&self) -> &EvalDisplay {
        self.reconciler.display()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn cache(&self) -> &EvalCache {
        &self.cache
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn token(&self) -> u64 {
        self.reconciler.token()
    }

    /// Worker results, for callers that drive the loop themselves.
    pub fn messages(&self) -> &Receiver<EngineMessage> {
        &self.rx
    }

    /// Apply one UI event. Returns `false` for [`UiEvent::Exit`].
    pub fn apply(&mut self, event: UiEvent, now: Instant) -> bool {
        match event {
            UiEvent::Step(delta) => {
                self.step(delta, now);
            }
            UiEvent::Jump(index) => {
                self.jump(index, now);
            }
            UiEvent::SliderPress => self.slider_pressed(),
            UiEvent::SliderRelease => self.slider_released(now),
            UiEvent::SetBestOnly(flag) => self.set_best_only(flag, now),
            UiEvent::SetMultipv(n) => self.set_multipv(n, now),
            UiEvent::Exit => {
                self.exit();
                return false;
            }
        }
        true
    }

    /// Event loop: UI events, worker messages and the debounce deadline.
    ///
    /// `on_update` is called whenever the cursor or the display may have
    /// changed. Returns when `Exit` arrives or the event channel closes.
    pub fn run(&mut self, events: &Receiver<UiEvent>, mut on_update: impl FnMut(&ReviewSession)) {
        let messages = self.rx.clone();
        on_update(self);
        loop {
            let timer = match self.next_deadline() {
                Some(deadline) => crossbeam_channel::at(deadline),
                None => crossbeam_channel::never(),
            };
            select! {
                recv(events) -> event => {
                    let Ok(event) = event else {
                        self.exit();
                        return;
                    };
                    if !self.apply(event, Instant::now()) {
                        return;
                    }
                    on_update(self);
                }
                recv(messages) -> message => {
                    if let Ok(message) = message {
                        if self.handle(message) == Reconciled::Accepted {
                            on_update(self);
                        }
                    }
                }
                recv(timer) -> _ => {
                    if self.tick(Instant::now()) {
                        on_update(self);
                    }
                }
            }
        }
    }
}

impl Drop for ReviewSession {
    fn drop(&mut self) {
        if self.open {
            self.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Probe, ScriptedEngine};

    const WAIT: Duration = Duration::from_secs(5);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn moves(list: &[&str]) -> Vec<Move> {
        list.iter().map(|m| Move::from_uci(m).unwrap()).collect()
    }

    fn quick_config() -> ReviewConfig {
        ReviewConfig {
            think_time: ms(300),
            ..ReviewConfig::default()
        }
    }

    fn session_with(config: ReviewConfig) -> (ReviewSession, Probe) {
        let (engine, probe) = ScriptedEngine::new();
        let engine = Arc::new(EngineSession::new(Box::new(engine)));
        (ReviewSession::new(engine, config), probe)
    }

    fn opened(config: ReviewConfig, t0: Instant) -> (ReviewSession, Probe) {
        let (mut session, probe) = session_with(config);
        session.open(Position::startpos(), moves(&["e2e4", "e7e5", "g1f3"]), t0);
        (session, probe)
    }

    fn next_message(session: &ReviewSession) -> EngineMessage {
        session.messages().recv_timeout(WAIT).expect("worker message")
    }

    #[test]
    fn budget_breadth_and_pv_limit() {
        let quick = quick_config();
        assert_eq!(quick.budget(), Duration::from_secs_f64(0.3 * 0.6));
        assert_eq!(quick.pv_limit(), 4);
        assert!(!quick.classifies_last_move());

        let slow = ReviewConfig {
            think_time: Duration::from_secs(10),
            ..ReviewConfig::default()
        };
        assert_eq!(slow.budget(), Duration::from_secs_f64(2.0 * 0.6));
        assert_eq!(slow.pv_limit(), 6);
        assert_eq!(slow.breadth(), 3);

        let best = ReviewConfig {
            best_only: true,
            ..ReviewConfig::default()
        };
        assert_eq!(best.breadth(), 1);
    }

    #[test]
    fn rapid_jumps_coalesce_into_one_dispatch() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(quick_config(), t0);
        assert!(session.jump(2, t0 + ms(10)));
        assert!(session.jump(3, t0 + ms(20)));
        assert_eq!(session.state(), RequestState::Scheduled);

        assert!(!session.tick(t0 + ms(100)));
        assert_eq!(probe.call_count(), 0);
        session.tick(t0 + ms(180));
        assert_eq!(session.state(), RequestState::Dispatched);

        let message = next_message(&session);
        assert_eq!(message.ply(), 3);
        assert_eq!(session.handle(message), Reconciled::Accepted);
        assert_eq!(session.state(), RequestState::Idle);

        let expected = session.timeline().position_at(3).unwrap();
        assert_eq!(probe.searched_fens(), vec![expected.fen().to_string()]);
        assert_eq!(session.display().status, "Suggestions updated.");
        assert_eq!(session.display().label, "+0.30");
        assert!(session.cache().get(expected.fen(), 3).is_some());
    }

    #[test]
    fn result_for_abandoned_ply_is_discarded() {
        let t0 = Instant::now();
        let (mut session, _probe) = opened(quick_config(), t0);
        session.jump(3, t0);
        session.tick(t0 + ms(200));
        let message = next_message(&session);

        // 結果到着前に別の手へ移動
        session.jump(1, t0 + ms(210));
        let before = session.display().clone();
        assert_eq!(session.handle(message), Reconciled::Discarded);
        assert_eq!(session.display(), &before);

        // 捨てた結果もキャッシュには残る
        let ply3 = session.timeline().position_at(3).unwrap();
        assert!(session.cache().get(ply3.fen(), 3).is_some());
    }

    #[test]
    fn exit_invalidates_in_flight_result() {
        let t0 = Instant::now();
        let (mut session, _probe) = opened(quick_config(), t0);
        session.tick(t0 + ms(200));
        let dispatched = session.token();
        session.exit();
        assert_eq!(session.token(), dispatched + 1);
        let message = next_message(&session);
        assert_eq!(message.token(), dispatched);
        let before = session.display().clone();
        assert_eq!(session.handle(message), Reconciled::Discarded);
        assert_eq!(session.display(), &before);
    }

    #[test]
    fn cache_hit_skips_engine() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(quick_config(), t0);
        session.jump(2, t0);
        session.tick(t0 + ms(200));
        let message = next_message(&session);
        session.handle(message);
        let shown = session.display().clone();
        assert_eq!(probe.call_count(), 1);

        session.jump(1, t0 + ms(300));
        session.jump(2, t0 + ms(310));
        assert!(session.tick(t0 + ms(500)));
        assert_eq!(probe.call_count(), 1);
        assert_eq!(session.display(), &shown);
        assert_eq!(session.state(), RequestState::Idle);
        assert!(session.messages().try_recv().is_err());
    }

    #[test]
    fn missing_engine_reports_status_without_caching() {
        let t0 = Instant::now();
        let mut session =
            ReviewSession::new(Arc::new(EngineSession::unavailable()), quick_config());
        session.open(Position::startpos(), moves(&["e2e4"]), t0);
        assert!(session.tick(t0 + ms(200)));
        assert_eq!(session.display().status, STATUS_NO_ENGINE);
        assert!(session.cache().is_empty());
        assert_eq!(session.state(), RequestState::Idle);
        assert!(session.messages().try_recv().is_err());
    }

    #[test]
    fn slider_drag_analyses_only_final_position() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(quick_config(), t0);
        session.slider_pressed();
        assert_eq!(session.state(), RequestState::Idle);
        for (i, ply) in [1usize, 2, 3, 2].iter().enumerate() {
            session.jump(*ply, t0 + ms(i as u64 * 30));
        }
        assert!(session.next_deadline().is_none());
        assert!(!session.tick(t0 + ms(1000)));

        session.slider_released(t0 + ms(1000));
        session.tick(t0 + ms(1200));
        let message = next_message(&session);
        assert_eq!(message.ply(), 2);
        session.handle(message);
        assert_eq!(probe.call_count(), 1);

        // 押下なしの解放は何もしない
        session.slider_released(t0 + ms(1300));
        assert_eq!(session.state(), RequestState::Idle);
    }

    #[test]
    fn best_only_uses_its_own_cache_entry() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(quick_config(), t0);
        session.tick(t0 + ms(200));
        let message = next_message(&session);
        session.handle(message);
        assert_eq!(session.display().arrows.len(), 3);

        session.set_best_only(true, t0 + ms(300));
        session.tick(t0 + ms(500));
        let message = next_message(&session);
        session.handle(message);
        assert_eq!(probe.calls.lock().last().map(|(_, n)| *n), Some(1));
        assert_eq!(session.display().arrows.len(), 1);
        assert!(session.cache().get(Position::startpos().fen(), 1).is_some());
        assert!(session.cache().get(Position::startpos().fen(), 3).is_some());
    }

    #[test]
    fn last_move_is_classified_with_longer_budget() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(ReviewConfig::default(), t0);
        session.jump(1, t0);
        session.tick(t0 + ms(200));
        let message = next_message(&session);
        session.handle(message);
        // 現局面と直前局面の2回
        assert_eq!(probe.call_count(), 2);
        let first = &session.display().lines[0];
        assert!(first.contains("Last move impact"), "{first}");
    }

    #[test]
    fn revisiting_a_ply_replays_the_cached_verdict() {
        let t0 = Instant::now();
        let (mut session, probe) = opened(ReviewConfig::default(), t0);
        session.jump(1, t0);
        session.tick(t0 + ms(200));
        let message = next_message(&session);
        assert_eq!(session.handle(message), Reconciled::Accepted);
        let fresh = session.display().clone();

        session.jump(2, t0 + ms(300));
        session.tick(t0 + ms(500));
        let message = next_message(&session);
        session.handle(message);
        let calls = probe.call_count();

        session.jump(1, t0 + ms(600));
        assert!(session.tick(t0 + ms(800)));
        assert_eq!(probe.call_count(), calls);
        assert_eq!(session.display().lines, fresh.lines);
        assert!(session.display().lines[0].contains("Last move impact"));
    }

    #[test]
    fn breadth_toggle_drops_the_in_flight_result() {
        let t0 = Instant::now();
        let (mut session, _probe) = opened(quick_config(), t0);
        session.tick(t0 + ms(200));
        assert_eq!(session.state(), RequestState::Dispatched);

        session.set_best_only(true, t0 + ms(250));
        let before = session.display().clone();
        let message = next_message(&session);
        assert_eq!(session.handle(message), Reconciled::Discarded);
        assert_eq!(session.display(), &before);
        // 旧 breadth の結果はキャッシュにだけ入る
        assert!(session.cache().get(Position::startpos().fen(), 3).is_some());

        session.tick(t0 + ms(450));
        let message = next_message(&session);
        assert_eq!(session.handle(message), Reconciled::Accepted);
        assert_eq!(session.display().arrows.len(), 1);
    }

    #[test]
    fn multipv_change_without_breadth_change_keeps_the_request() {
        let t0 = Instant::now();
        let (mut session, _probe) = opened(
            ReviewConfig {
                best_only: true,
                ..quick_config()
            },
            t0,
        );
        session.tick(t0 + ms(200));
        let token = session.token();
        session.set_multipv(2, t0 + ms(250));
        assert_eq!(session.token(), token);
        let message = next_message(&session);
        assert_eq!(session.handle(message), Reconciled::Accepted);
    }

    #[test]
    fn run_loop_processes_events_until_exit() {
        let (mut session, probe) = session_with(ReviewConfig {
            debounce: ms(20),
            ..quick_config()
        });
        session.open(Position::startpos(), moves(&["e2e4", "e7e5"]), Instant::now());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(UiEvent::Jump(2)).unwrap();

        let mut updates = 0;
        let mut exit_sent = false;
        session.run(&rx, |s| {
            updates += 1;
            if s.display().status == "Suggestions updated." && !exit_sent {
                exit_sent = true;
                tx.send(UiEvent::Exit).unwrap();
            }
        });
        assert!(updates >= 2);
        assert!(!session.is_open());
        assert_eq!(probe.call_count(), 1);
    }
}
