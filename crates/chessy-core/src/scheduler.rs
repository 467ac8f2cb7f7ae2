//! Request scheduling for the event loop.
//!
//! Both schedulers are plain state machines driven by an injected `now`.
//! They never spawn timers themselves; the event loop asks for
//! [`Debouncer::deadline`] / [`Throttle::deadline`] and calls `poll` when it
//! wakes up. There is a single timer slot per scheduler, so superseding a
//! request can never leave a stale timer behind.

use std::time::{Duration, Instant};

/// レビュー画面のスクラブ時の静止期間。
pub const REVIEW_DEBOUNCE: Duration = Duration::from_millis(160);

/// ライブ評価の最小間隔。
pub const LIVE_EVAL_INTERVAL: Duration = Duration::from_millis(400);

/// 間隔が既に空いている場合のライブ評価の遅延。
pub const LIVE_EVAL_DELAY: Duration = Duration::from_millis(50);

/// Trailing-edge debouncer: only the latest item survives a quiet period.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
    suspended: bool,
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(REVIEW_DEBOUNCE)
    }
}

impl<T> Debouncer<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            suspended: false,
        }
    }

    /// Replace the pending item and re-arm the deadline at `now + quiet`.
    ///
    /// Returns `false` (and drops `item`) while suspended.
    pub fn request(&mut self, item: T, now: Instant) -> bool {
        if self.suspended {
            return false;
        }
        self.pending = Some((item, now + self.quiet));
        true
    }

    /// Release the pending item if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if *due <= now => self.pending.take().map(|(item, _)| item),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending item, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// スライダー押下。保留中の要求を破棄し、解放まで受け付けない。
    pub fn suspend(&mut self) {
        self.cancel();
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

/// Minimum-interval scheduler for live evaluation while playing.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    delay: Duration,
    last_fire: Option<Instant>,
    due: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(LIVE_EVAL_INTERVAL, LIVE_EVAL_DELAY)
    }
}

impl Throttle {
    pub fn new(interval: Duration, delay: Duration) -> Self {
        Self {
            interval,
            delay,
            last_fire: None,
            due: None,
        }
    }

    /// Schedule a firing, replacing any pending one. Returns the deadline.
    pub fn request(&mut self, now: Instant) -> Instant {
        let wait = match self.last_fire {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed > self.interval {
                    self.delay
                } else {
                    self.interval - elapsed
                }
            }
            None => self.delay,
        };
        let due = now + wait;
        self.due = Some(due);
        due
    }

    /// `true` once when the pending deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.due
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }
}
