//! Per-side thinking time for play mode.
//!
//! The clock counts up. Only the side to move accumulates time, and the
//! running interval is credited when the turn passes.

use std::time::{Duration, Instant};

use crate::types::{Color, color_name};

#[derive(Clone, Debug, Default)]
pub struct GameClock {
    white: Duration,
    black: Duration,
    running: Option<(Color, Instant)>,
}

impl GameClock {
    /// Credit the running side and start timing `side`.
    pub fn start(&mut self, side: Color, now: Instant) {
        self.stop(now);
        self.running = Some((side, now));
    }

    /// Credit the running side and stop. Safe to call repeatedly.
    pub fn stop(&mut self, now: Instant) {
        if let Some((side, since)) = self.running.take() {
            *self.total_mut(side) += now.saturating_duration_since(since);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn running(&self) -> Option<Color> {
        self.running.map(|(side, _)| side)
    }

    /// Total time used by `side`, including the interval still running.
    pub fn elapsed(&self, side: Color, now: Instant) -> Duration {
        let total = match side {
            Color::White => self.white,
            Color::Black => self.black,
        };
        match self.running {
            Some((running, since)) if running == side => {
                total + now.saturating_duration_since(since)
            }
            _ => total,
        }
    }

    /// `White 1:05 | Black 0:42`; the running side is marked with `*`.
    pub fn summary(&self, now: Instant) -> String {
        let side = |color: Color| {
            let mark = if self.running() == Some(color) { "*" } else { "" };
            format!(
                "{}{mark} {}",
                color_name(color),
                format_clock(self.elapsed(color, now))
            )
        };
        format!("{} | {}", side(Color::White), side(Color::Black))
    }

    fn total_mut(&mut self, side: Color) -> &mut Duration {
        match side {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

/// `m:ss`, seconds truncated.
pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn only_the_side_to_move_accumulates() {
        let t0 = Instant::now();
        let mut clock = GameClock::default();
        clock.start(Color::White, t0);
        assert_eq!(clock.elapsed(Color::White, t0 + secs(3)), secs(3));
        assert_eq!(clock.elapsed(Color::Black, t0 + secs(3)), Duration::ZERO);

        clock.start(Color::Black, t0 + secs(5));
        clock.start(Color::White, t0 + secs(12));
        assert_eq!(clock.elapsed(Color::White, t0 + secs(12)), secs(5));
        assert_eq!(clock.elapsed(Color::Black, t0 + secs(20)), secs(7));
        assert_eq!(clock.running(), Some(Color::White));
    }

    #[test]
    fn stop_freezes_totals() {
        let t0 = Instant::now();
        let mut clock = GameClock::default();
        clock.start(Color::White, t0);
        clock.stop(t0 + secs(4));
        clock.stop(t0 + secs(9));
        assert_eq!(clock.running(), None);
        assert_eq!(clock.elapsed(Color::White, t0 + secs(100)), secs(4));

        clock.reset();
        assert_eq!(clock.elapsed(Color::White, t0 + secs(100)), Duration::ZERO);
    }

    #[test]
    fn summary_formats_minutes_and_seconds() {
        assert_eq!(format_clock(Duration::from_millis(59_999)), "0:59");
        assert_eq!(format_clock(secs(125)), "2:05");

        let t0 = Instant::now();
        let mut clock = GameClock::default();
        clock.start(Color::White, t0);
        clock.start(Color::Black, t0 + secs(65));
        assert_eq!(clock.summary(t0 + secs(72)), "White 1:05 | Black* 0:07");
    }
}
