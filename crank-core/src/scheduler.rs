//! Fixed-period tick timelines with bounded catch-up.
//!
//! A [`TickTimeline`] samples on the grid `last_tick + k * period`. When the
//! control loop runs late, the timeline reports every whole period that
//! elapsed so the caller can replay them oldest-first; the phase of the grid
//! is preserved rather than reset to "now". Replay is capped per pass: the
//! surplus is reported as dropped and the grid still advances past it, so a
//! long stall costs historical fidelity instead of an unbounded loop.

use crate::time::Millis;

/// Default number of ticks replayed in a single scheduling pass.
pub const DEFAULT_MAX_CATCH_UP: u32 = 64;

/// Outcome of one scheduling pass.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DueTicks {
    /// Ticks the caller must run now, oldest first.
    pub replay: u32,
    /// Elapsed ticks that were skipped because the replay cap was hit.
    pub dropped: u32,
}

impl DueTicks {
    /// Total number of grid instants consumed by this pass.
    #[must_use]
    pub const fn elapsed(&self) -> u32 {
        self.replay.saturating_add(self.dropped)
    }

    /// Returns `true` when nothing was due.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.replay == 0 && self.dropped == 0
    }
}

/// A single fixed-period timeline on the wrapping millisecond clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickTimeline {
    last_tick: Millis,
    period_ms: u32,
    max_catch_up: u32,
}

impl TickTimeline {
    /// Creates a timeline anchored at `start`.
    ///
    /// `period_ms` must be non-zero; callers validate this through
    /// [`ControllerConfig::validate`](crate::config::ControllerConfig::validate).
    #[must_use]
    pub const fn new(start: Millis, period_ms: u32, max_catch_up: u32) -> Self {
        Self {
            last_tick: start,
            period_ms: if period_ms == 0 { 1 } else { period_ms },
            max_catch_up,
        }
    }

    /// Computes how many ticks are due at `now` and advances the grid.
    pub fn due_ticks(&mut self, now: Millis) -> DueTicks {
        let elapsed = now.elapsed_since(self.last_tick);
        let count = elapsed / self.period_ms;
        if count == 0 {
            return DueTicks::default();
        }

        self.last_tick = self.last_tick.wrapping_add_millis(count * self.period_ms);

        let replay = count.min(self.max_catch_up);
        DueTicks {
            replay,
            dropped: count - replay,
        }
    }

    /// Re-anchors the grid, discarding any pending remainder.
    pub fn reset(&mut self, start: Millis) {
        self.last_tick = start;
    }

    /// Most recent grid instant that has been consumed.
    #[must_use]
    pub const fn last_tick(&self) -> Millis {
        self.last_tick
    }

    #[must_use]
    pub const fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Milliseconds accumulated toward the next tick.
    #[must_use]
    pub const fn pending(&self, now: Millis) -> u32 {
        now.elapsed_since(self.last_tick)
    }
}
