//! Timed side effects driven off the control loop.
//!
//! Both effects are plain deadlines polled once per iteration; neither ever
//! blocks. The indicator pulse is one-shot and re-armable, the refresh timer
//! is periodic and re-anchors on `now` so missed frames are skipped instead of
//! replayed.

use crate::time::Millis;

/// Optional instant compared with the wraparound rule.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Deadline {
    at: Option<Millis>,
}

impl Deadline {
    pub const DISARMED: Self = Self { at: None };

    /// Arms the deadline at `now + delay_ms`, replacing any pending instant.
    pub fn arm(&mut self, now: Millis, delay_ms: u32) {
        self.at = Some(now.wrapping_add_millis(delay_ms));
    }

    pub fn disarm(&mut self) {
        self.at = None;
    }

    #[must_use]
    pub const fn at(&self) -> Option<Millis> {
        self.at
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    /// Returns `true` when armed and `now` has reached the instant.
    #[must_use]
    pub fn is_due(&self, now: Millis) -> bool {
        self.at.is_some_and(|at| now.has_reached(at))
    }
}

/// One-shot "LED off" timer armed by every position change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorPulse {
    deadline: Deadline,
    duration_ms: u32,
}

impl IndicatorPulse {
    #[must_use]
    pub const fn new(duration_ms: u32) -> Self {
        Self {
            deadline: Deadline::DISARMED,
            duration_ms,
        }
    }

    /// Starts (or restarts) the pulse; the caller lights the indicator.
    pub fn trigger(&mut self, now: Millis) {
        self.deadline.arm(now, self.duration_ms);
    }

    /// Returns `true` exactly once when the pulse has expired.
    pub fn poll(&mut self, now: Millis) -> bool {
        if self.deadline.is_due(now) {
            self.deadline.disarm();
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn is_lit(&self) -> bool {
        self.deadline.is_armed()
    }

    #[must_use]
    pub const fn deadline(&self) -> Deadline {
        self.deadline
    }
}

/// Periodic display refresh cadence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RefreshTimer {
    deadline: Deadline,
    period_ms: u32,
}

impl RefreshTimer {
    #[must_use]
    pub const fn new(period_ms: u32) -> Self {
        Self {
            deadline: Deadline::DISARMED,
            period_ms,
        }
    }

    /// Schedules the first refresh one period after `now`.
    pub fn start(&mut self, now: Millis) {
        self.deadline.arm(now, self.period_ms);
    }

    /// Returns `true` when a frame is due and re-arms at `now + period`.
    pub fn poll(&mut self, now: Millis) -> bool {
        if self.deadline.is_due(now) {
            self.deadline.arm(now, self.period_ms);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn next_at(&self) -> Option<Millis> {
        self.deadline.at()
    }

    #[must_use]
    pub const fn period_ms(&self) -> u32 {
        self.period_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_turns_off_exactly_once() {
        let mut pulse = IndicatorPulse::new(300);
        pulse.trigger(Millis::from_raw(40));
        assert!(pulse.is_lit());

        assert!(!pulse.poll(Millis::from_raw(339)));
        assert!(pulse.poll(Millis::from_raw(340)));
        assert!(!pulse.poll(Millis::from_raw(341)));
        assert!(!pulse.is_lit());
    }

    #[test]
    fn retrigger_extends_the_pulse() {
        let mut pulse = IndicatorPulse::new(300);
        pulse.trigger(Millis::from_raw(0));
        pulse.trigger(Millis::from_raw(200));

        assert!(!pulse.poll(Millis::from_raw(300)));
        assert!(pulse.poll(Millis::from_raw(500)));
    }

    #[test]
    fn refresh_skips_missed_frames() {
        let mut timer = RefreshTimer::new(100);
        timer.start(Millis::ZERO);

        // Stalled for 3.5 periods: one frame, then re-anchored on now.
        assert!(timer.poll(Millis::from_raw(350)));
        assert_eq!(timer.next_at(), Some(Millis::from_raw(450)));
        assert!(!timer.poll(Millis::from_raw(400)));
        assert!(timer.poll(Millis::from_raw(450)));
    }

    #[test]
    fn deadline_respects_rollover() {
        let mut deadline = Deadline::default();
        assert!(!deadline.is_due(Millis::from_raw(5)));

        deadline.arm(Millis::from_raw(u32::MAX - 10), 20);
        assert!(!deadline.is_due(Millis::from_raw(u32::MAX)));
        assert!(deadline.is_due(Millis::from_raw(9)));
    }
}
