//! Wraparound-safe millisecond clock.
//!
//! The control loop samples a free-running `u32` millisecond counter that
//! overflows roughly every 49.7 days. All comparisons go through modular
//! subtraction so timelines and deadlines stay correct across the rollover.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

/// Instant on the controller's wrapping millisecond clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Millis(u32);

impl Millis {
    /// Clock origin.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw counter value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, computed modulo 2^32.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// Returns `true` once `deadline` has been reached or passed.
    ///
    /// The signed reinterpretation of the difference treats anything within
    /// half the counter range ahead of `deadline` as "already due".
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn has_reached(self, deadline: Self) -> bool {
        (self.0.wrapping_sub(deadline.0) as i32) >= 0
    }

    /// Advances the instant by `millis`, wrapping on overflow.
    #[must_use]
    pub const fn wrapping_add_millis(self, millis: u32) -> Self {
        Self(self.0.wrapping_add(millis))
    }
}

impl Add<u32> for Millis {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self.wrapping_add_millis(rhs)
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.wrapping_add_millis(duration_to_millis(rhs))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Converts a [`Duration`] to whole milliseconds, saturating at `u32::MAX`.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
