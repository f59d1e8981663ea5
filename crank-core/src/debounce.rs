//! Counter-based debounce integrator.
//!
//! Each call to [`DebounceIntegrator::step`] represents exactly one fixed
//! sampling tick. The counter climbs while the raw input is active and decays
//! while it is inactive; the logical level only flips once the counter crosses
//! the on/off thresholds, so chatter inside the hysteresis band is ignored.

use core::fmt;

/// Stable logical state of the button.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ButtonLevel {
    #[default]
    Up,
    Down,
}

impl ButtonLevel {
    /// Returns `true` when the button is held down.
    #[must_use]
    pub const fn is_down(self) -> bool {
        matches!(self, ButtonLevel::Down)
    }
}

/// Threshold configuration for a [`DebounceIntegrator`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceThresholds {
    on: u16,
    off: u16,
    max: u16,
}

/// Reasons a threshold set is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ThresholdError {
    /// `on` exceeds the saturation ceiling.
    OnAboveMax { on: u16, max: u16 },
    /// `off` must sit strictly below `on` to leave a hysteresis band.
    OffNotBelowOn { off: u16, on: u16 },
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdError::OnAboveMax { on, max } => {
                write!(f, "on-threshold {on} exceeds max count {max}")
            }
            ThresholdError::OffNotBelowOn { off, on } => {
                write!(f, "off-threshold {off} must be below on-threshold {on}")
            }
        }
    }
}

impl DebounceThresholds {
    /// Default thresholds: press after 8 active ticks, release at 2, saturate at 10.
    pub const DEFAULT: Self = Self {
        on: 8,
        off: 2,
        max: 10,
    };

    /// Validates and builds a threshold set.
    pub const fn new(on: u16, off: u16, max: u16) -> Result<Self, ThresholdError> {
        if on > max {
            return Err(ThresholdError::OnAboveMax { on, max });
        }
        if off >= on {
            return Err(ThresholdError::OffNotBelowOn { off, on });
        }
        Ok(Self { on, off, max })
    }

    #[must_use]
    pub const fn on(&self) -> u16 {
        self.on
    }

    #[must_use]
    pub const fn off(&self) -> u16 {
        self.off
    }

    #[must_use]
    pub const fn max(&self) -> u16 {
        self.max
    }
}

impl Default for DebounceThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Result of a single integrator tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebounceStep {
    pub level: ButtonLevel,
    /// `true` only on the tick where the level went from `Up` to `Down`.
    pub pressed: bool,
}

/// Debounce filter state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebounceIntegrator {
    counter: u16,
    thresholds: DebounceThresholds,
    level: ButtonLevel,
}

impl DebounceIntegrator {
    /// Creates an integrator resting in the `Up` state.
    #[must_use]
    pub const fn new(thresholds: DebounceThresholds) -> Self {
        Self {
            counter: 0,
            thresholds,
            level: ButtonLevel::Up,
        }
    }

    /// Integrates one raw sample.
    pub fn step(&mut self, active: bool) -> DebounceStep {
        self.counter = if active {
            self.counter.saturating_add(1).min(self.thresholds.max)
        } else {
            self.counter.saturating_sub(1)
        };

        let previous = self.level;
        if self.counter >= self.thresholds.on {
            self.level = ButtonLevel::Down;
        } else if self.counter <= self.thresholds.off {
            self.level = ButtonLevel::Up;
        }

        DebounceStep {
            level: self.level,
            pressed: previous == ButtonLevel::Up && self.level == ButtonLevel::Down,
        }
    }

    /// Current stable level.
    #[must_use]
    pub const fn level(&self) -> ButtonLevel {
        self.level
    }

    /// Raw integrator counter, always within `0..=max`.
    #[must_use]
    pub const fn counter(&self) -> u16 {
        self.counter
    }

    #[must_use]
    pub const fn thresholds(&self) -> DebounceThresholds {
        self.thresholds
    }
}

impl Default for DebounceIntegrator {
    fn default() -> Self {
        Self::new(DebounceThresholds::DEFAULT)
    }
}
