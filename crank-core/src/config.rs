//! Controller tuning.

use core::fmt;

use crate::debounce::DebounceThresholds;
use crate::position::PositionTable;
use crate::scheduler::DEFAULT_MAX_CATCH_UP;

/// Which event wins when a remote override and a local press land in the same
/// iteration. The loser is dropped and reported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum OverridePrecedence {
    #[default]
    RemoteFirst,
    LocalFirst,
}

impl fmt::Display for OverridePrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverridePrecedence::RemoteFirst => f.write_str("remote-first"),
            OverridePrecedence::LocalFirst => f.write_str("local-first"),
        }
    }
}

/// Invalid configuration detected by [`ControllerConfig::validate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A period or duration that must be non-zero was zero.
    ZeroPeriod(&'static str),
    /// Catch-up cap of zero would starve the debounce filter.
    ZeroCatchUp,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPeriod(field) => write!(f, "{field} must be non-zero"),
            ConfigError::ZeroCatchUp => f.write_str("max catch-up must be non-zero"),
        }
    }
}

/// Timing and behavior knobs shared by firmware and emulator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub debounce_period_ms: u32,
    pub thresholds: DebounceThresholds,
    pub indicator_pulse_ms: u32,
    pub refresh_period_ms: u32,
    pub notification_hold_ms: u32,
    pub max_catch_up: u32,
    pub precedence: OverridePrecedence,
    pub positions: PositionTable,
}

impl ControllerConfig {
    pub const DEFAULT: Self = Self {
        debounce_period_ms: 5,
        thresholds: DebounceThresholds::DEFAULT,
        indicator_pulse_ms: 300,
        refresh_period_ms: 100,
        notification_hold_ms: 5_000,
        max_catch_up: DEFAULT_MAX_CATCH_UP,
        precedence: OverridePrecedence::RemoteFirst,
        positions: PositionTable::CRANK,
    };

    #[must_use]
    pub const fn with_debounce_period_ms(mut self, period_ms: u32) -> Self {
        self.debounce_period_ms = period_ms;
        self
    }

    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: DebounceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub const fn with_indicator_pulse_ms(mut self, pulse_ms: u32) -> Self {
        self.indicator_pulse_ms = pulse_ms;
        self
    }

    #[must_use]
    pub const fn with_refresh_period_ms(mut self, period_ms: u32) -> Self {
        self.refresh_period_ms = period_ms;
        self
    }

    #[must_use]
    pub const fn with_notification_hold_ms(mut self, hold_ms: u32) -> Self {
        self.notification_hold_ms = hold_ms;
        self
    }

    #[must_use]
    pub const fn with_max_catch_up(mut self, ticks: u32) -> Self {
        self.max_catch_up = ticks;
        self
    }

    #[must_use]
    pub const fn with_precedence(mut self, precedence: OverridePrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    #[must_use]
    pub const fn with_positions(mut self, positions: PositionTable) -> Self {
        self.positions = positions;
        self
    }

    /// Checks the timing fields. Thresholds and position tables can only be
    /// built through their validating constructors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("debounce period", self.debounce_period_ms),
            ("indicator pulse", self.indicator_pulse_ms),
            ("refresh period", self.refresh_period_ms),
        ];
        if let Some(&(field, _)) = periods.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroPeriod(field));
        }
        if self.max_catch_up == 0 {
            return Err(ConfigError::ZeroCatchUp);
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ControllerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.debounce_period_ms, 5);
        assert_eq!(config.indicator_pulse_ms, 300);
        assert_eq!(config.precedence, OverridePrecedence::RemoteFirst);
    }

    #[test]
    fn zero_periods_are_rejected() {
        let config = ControllerConfig::DEFAULT.with_refresh_period_ms(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod("refresh period"))
        );

        let config = ControllerConfig::DEFAULT.with_max_catch_up(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCatchUp));
    }

    #[test]
    fn notification_hold_may_be_disabled() {
        let config = ControllerConfig::DEFAULT.with_notification_hold_ms(0);
        assert!(config.validate().is_ok());
    }
}
