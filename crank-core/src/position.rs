//! Discrete position state machine.
//!
//! The crank rests at one of a small number of commanded positions, each
//! mapped to a servo pulse width. A debounced press advances to the next
//! position (wrapping), while a remote override jumps straight to an absolute
//! index.

use core::fmt;

/// Upper bound on the number of positions a table can hold.
pub const MAX_POSITIONS: usize = 8;

/// Number of positions in the stock crank table.
pub const DEFAULT_POSITION_COUNT: usize = CRANK_LEN as usize;
const CRANK_LEN: u8 = 3;

/// Servo pulse for the fully closed position (about 0°).
pub const SERVO_MIN_US: u16 = 1_000;
/// Servo pulse for the fully open position (about 180°).
pub const SERVO_MAX_US: u16 = 2_000;

/// Servo frame period at 50 Hz.
pub const SERVO_PERIOD_US: u32 = 20_000;

/// Converts a pulse width to a PWM compare value for a 50 Hz timer whose
/// full period is `max_duty` counts. Pulses longer than the frame saturate.
#[must_use]
pub fn servo_duty(pulse_us: u16, max_duty: u32) -> u32 {
    let pulse = u64::from(pulse_us).min(u64::from(SERVO_PERIOD_US));
    let duty = pulse * u64::from(max_duty) / u64::from(SERVO_PERIOD_US);
    u32::try_from(duty).unwrap_or(max_duty)
}

/// Commanded output for a single position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionSlot {
    pub pulse_us: u16,
    pub label: &'static str,
}

impl PositionSlot {
    #[must_use]
    pub const fn new(pulse_us: u16, label: &'static str) -> Self {
        Self { pulse_us, label }
    }
}

const EMPTY_SLOT: PositionSlot = PositionSlot::new(0, "");

/// Index into a [`PositionTable`]; only constructible in range.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct PositionIndex(u8);

impl PositionIndex {
    /// The start-up position.
    pub const HOME: Self = Self(0);

    /// Returns the zero-based index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    /// Returns the one-based number shown to operators.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        self.0 as usize + 1
    }
}

impl fmt::Display for PositionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while building tables or resolving indices.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionError {
    /// Requested index does not exist in the table.
    OutOfRange { requested: u8, count: u8 },
    /// Tables need between two and [`MAX_POSITIONS`] entries.
    InvalidCount(usize),
    /// Slot pulse width of zero would park the servo signal low.
    ZeroPulse { index: usize },
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::OutOfRange { requested, count } => {
                write!(f, "position {requested} outside 0..{count}")
            }
            PositionError::InvalidCount(count) => {
                write!(f, "position table needs 2..={MAX_POSITIONS} entries, got {count}")
            }
            PositionError::ZeroPulse { index } => {
                write!(f, "position {index} has a zero pulse width")
            }
        }
    }
}

/// Ordered table of commanded positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionTable {
    slots: [PositionSlot; MAX_POSITIONS],
    len: u8,
}

impl PositionTable {
    /// Stock crank table: closed, half, open.
    pub const CRANK: Self = Self::from_three([
        PositionSlot::new(SERVO_MIN_US, "0°"),
        PositionSlot::new((SERVO_MIN_US + SERVO_MAX_US) / 2, "90°"),
        PositionSlot::new(SERVO_MAX_US, "180°"),
    ]);

    const fn from_three(entries: [PositionSlot; DEFAULT_POSITION_COUNT]) -> Self {
        let mut slots = [EMPTY_SLOT; MAX_POSITIONS];
        slots[0] = entries[0];
        slots[1] = entries[1];
        slots[2] = entries[2];
        Self {
            slots,
            len: CRANK_LEN,
        }
    }

    /// Builds a table from the provided slots.
    pub fn new(entries: &[PositionSlot]) -> Result<Self, PositionError> {
        if !(2..=MAX_POSITIONS).contains(&entries.len()) {
            return Err(PositionError::InvalidCount(entries.len()));
        }
        if let Some(index) = entries.iter().position(|slot| slot.pulse_us == 0) {
            return Err(PositionError::ZeroPulse { index });
        }

        let mut slots = [EMPTY_SLOT; MAX_POSITIONS];
        slots[..entries.len()].copy_from_slice(entries);
        let len = u8::try_from(entries.len()).map_err(|_| PositionError::InvalidCount(entries.len()))?;
        Ok(Self { slots, len })
    }

    /// Number of positions in the table.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Tables are never empty; provided for API symmetry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolves a raw index, rejecting values outside the table.
    pub fn index(&self, raw: u8) -> Result<PositionIndex, PositionError> {
        if raw < self.len {
            Ok(PositionIndex(raw))
        } else {
            Err(PositionError::OutOfRange {
                requested: raw,
                count: self.len,
            })
        }
    }

    /// Slot for an in-range index.
    #[must_use]
    pub fn slot(&self, index: PositionIndex) -> PositionSlot {
        self.slots[index.get()]
    }

    /// Iterates over the configured slots.
    pub fn iter(&self) -> core::slice::Iter<'_, PositionSlot> {
        self.slots[..self.len()].iter()
    }

    const fn next(&self, index: PositionIndex) -> PositionIndex {
        let next = index.0 + 1;
        if next >= self.len {
            PositionIndex(0)
        } else {
            PositionIndex(next)
        }
    }
}

impl Default for PositionTable {
    fn default() -> Self {
        Self::CRANK
    }
}

/// What caused a position change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PositionSource {
    Button,
    Remote,
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSource::Button => f.write_str("button"),
            PositionSource::Remote => f.write_str("remote"),
        }
    }
}

/// Record of a single transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PositionChange {
    pub from: PositionIndex,
    pub to: PositionIndex,
    pub pulse_us: u16,
    pub source: PositionSource,
}

/// Holds the current position and applies transitions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PositionStateMachine {
    table: PositionTable,
    current: PositionIndex,
}

impl PositionStateMachine {
    /// Creates a machine parked at [`PositionIndex::HOME`].
    #[must_use]
    pub const fn new(table: PositionTable) -> Self {
        Self {
            table,
            current: PositionIndex::HOME,
        }
    }

    /// Advances to the next position, wrapping after the last one.
    pub fn advance(&mut self) -> PositionChange {
        let target = self.table.next(self.current);
        self.transition(target, PositionSource::Button)
    }

    /// Jumps directly to `target`, ignoring the local cycling phase.
    pub fn jump_to(&mut self, target: PositionIndex) -> PositionChange {
        self.transition(target, PositionSource::Remote)
    }

    fn transition(&mut self, target: PositionIndex, source: PositionSource) -> PositionChange {
        let from = self.current;
        self.current = target;
        PositionChange {
            from,
            to: target,
            pulse_us: self.table.slot(target).pulse_us,
            source,
        }
    }

    #[must_use]
    pub const fn current(&self) -> PositionIndex {
        self.current
    }

    /// Pulse width for the current position.
    #[must_use]
    pub fn pulse_us(&self) -> u16 {
        self.table.slot(self.current).pulse_us
    }

    /// Label for the current position.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.table.slot(self.current).label
    }

    #[must_use]
    pub const fn table(&self) -> &PositionTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crank_table_matches_servo_range() {
        let table = PositionTable::CRANK;
        let pulses: heapless::Vec<u16, MAX_POSITIONS> =
            table.iter().map(|slot| slot.pulse_us).collect();
        assert_eq!(pulses.as_slice(), &[1_000, 1_500, 2_000]);
    }

    #[test]
    fn three_presses_cycle_back_home() {
        let mut machine = PositionStateMachine::new(PositionTable::CRANK);
        let visited = [
            machine.advance().to.get(),
            machine.advance().to.get(),
            machine.advance().to.get(),
        ];
        assert_eq!(visited, [1, 2, 0]);
        assert_eq!(machine.pulse_us(), 1_000);
    }

    #[test]
    fn jump_ignores_cycle_phase() {
        let mut machine = PositionStateMachine::new(PositionTable::CRANK);
        machine.advance();

        let change = machine.jump_to(PositionIndex::HOME);
        assert_eq!(change.from.get(), 1);
        assert_eq!(change.to.get(), 0);
        assert_eq!(change.source, PositionSource::Remote);

        // The next local press continues from the jumped-to index.
        assert_eq!(machine.advance().to.get(), 1);
    }

    #[test]
    fn servo_duty_scales_to_timer_period() {
        assert_eq!(servo_duty(1_000, 20_000), 1_000);
        assert_eq!(servo_duty(1_500, 40_000), 3_000);
        assert_eq!(servo_duty(2_000, 65_535), 6_553);
        assert_eq!(servo_duty(u16::MAX, 1_000), 1_000);
    }

    #[test]
    fn table_validation() {
        let one = [PositionSlot::new(1_500, "mid")];
        assert_eq!(PositionTable::new(&one), Err(PositionError::InvalidCount(1)));

        let zero = [PositionSlot::new(1_000, "a"), PositionSlot::new(0, "b")];
        assert_eq!(
            PositionTable::new(&zero),
            Err(PositionError::ZeroPulse { index: 1 })
        );

        let pair = [PositionSlot::new(1_100, "shut"), PositionSlot::new(1_900, "open")];
        let table = PositionTable::new(&pair).expect("valid table");
        assert_eq!(table.len(), 2);
        assert!(table.index(2).is_err());
    }
}
